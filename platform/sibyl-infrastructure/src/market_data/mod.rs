//! Price-history adapters: the upstream prices-history HTTP endpoint and a
//! CSV file source for offline runs.

use reqwest::blocking::Client;
use serde::Deserialize;
use sibyl_domain::repositories::market_data::{PriceHistoryQuery, PriceHistoryRepository};
use sibyl_domain::value_objects::price_point::PricePoint;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<HistoryPoint>,
}

#[derive(Debug, Deserialize)]
struct HistoryPoint {
    t: i64,
    p: f64,
}

pub struct HttpPriceHistory {
    base_url: String,
    client: Client,
}

impl HttpPriceHistory {
    pub fn new(base_url: String, timeout_ms: u64) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self { base_url, client })
    }
}

impl PriceHistoryRepository for HttpPriceHistory {
    fn load_price_history(&self, query: &PriceHistoryQuery) -> Result<Vec<PricePoint>, String> {
        let url = format!("{}/prices-history", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("market", query.token_id.as_str()),
                ("interval", query.interval.as_str()),
                ("fidelity", &query.fidelity_minutes.to_string()),
            ])
            .send()
            .map_err(|err| format!("prices-history request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("prices-history returned HTTP {status}"));
        }

        let body: HistoryResponse = response
            .json()
            .map_err(|err| format!("failed to parse prices-history response: {err}"))?;

        Ok(body
            .history
            .into_iter()
            .map(|point| PricePoint {
                timestamp: point.t,
                price: point.p,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    timestamp: i64,
    price: f64,
}

/// Reads `timestamp,price` rows. Non-positive and non-finite prices are
/// dropped with a warning; ordering problems are left for the engine's
/// series validation to report.
pub struct CsvPriceHistory {
    path: PathBuf,
}

impl CsvPriceHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PriceHistoryRepository for CsvPriceHistory {
    fn load_price_history(&self, _query: &PriceHistoryQuery) -> Result<Vec<PricePoint>, String> {
        let file = File::open(&self.path)
            .map_err(|err| format!("failed to open prices CSV {}: {}", self.path.display(), err))?;
        let mut reader = csv::Reader::from_reader(file);

        let mut series = Vec::new();
        let mut dropped = 0usize;
        for row in reader.deserialize::<PriceRecord>() {
            let record = row.map_err(|err| format!("failed to parse prices CSV row: {err}"))?;
            if !record.price.is_finite() || record.price <= 0.0 {
                dropped += 1;
                continue;
            }
            series.push(PricePoint {
                timestamp: record.timestamp,
                price: record.price,
            });
        }
        if dropped > 0 {
            tracing::warn!(
                path = %self.path.display(),
                dropped,
                "dropped rows with non-positive prices"
            );
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::CsvPriceHistory;
    use sibyl_domain::repositories::market_data::{PriceHistoryQuery, PriceHistoryRepository};
    use std::io::Write;
    use std::path::PathBuf;

    fn query() -> PriceHistoryQuery {
        PriceHistoryQuery {
            token_id: "0x1".to_string(),
            interval: "max".to_string(),
            fidelity_minutes: 60,
        }
    }

    fn temp_csv(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sibyl_{}_{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).expect("create temp csv");
        file.write_all(contents.as_bytes()).expect("write temp csv");
        path
    }

    #[test]
    fn loads_rows_and_drops_bad_prices() {
        let path = temp_csv(
            "prices.csv",
            "timestamp,price\n100,0.40\n160,0.0\n220,0.45\n",
        );
        let repo = CsvPriceHistory::new(path.clone());
        let series = repo.load_price_history(&query()).expect("load");
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].timestamp, 100);
        assert!((series[1].price - 0.45).abs() < 1e-12);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_error() {
        let repo = CsvPriceHistory::new(PathBuf::from("/nonexistent/prices.csv"));
        assert!(repo.load_price_history(&query()).is_err());
    }
}
