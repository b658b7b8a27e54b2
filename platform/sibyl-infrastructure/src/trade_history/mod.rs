//! Trade-history adapters: the paginated upstream trades endpoint and a CSV
//! file source. The upstream schema varies between deployments, so the
//! mapper accepts the field spellings seen in the wild and skips rows it
//! cannot make sense of.

use reqwest::blocking::Client;
use serde::Deserialize;
use sibyl_domain::repositories::trade_history::{FillQuery, TradeHistoryRepository};
use sibyl_domain::value_objects::fill::Fill;
use sibyl_domain::value_objects::side::Side;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

const PAGE_SIZE: usize = 100;

pub struct HttpTradeHistory {
    base_url: String,
    client: Client,
}

impl HttpTradeHistory {
    pub fn new(base_url: String, timeout_ms: u64) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self { base_url, client })
    }

    fn fetch_page(&self, address: &str, limit: usize, offset: usize) -> Result<Vec<serde_json::Value>, String> {
        let url = format!("{}/trades", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("user", address),
                ("limit", &limit.to_string()),
                ("offset", &offset.to_string()),
            ])
            .send()
            .map_err(|err| format!("trades request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("trades endpoint returned HTTP {status}"));
        }
        let body: serde_json::Value = response
            .json()
            .map_err(|err| format!("failed to parse trades response: {err}"))?;
        Ok(body.as_array().cloned().unwrap_or_default())
    }
}

impl TradeHistoryRepository for HttpTradeHistory {
    /// Pages through the endpoint until `limit` fills are collected or the
    /// upstream runs dry. A mid-pagination failure returns what was
    /// gathered so far, matching the degrade-over-fail posture of the
    /// analyzers.
    fn load_fills(&self, query: &FillQuery) -> Result<Vec<Fill>, String> {
        let address = query.address.to_lowercase();
        let page_size = query.limit.min(PAGE_SIZE).max(1);
        let mut fills = Vec::new();
        let mut offset = 0usize;

        while fills.len() < query.limit {
            let page = match self.fetch_page(&address, page_size, offset) {
                Ok(page) => page,
                Err(err) => {
                    if fills.is_empty() {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, offset, "trade pagination aborted early");
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len();
            fills.extend(page.iter().filter_map(map_fill));
            if page_len < page_size {
                break;
            }
            offset += page_size;
        }

        fills.truncate(query.limit);
        Ok(fills)
    }
}

/// Maps one upstream trade object to a fill, tolerating the field aliases
/// the data APIs use. Returns `None` when price, size, or timestamp cannot
/// be recovered.
pub fn map_fill(value: &serde_json::Value) -> Option<Fill> {
    let timestamp = number_field(value, &["timestamp", "created_at", "time"])? as i64;
    let price = number_field(value, &["price"])?;
    let size = number_field(value, &["size", "amount"])?;
    if timestamp <= 0 || !price.is_finite() || price <= 0.0 || !size.is_finite() || size <= 0.0 {
        return None;
    }

    let market_id = ["market", "asset_id"]
        .iter()
        .find_map(|key| value.get(key))
        .and_then(|market| market.as_str())
        .unwrap_or("unknown")
        .to_string();

    let side = match value.get("side").and_then(|side| side.as_str()) {
        Some(side) => match side.to_lowercase().as_str() {
            "buy" | "b" => Side::Buy,
            _ => Side::Sell,
        },
        None => return None,
    };

    Some(Fill {
        timestamp,
        market_id,
        side,
        price,
        size,
    })
}

fn number_field(value: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        let field = value.get(key)?;
        if let Some(number) = field.as_f64() {
            return Some(number);
        }
        field.as_str()?.parse().ok()
    })
}

#[derive(Debug, Deserialize)]
struct FillRecord {
    timestamp: i64,
    market_id: String,
    side: String,
    price: f64,
    size: f64,
}

pub struct CsvTradeHistory {
    path: PathBuf,
}

impl CsvTradeHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TradeHistoryRepository for CsvTradeHistory {
    fn load_fills(&self, query: &FillQuery) -> Result<Vec<Fill>, String> {
        let file = File::open(&self.path)
            .map_err(|err| format!("failed to open fills CSV {}: {}", self.path.display(), err))?;
        let mut reader = csv::Reader::from_reader(file);

        let mut fills = Vec::new();
        for row in reader.deserialize::<FillRecord>() {
            let record = row.map_err(|err| format!("failed to parse fills CSV row: {err}"))?;
            let side = match record.side.to_lowercase().as_str() {
                "buy" | "b" => Side::Buy,
                "sell" | "s" => Side::Sell,
                other => return Err(format!("unknown side `{other}` in fills CSV")),
            };
            fills.push(Fill {
                timestamp: record.timestamp,
                market_id: record.market_id,
                side,
                price: record.price,
                size: record.size,
            });
        }
        fills.truncate(query.limit);
        Ok(fills)
    }
}
