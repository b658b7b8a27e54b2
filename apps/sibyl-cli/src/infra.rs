use sibyl_application::config::Config;
use sibyl_domain::repositories::market_data::PriceHistoryRepository;
use sibyl_domain::repositories::trade_history::TradeHistoryRepository;
use sibyl_infrastructure::market_data::{CsvPriceHistory, HttpPriceHistory};
use sibyl_infrastructure::trade_history::{CsvTradeHistory, HttpTradeHistory};
use std::path::PathBuf;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn timeout_ms(config: &Config) -> u64 {
    config
        .data
        .as_ref()
        .and_then(|data| data.timeout_ms)
        .unwrap_or(DEFAULT_TIMEOUT_MS)
}

pub fn build_price_repo(config: &Config) -> Result<Box<dyn PriceHistoryRepository>, String> {
    let data = config.data.as_ref();
    if let Some(path) = data.and_then(|data| data.prices_csv.as_ref()) {
        return Ok(Box::new(CsvPriceHistory::new(PathBuf::from(path))));
    }
    if let Some(url) = data.and_then(|data| data.prices_url.as_ref()) {
        return Ok(Box::new(HttpPriceHistory::new(
            url.clone(),
            timeout_ms(config),
        )?));
    }
    Err("config needs data.prices_csv or data.prices_url".to_string())
}

pub fn build_trade_repo(config: &Config) -> Result<Box<dyn TradeHistoryRepository>, String> {
    let data = config.data.as_ref();
    if let Some(path) = data.and_then(|data| data.trades_csv.as_ref()) {
        return Ok(Box::new(CsvTradeHistory::new(PathBuf::from(path))));
    }
    if let Some(url) = data.and_then(|data| data.trades_url.as_ref()) {
        return Ok(Box::new(HttpTradeHistory::new(
            url.clone(),
            timeout_ms(config),
        )?));
    }
    Err("config needs data.trades_csv or data.trades_url".to_string())
}
