use crate::entities::metrics::BacktestMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub month: String,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPerformance {
    pub market_id: String,
    pub trades: usize,
    pub pnl: f64,
    pub wins: usize,
    pub losses: usize,
    pub roi_pct: f64,
}

/// A trader's realized performance, reconstructed from historical fills
/// matched into synthetic round trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderPerformance {
    pub address: String,
    pub equity_curve: Vec<f64>,
    pub timestamps: Vec<i64>,
    pub cumulative_pnl: Vec<f64>,
    pub monthly_returns: Vec<MonthlyReturn>,
    pub market_performance: Vec<MarketPerformance>,
    pub metrics: BacktestMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketActivity {
    pub market_id: String,
    pub trades: usize,
    pub volume: f64,
    pub buys: usize,
    pub sells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderProfile {
    pub address: String,
    pub total_trades: usize,
    pub total_volume: f64,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub avg_position_size: f64,
    pub unique_markets: usize,
    pub first_trade: Option<i64>,
    pub last_trade: Option<i64>,
    pub markets_breakdown: Vec<MarketActivity>,
}
