use crate::entities::metrics::BacktestMetrics;
use crate::value_objects::trade::TradeRecord;
use serde::{Deserialize, Serialize};

/// Aggregate result of one completed backtest run. Created once, persisted
/// by an external collaborator, never mutated thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub id: String,
    pub strategy_id: String,
    pub token_id: String,
    pub market_name: Option<String>,
    pub equity_curve: Vec<f64>,
    pub timestamps: Vec<i64>,
    pub prices: Vec<f64>,
    pub trades: Vec<TradeRecord>,
    pub metrics: BacktestMetrics,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub data_points: usize,
    pub duration_seconds: f64,
    pub created_at: String,
}
