pub mod backtest;
pub mod detection;
pub mod metrics;
pub mod performance;
