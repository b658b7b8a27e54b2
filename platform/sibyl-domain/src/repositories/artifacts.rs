use crate::entities::backtest::BacktestResult;
use crate::entities::detection::StrategyDetection;
use crate::entities::performance::{TraderPerformance, TraderProfile};
use crate::services::audit::AuditEvent;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::trade::TradeRecord;
use std::path::Path;

pub trait ArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;
    fn write_trades_csv(&self, path: &Path, trades: &[TradeRecord]) -> Result<(), String>;
    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String>;
    fn write_result_json(&self, path: &Path, result: &BacktestResult) -> Result<(), String>;
    fn write_detection_json(&self, path: &Path, detection: &StrategyDetection)
        -> Result<(), String>;
    fn write_performance_json(
        &self,
        path: &Path,
        performance: &TraderPerformance,
    ) -> Result<(), String>;
    fn write_profile_json(&self, path: &Path, profile: &TraderProfile) -> Result<(), String>;
    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String>;
    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String>;
}

pub trait ArtifactReader {
    fn read_result_json(&self, path: &Path) -> Result<BacktestResult, String>;
    fn exists(&self, path: &Path) -> bool;
}
