use crate::reporting;
use sibyl_domain::entities::backtest::BacktestResult;
use sibyl_domain::entities::detection::StrategyDetection;
use sibyl_domain::entities::performance::{TraderPerformance, TraderProfile};
use sibyl_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use sibyl_domain::services::audit::AuditEvent;
use sibyl_domain::value_objects::equity_point::EquityPoint;
use sibyl_domain::value_objects::trade::TradeRecord;
use std::fs;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

fn record_write_metrics(kind: &'static str, start: Instant, result: &Result<(), String>) {
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "sibyl.infra.artifacts.write.calls_total",
        "kind" => kind,
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!("sibyl.infra.artifacts.write_ms", "kind" => kind, "result" => result_label)
        .record(start.elapsed().as_millis() as f64);
}

fn record_read_metrics<T>(kind: &'static str, start: Instant, result: &Result<T, String>) {
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "sibyl.infra.artifacts.read.calls_total",
        "kind" => kind,
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!("sibyl.infra.artifacts.read_ms", "kind" => kind, "result" => result_label)
        .record(start.elapsed().as_millis() as f64);
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        let start = Instant::now();
        let result = fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err));
        record_write_metrics("ensure_dir", start, &result);
        result
    }

    fn write_trades_csv(&self, path: &Path, trades: &[TradeRecord]) -> Result<(), String> {
        let start = Instant::now();
        let result = reporting::write_trades_csv(path, trades);
        record_write_metrics("trades_csv", start, &result);
        result
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        let start = Instant::now();
        let result = reporting::write_equity_csv(path, points);
        record_write_metrics("equity_csv", start, &result);
        result
    }

    fn write_result_json(&self, path: &Path, result: &BacktestResult) -> Result<(), String> {
        let start = Instant::now();
        let outcome = reporting::write_json_pretty(path, result, "result json");
        record_write_metrics("result_json", start, &outcome);
        outcome
    }

    fn write_detection_json(
        &self,
        path: &Path,
        detection: &StrategyDetection,
    ) -> Result<(), String> {
        let start = Instant::now();
        let outcome = reporting::write_json_pretty(path, detection, "detection json");
        record_write_metrics("detection_json", start, &outcome);
        outcome
    }

    fn write_performance_json(
        &self,
        path: &Path,
        performance: &TraderPerformance,
    ) -> Result<(), String> {
        let start = Instant::now();
        let outcome = reporting::write_json_pretty(path, performance, "performance json");
        record_write_metrics("performance_json", start, &outcome);
        outcome
    }

    fn write_profile_json(&self, path: &Path, profile: &TraderProfile) -> Result<(), String> {
        let start = Instant::now();
        let outcome = reporting::write_json_pretty(path, profile, "profile json");
        record_write_metrics("profile_json", start, &outcome);
        outcome
    }

    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        let start = Instant::now();
        let result = reporting::write_audit_jsonl(path, events);
        record_write_metrics("logs_jsonl", start, &result);
        result
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        let start = Instant::now();
        let result = fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        });
        record_write_metrics("config_snapshot_toml", start, &result);
        result
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactReader;

impl FilesystemArtifactReader {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactReader for FilesystemArtifactReader {
    fn read_result_json(&self, path: &Path) -> Result<BacktestResult, String> {
        let start = Instant::now();
        let result = reporting::read_result_json(path);
        record_read_metrics("result_json", start, &result);
        result
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
