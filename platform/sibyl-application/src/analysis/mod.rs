use crate::config::Config;
use crate::shared::{resolve_classifier_config, resolve_metrics_config};
use serde::Serialize;
use sibyl_domain::entities::detection::{StrategyDetection, StrategyLabel};
use sibyl_domain::entities::performance::{TraderPerformance, TraderProfile};
use sibyl_domain::repositories::artifacts::ArtifactWriter;
use sibyl_domain::repositories::trade_history::{FillQuery, TradeHistoryRepository};
use sibyl_domain::services::analyzers::patterns::classify;
use sibyl_domain::services::analyzers::performance::build_performance;
use sibyl_domain::services::analyzers::profile::build_profile;
use sibyl_domain::value_objects::fill::Fill;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;

const DEFAULT_FILL_LIMIT: usize = 1000;
const MAX_COMPARE: usize = 10;

pub struct TraderAnalysisReport {
    pub out_dir: PathBuf,
    pub performance: TraderPerformance,
    pub profile: TraderProfile,
}

pub struct DetectionReport {
    pub out_dir: PathBuf,
    pub detection: StrategyDetection,
}

/// Side-by-side row for comparing traders.
#[derive(Debug, Clone, Serialize)]
pub struct TraderComparison {
    pub address: String,
    pub total_trades: usize,
    pub total_volume: f64,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub avg_position_size: f64,
    pub unique_markets: usize,
    pub primary_strategy: StrategyLabel,
    pub strategy_confidence: f64,
}

/// Builds performance and profile artifacts for one trader.
pub fn analyze_trader(
    config: &Config,
    address: &str,
    out: Option<PathBuf>,
    trade_history: &dyn TradeHistoryRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<TraderAnalysisReport, String> {
    let address = address.to_lowercase();
    let _span = info_span!("analyze_trader", address = %address).entered();

    let fills = load_fills(config, &address, trade_history)?;
    let performance = build_performance(&address, &fills, &resolve_metrics_config(config));
    let profile = build_profile(&address, &fills);

    let out_dir = trader_dir(config, out, &address);
    artifacts.ensure_dir(&out_dir)?;
    artifacts.write_performance_json(out_dir.join("performance.json").as_path(), &performance)?;
    artifacts.write_profile_json(out_dir.join("profile.json").as_path(), &profile)?;

    Ok(TraderAnalysisReport {
        out_dir,
        performance,
        profile,
    })
}

/// Classifies one trader's behavior and writes the detection artifact.
pub fn detect_strategy(
    config: &Config,
    address: &str,
    out: Option<PathBuf>,
    trade_history: &dyn TradeHistoryRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<DetectionReport, String> {
    let address = address.to_lowercase();
    let _span = info_span!("detect_strategy", address = %address).entered();

    let stage_start = Instant::now();
    let fills = load_fills(config, &address, trade_history)?;
    let detection = classify(&address, &fills, None, &resolve_classifier_config(config));
    metrics::histogram!("sibyl.analysis.classify_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    let out_dir = trader_dir(config, out, &address);
    artifacts.ensure_dir(&out_dir)?;
    artifacts.write_detection_json(out_dir.join("detection.json").as_path(), &detection)?;

    Ok(DetectionReport { out_dir, detection })
}

/// Compares up to ten traders side by side. Purely aggregates the profile
/// and detection outputs; no artifacts are written.
pub fn compare_traders(
    config: &Config,
    addresses: &[String],
    trade_history: &dyn TradeHistoryRepository,
) -> Result<Vec<TraderComparison>, String> {
    let classifier_config = resolve_classifier_config(config);
    let mut rows = Vec::new();
    for address in addresses.iter().take(MAX_COMPARE) {
        let address = address.to_lowercase();
        let fills = load_fills(config, &address, trade_history)?;
        let profile = build_profile(&address, &fills);
        let detection = classify(&address, &fills, None, &classifier_config);
        rows.push(TraderComparison {
            address,
            total_trades: profile.total_trades,
            total_volume: profile.total_volume,
            total_pnl: profile.total_pnl,
            roi_pct: profile.roi_pct,
            win_rate_pct: profile.win_rate_pct,
            avg_position_size: profile.avg_position_size,
            unique_markets: profile.unique_markets,
            primary_strategy: detection.primary_strategy,
            strategy_confidence: detection.confidence,
        });
    }
    Ok(rows)
}

fn load_fills(
    config: &Config,
    address: &str,
    trade_history: &dyn TradeHistoryRepository,
) -> Result<Vec<Fill>, String> {
    let stage_start = Instant::now();
    let fills = trade_history.load_fills(&FillQuery {
        address: address.to_string(),
        limit: config
            .data
            .as_ref()
            .and_then(|data| data.fill_limit)
            .unwrap_or(DEFAULT_FILL_LIMIT),
    })?;
    metrics::histogram!("sibyl.analysis.load_fills_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    Ok(fills)
}

fn trader_dir(config: &Config, out: Option<PathBuf>, address: &str) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir))
        .join(address)
}
