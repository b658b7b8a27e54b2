use crate::config::Config;
use crate::shared::{
    resolve_engine_config, resolve_eval_budget, resolve_metrics_config, resolve_strategy,
    strategy_hash,
};
use chrono::Utc;
use sibyl_domain::entities::backtest::BacktestResult;
use sibyl_domain::entities::metrics::compute_metrics;
use sibyl_domain::repositories::artifacts::ArtifactWriter;
use sibyl_domain::repositories::market_data::{PriceHistoryQuery, PriceHistoryRepository};
use sibyl_domain::services::audit::AuditEvent;
use sibyl_domain::services::engine::{closed_pnls, BacktestRunner};
use sibyl_domain::services::sandbox::ExprSignalSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info_span;

#[derive(Debug)]
pub struct BacktestReport {
    pub run_dir: PathBuf,
    pub result: BacktestResult,
}

/// Runs one backtest end to end: load prices through the port, compile the
/// sandboxed strategy, drive the engine, derive metrics, write artifacts.
/// Nothing is written when any stage fails.
pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    market_data: &dyn PriceHistoryRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<BacktestReport, String> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        token_id = %config.run.token_id
    )
    .entered();

    let run_start = Instant::now();
    let mut audit_extras: Vec<AuditEvent> = Vec::new();

    let stage_start = Instant::now();
    let series = market_data.load_price_history(&PriceHistoryQuery {
        token_id: config.run.token_id.clone(),
        interval: config
            .data
            .as_ref()
            .and_then(|data| data.interval.clone())
            .unwrap_or_else(|| "max".to_string()),
        fidelity_minutes: config
            .data
            .as_ref()
            .and_then(|data| data.fidelity_minutes)
            .unwrap_or(60),
    })?;
    metrics::histogram!("sibyl.backtest.load_prices_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    if series.is_empty() {
        return Err(format!(
            "insufficient data: no price history for token {}",
            config.run.token_id
        ));
    }
    audit_extras.push(timing_event(
        &config.run.run_id,
        "load_prices",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({ "rows": series.len() }),
    ));

    let strategy = resolve_strategy(config)?;
    let strategy_id = strategy_hash(&strategy.source, &strategy.params);
    let budget = resolve_eval_budget(config);
    let prices: Arc<Vec<f64>> = Arc::new(series.iter().map(|point| point.price).collect());

    // Compile errors surface here, before any bar is processed.
    let source = ExprSignalSource::compile(
        &strategy.name,
        &strategy.source,
        strategy.params.clone(),
        Arc::clone(&prices),
        budget.per_eval,
    )
    .map_err(|err| err.to_string())?;

    let engine_config = resolve_engine_config(config);
    let mut runner = BacktestRunner::new(config.run.run_id.clone(), source, engine_config)
        .map_err(|err| err.to_string())?;

    let stage_start = Instant::now();
    let output = runner.run(&series).map_err(|err| err.to_string())?;
    let engine_ms = stage_start.elapsed().as_millis() as f64;
    metrics::histogram!("sibyl.backtest.engine_ms").record(engine_ms);
    metrics::gauge!("sibyl.backtest.bars_processed").set(output.equity.len() as f64);
    metrics::gauge!("sibyl.backtest.trades").set(output.trades.len() as f64);
    audit_extras.push(timing_event(
        &config.run.run_id,
        "run_engine",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({ "trades": output.trades.len() }),
    ));

    let metrics_config = resolve_metrics_config(config);
    let pnls = closed_pnls(&output.trades);
    let run_metrics = compute_metrics(
        &output.equity,
        &pnls,
        config.run.initial_capital,
        &metrics_config,
    );

    let final_equity = output
        .equity
        .last()
        .map(|point| point.equity)
        .unwrap_or(config.run.initial_capital);
    let result = BacktestResult {
        id: format!("{}-{}", strategy_id, config.run.run_id),
        strategy_id,
        token_id: config.run.token_id.clone(),
        market_name: config.run.market_name.clone(),
        equity_curve: output.equity.iter().map(|point| point.equity).collect(),
        timestamps: series.iter().map(|point| point.timestamp).collect(),
        prices: series.iter().map(|point| point.price).collect(),
        trades: output.trades.clone(),
        metrics: run_metrics,
        initial_capital: config.run.initial_capital,
        final_equity,
        data_points: series.len(),
        duration_seconds: run_start.elapsed().as_secs_f64(),
        created_at: Utc::now().to_rfc3339(),
    };

    let run_dir = write_outputs(config, config_toml, out, &result, &output, artifacts, audit_extras)?;
    Ok(BacktestReport { run_dir, result })
}

fn timing_event(
    run_id: &str,
    action: &str,
    duration_ms: u64,
    details: serde_json::Value,
) -> AuditEvent {
    AuditEvent {
        run_id: run_id.to_string(),
        timestamp: 0,
        stage: "timing".to_string(),
        market: None,
        action: action.to_string(),
        error: None,
        details: serde_json::json!({
            "duration_ms": duration_ms,
            "details": details,
        }),
    }
}

fn write_outputs(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    result: &BacktestResult,
    output: &sibyl_domain::services::engine::RunOutput,
    artifacts: &dyn ArtifactWriter,
    mut audit_extras: Vec<AuditEvent>,
) -> Result<PathBuf, String> {
    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir)?;

    artifacts.write_trades_csv(run_dir.join("trades.csv").as_path(), &output.trades)?;
    artifacts.write_equity_csv(run_dir.join("equity.csv").as_path(), &output.equity)?;
    artifacts.write_result_json(run_dir.join("result.json").as_path(), result)?;

    let mut audit_events = output.audit_events.clone();
    audit_events.append(&mut audit_extras);
    audit_events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.stage.cmp(&b.stage))
            .then_with(|| a.action.cmp(&b.action))
    });
    artifacts.write_audit_jsonl(run_dir.join("logs.jsonl").as_path(), &audit_events)?;

    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;

    Ok(run_dir)
}
