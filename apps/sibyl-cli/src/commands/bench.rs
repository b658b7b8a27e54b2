use sibyl_application::templates;
use sibyl_domain::services::engine::{BacktestRunner, EngineConfig};
use sibyl_domain::services::sandbox::{EvalBudget, ExprSignalSource};
use sibyl_domain::value_objects::price_point::PricePoint;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs the momentum template over a synthetic oscillating series, through
/// the full sandbox + engine path.
pub fn run(bars: usize, step_seconds: i64, json: bool) -> Result<(), String> {
    if bars == 0 {
        return Err("--bars must be positive".to_string());
    }

    let prices: Vec<f64> = (0..bars)
        .map(|i| 0.5 + 0.2 * ((i as f64) * 0.05).sin())
        .collect();
    let series: Vec<PricePoint> = prices
        .iter()
        .enumerate()
        .map(|(idx, &price)| PricePoint {
            timestamp: idx as i64 * step_seconds,
            price,
        })
        .collect();

    let template = templates::MOMENTUM_BREAKOUT;
    let source = ExprSignalSource::compile(
        template.name,
        template.source,
        templates::default_params(&template),
        Arc::new(prices),
        EvalBudget::default().per_eval,
    )
    .map_err(|err| err.to_string())?;

    let mut runner = BacktestRunner::new(
        "bench".to_string(),
        source,
        EngineConfig {
            // A synthetic half-million-bar run is allowed to take longer
            // than a production request.
            run_budget: Duration::from_secs(600),
            ..EngineConfig::default()
        },
    )
    .map_err(|err| err.to_string())?;

    let start = Instant::now();
    let output = runner.run(&series).map_err(|err| err.to_string())?;
    let elapsed = start.elapsed();
    let bars_per_sec = if elapsed.as_secs_f64() > 0.0 {
        bars as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "bars": bars,
                "trades": output.trades.len(),
                "elapsed_ms": elapsed.as_millis(),
                "bars_per_sec": bars_per_sec,
            })
        );
    } else {
        println!("bars:         {bars}");
        println!("trades:       {}", output.trades.len());
        println!("elapsed:      {:.2}s", elapsed.as_secs_f64());
        println!("bars/sec:     {bars_per_sec:.0}");
    }
    Ok(())
}
