use sibyl_domain::entities::metrics::{compute_metrics, MetricsConfig};
use sibyl_domain::errors::EngineError;
use sibyl_domain::services::engine::{closed_pnls, BacktestRunner, EngineConfig};
use sibyl_domain::services::sandbox::{
    EvalBudget, ExprSignalSource, ParamValue, Params, SignalSource,
};
use sibyl_domain::value_objects::price_point::PricePoint;
use sibyl_domain::value_objects::signal::Signal;
use sibyl_domain::value_objects::trade::{CloseReason, TradeKind};
use std::sync::Arc;
use std::time::Duration;

/// Buys when the price rose vs. the prior bar, sells when it fell.
const RISE_FALL: &str = "if(change(1) > 0.0, 1, if(change(1) < 0.0, -1, 0))";

fn series(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(idx, &price)| PricePoint {
            timestamp: idx as i64 + 1,
            price,
        })
        .collect()
}

fn compile(source: &str, params: Params, prices: &[f64]) -> ExprSignalSource {
    ExprSignalSource::compile(
        "scenario",
        source,
        params,
        Arc::new(prices.to_vec()),
        EvalBudget::default().per_eval,
    )
    .expect("compile")
}

fn lookback(bars: i64) -> Params {
    let mut params = Params::new();
    params.insert("lookback".to_string(), ParamValue::Int(bars));
    params
}

#[test]
fn rise_fall_scenario_produces_two_round_trips() {
    let prices = [100.0, 101.0, 99.0, 105.0, 103.0];
    let bars = series(&prices);
    let source = compile(RISE_FALL, lookback(2), &prices);
    let mut runner = BacktestRunner::new(
        "scenario".to_string(),
        source,
        EngineConfig {
            reverse_on_opposite: false,
            ..EngineConfig::default()
        },
    )
    .expect("runner");
    let output = runner.run(&bars).expect("run");

    // One open at 101 (after seeing [100, 101]), close at 99, reopen at
    // 105, close at 103: four trade records, two of them closes.
    assert_eq!(output.trades.len(), 4);
    assert_eq!(output.trades[0].kind, TradeKind::OpenLong);
    assert_eq!(output.trades[0].price, 101.0);
    assert_eq!(output.trades[1].kind, TradeKind::CloseLong);
    assert_eq!(output.trades[1].price, 99.0);
    assert_eq!(output.trades[2].kind, TradeKind::OpenLong);
    assert_eq!(output.trades[2].price, 105.0);
    assert_eq!(output.trades[3].kind, TradeKind::CloseLong);
    assert_eq!(output.trades[3].price, 103.0);

    // With zero fees, total pnl is exactly the sum of the two round trips.
    let pnls = closed_pnls(&output.trades);
    let metrics = compute_metrics(&output.equity, &pnls, 1000.0, &MetricsConfig::default());
    assert!((metrics.total_pnl - pnls.iter().sum::<f64>()).abs() < 1e-9);
    assert_eq!(metrics.total_trades, 2);
    assert!((metrics.roi_pct - metrics.total_pnl / 1000.0 * 100.0).abs() < 1e-12);
}

#[test]
fn flat_long_flat_on_rising_series_is_profitable_without_fees() {
    let prices = [0.40, 0.42, 0.45, 0.50, 0.55];
    let bars = series(&prices);
    let source = compile("1", Params::new(), &prices);
    let mut runner =
        BacktestRunner::new("rising".to_string(), source, EngineConfig::default()).expect("runner");
    let output = runner.run(&bars).expect("run");

    let pnls = closed_pnls(&output.trades);
    let metrics = compute_metrics(&output.equity, &pnls, 1000.0, &MetricsConfig::default());
    assert!(metrics.total_pnl > 0.0);
    let final_point = output.equity.last().expect("curve");
    assert!((final_point.equity - (1000.0 + metrics.total_pnl)).abs() < 1e-9);
}

#[test]
fn single_bar_series_yields_no_trades_and_zero_sharpe() {
    let prices = [0.5];
    let bars = series(&prices);
    let source = compile(RISE_FALL, lookback(2), &prices);
    let mut runner =
        BacktestRunner::new("single".to_string(), source, EngineConfig::default()).expect("runner");
    let output = runner.run(&bars).expect("run");

    assert_eq!(output.equity.len(), 1);
    assert!(output.trades.is_empty());
    let metrics = compute_metrics(&output.equity, &[], 1000.0, &MetricsConfig::default());
    assert_eq!(metrics.total_trades, 0);
    assert_eq!(metrics.sharpe_ratio, 0.0);
    assert_eq!(metrics.max_drawdown_pct, 0.0);
}

/// Records the window each evaluation receives.
struct Probe {
    windows: Vec<Vec<f64>>,
}

impl SignalSource for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    fn evaluate(&mut self, history: &[f64], _position: f64) -> Result<Signal, EngineError> {
        self.windows.push(history.to_vec());
        Ok(Signal::Hold)
    }
}

#[test]
fn engine_never_shows_future_prices() {
    let prices = [0.4, 0.42, 0.39, 0.44, 0.41, 0.43];
    let bars = series(&prices);
    let mut runner = BacktestRunner::new(
        "probe".to_string(),
        Probe {
            windows: Vec::new(),
        },
        EngineConfig::default(),
    )
    .expect("runner");
    runner.run(&bars).expect("run");

    // Bar i sees exactly prices[0..=i], nothing more.
    let windows = runner.into_source().windows;
    assert_eq!(windows.len(), prices.len() - 1);
    for (call, window) in windows.iter().enumerate() {
        let bar = call + 1;
        assert_eq!(window.len(), bar + 1);
        assert_eq!(window.as_slice(), &prices[..=bar]);
    }
}

#[test]
fn expression_cannot_reach_past_the_current_bar() {
    let prices = [0.4, 0.42, 0.39, 0.44];
    let bars = series(&prices);
    // `price(bars)` asks for one bar more than is visible.
    let source = compile("price(bars)", Params::new(), &prices);
    let mut runner =
        BacktestRunner::new("cheat".to_string(), source, EngineConfig::default()).expect("runner");
    let err = runner.run(&bars).expect_err("must fail");
    assert!(matches!(err, EngineError::Evaluation { .. }));
}

#[test]
fn per_evaluation_budget_overrun_aborts_the_run() {
    let prices: Vec<f64> = (0..10_000).map(|i| 0.4 + (i % 100) as f64 * 0.001).collect();
    let bars = series(&prices);
    let source = ExprSignalSource::compile(
        "slow",
        "sma(5000)",
        lookback(5000),
        Arc::new(prices.clone()),
        Duration::ZERO,
    )
    .expect("compile");
    let mut runner =
        BacktestRunner::new("slow".to_string(), source, EngineConfig::default()).expect("runner");
    let err = runner.run(&bars).expect_err("must time out");
    assert!(matches!(err, EngineError::SandboxTimeout { .. }));
}

#[test]
fn run_budget_overrun_aborts_the_run() {
    let prices = [0.4, 0.42, 0.39, 0.44];
    let bars = series(&prices);
    let source = compile("0", Params::new(), &prices);
    let mut runner = BacktestRunner::new(
        "budget".to_string(),
        source,
        EngineConfig {
            run_budget: Duration::ZERO,
            ..EngineConfig::default()
        },
    )
    .expect("runner");
    let err = runner.run(&bars).expect_err("must time out");
    assert!(matches!(err, EngineError::RunTimeout { .. }));
}

#[test]
fn forced_close_is_flagged_end_of_data() {
    let prices = [0.40, 0.42, 0.45];
    let bars = series(&prices);
    let source = compile("1", Params::new(), &prices);
    let mut runner =
        BacktestRunner::new("forced".to_string(), source, EngineConfig::default()).expect("runner");
    let output = runner.run(&bars).expect("run");

    let close = output.trades.last().expect("close");
    assert_eq!(close.reason, Some(CloseReason::EndOfData));
    let organic = output
        .trades
        .iter()
        .filter(|t| t.reason == Some(CloseReason::Signal))
        .count();
    assert_eq!(organic, 0);
}
