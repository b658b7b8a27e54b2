use crate::value_objects::equity_point::EquityPoint;
use serde::{Deserialize, Serialize};

/// Wire value reported when gross loss is zero but gross profit is not.
/// `f64::INFINITY` does not survive serde_json, so "no losses" is reported
/// as this capped sentinel.
pub const PROFIT_FACTOR_SENTINEL: f64 = 999.99;

#[derive(Debug, Clone, Copy)]
pub struct MetricsConfig {
    pub risk_free_rate: f64,
    /// Sharpe annualization factor (periods per year); `None` reports the
    /// raw ratio, the default because bar frequency is irregular for
    /// prediction markets. Hourly bars would use 8760.
    pub annualization_factor: Option<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            annualization_factor: None,
        }
    }
}

/// Derived, stateless snapshot of a completed run. Never mutated after
/// creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

/// Computes run metrics from an equity curve and the realized P&L of each
/// closing trade, in chronological order.
///
/// Shared by the backtest path (closing `TradeRecord`s) and the trader path
/// (matched round trips). Degenerate inputs (single-point curve, zero
/// trades, zero variance) yield zeros, never a division error.
pub fn compute_metrics(
    equity: &[EquityPoint],
    closed_pnls: &[f64],
    initial_capital: f64,
    config: &MetricsConfig,
) -> BacktestMetrics {
    let mut metrics = BacktestMetrics {
        total_trades: closed_pnls.len(),
        ..BacktestMetrics::default()
    };

    if let Some(last) = equity.last() {
        metrics.total_pnl = last.equity - initial_capital;
        if initial_capital > 0.0 {
            metrics.roi_pct = metrics.total_pnl / initial_capital * 100.0;
        }
    }

    metrics.sharpe_ratio = sharpe_ratio(equity, config);
    metrics.max_drawdown_pct = max_drawdown(equity) * 100.0;

    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut consec_wins = 0usize;
    let mut consec_losses = 0usize;
    for &pnl in closed_pnls {
        if pnl > 0.0 {
            metrics.winning_trades += 1;
            gross_profit += pnl;
            consec_wins += 1;
            consec_losses = 0;
        } else if pnl < 0.0 {
            metrics.losing_trades += 1;
            gross_loss += pnl.abs();
            consec_losses += 1;
            consec_wins = 0;
        } else {
            consec_wins = 0;
            consec_losses = 0;
        }
        metrics.max_consecutive_wins = metrics.max_consecutive_wins.max(consec_wins);
        metrics.max_consecutive_losses = metrics.max_consecutive_losses.max(consec_losses);
    }

    let decided = metrics.winning_trades + metrics.losing_trades;
    if decided > 0 {
        metrics.win_rate_pct = metrics.winning_trades as f64 / decided as f64 * 100.0;
    }
    if metrics.winning_trades > 0 {
        metrics.avg_win = gross_profit / metrics.winning_trades as f64;
    }
    if metrics.losing_trades > 0 {
        metrics.avg_loss = -gross_loss / metrics.losing_trades as f64;
    }
    metrics.profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        PROFIT_FACTOR_SENTINEL
    } else {
        0.0
    };

    metrics
}

/// Mean of per-point equity returns over their population standard
/// deviation, optionally scaled by sqrt of the annualization factor.
fn sharpe_ratio(equity: &[EquityPoint], config: &MetricsConfig) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }

    let mut returns = Vec::with_capacity(equity.len() - 1);
    for pair in equity.windows(2) {
        let prev = pair[0].equity;
        let curr = pair[1].equity;
        if prev > 0.0 {
            returns.push(curr / prev - 1.0 - config.risk_free_rate);
        }
    }
    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns
        .iter()
        .map(|ret| {
            let diff = ret - mean;
            diff * diff
        })
        .sum::<f64>()
        / returns.len() as f64;
    let std = var.sqrt();
    if std == 0.0 {
        return 0.0;
    }

    let raw = mean / std;
    match config.annualization_factor {
        Some(factor) if factor > 0.0 => raw * factor.sqrt(),
        _ => raw,
    }
}

/// Maximum peak-to-trough decline, as a fraction of the peak, in one scan.
fn max_drawdown(equity: &[EquityPoint]) -> f64 {
    let mut peak = 0.0f64;
    let mut max_dd = 0.0f64;
    for point in equity {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::{compute_metrics, BacktestMetrics, MetricsConfig, PROFIT_FACTOR_SENTINEL};
    use crate::value_objects::equity_point::EquityPoint;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(idx, &equity)| EquityPoint {
                timestamp: idx as i64,
                equity,
                cash: equity,
                position_size: 0.0,
            })
            .collect()
    }

    #[test]
    fn single_point_curve_yields_zero_metrics_except_counts() {
        let metrics = compute_metrics(&curve(&[1000.0]), &[], 1000.0, &MetricsConfig::default());
        assert_eq!(
            metrics,
            BacktestMetrics {
                total_pnl: 0.0,
                ..BacktestMetrics::default()
            }
        );
    }

    #[test]
    fn roi_is_exactly_pnl_over_capital() {
        let metrics = compute_metrics(
            &curve(&[1000.0, 1100.0, 1250.0]),
            &[100.0, 150.0],
            1000.0,
            &MetricsConfig::default(),
        );
        assert!((metrics.total_pnl - 250.0).abs() < 1e-9);
        assert!((metrics.roi_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn win_rate_ignores_zero_pnl_closes() {
        let metrics = compute_metrics(
            &curve(&[1000.0, 1010.0]),
            &[5.0, 0.0, -5.0, 5.0],
            1000.0,
            &MetricsConfig::default(),
        );
        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert!((metrics.win_rate_pct - 2.0 / 3.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_uses_sentinel_when_no_losses() {
        let metrics = compute_metrics(
            &curve(&[1000.0, 1010.0]),
            &[5.0, 5.0],
            1000.0,
            &MetricsConfig::default(),
        );
        assert_eq!(metrics.profit_factor, PROFIT_FACTOR_SENTINEL);

        let flat = compute_metrics(&curve(&[1000.0, 1000.0]), &[], 1000.0, &MetricsConfig::default());
        assert_eq!(flat.profit_factor, 0.0);
    }

    #[test]
    fn consecutive_runs_break_on_zero_pnl() {
        let metrics = compute_metrics(
            &curve(&[1000.0, 1010.0]),
            &[1.0, 1.0, 0.0, 1.0, -1.0, -1.0, -1.0],
            1000.0,
            &MetricsConfig::default(),
        );
        assert_eq!(metrics.max_consecutive_wins, 2);
        assert_eq!(metrics.max_consecutive_losses, 3);
    }

    #[test]
    fn drawdown_is_peak_relative() {
        let metrics = compute_metrics(
            &curve(&[1000.0, 1200.0, 900.0, 1100.0]),
            &[],
            1000.0,
            &MetricsConfig::default(),
        );
        assert!((metrics.max_drawdown_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn sharpe_is_zero_for_constant_equity() {
        let metrics = compute_metrics(
            &curve(&[1000.0, 1000.0, 1000.0]),
            &[],
            1000.0,
            &MetricsConfig::default(),
        );
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn annualization_scales_sharpe_by_sqrt() {
        let points = curve(&[1000.0, 1010.0, 1015.0, 1030.0]);
        let raw = compute_metrics(&points, &[], 1000.0, &MetricsConfig::default());
        let scaled = compute_metrics(
            &points,
            &[],
            1000.0,
            &MetricsConfig {
                risk_free_rate: 0.0,
                annualization_factor: Some(4.0),
            },
        );
        assert!((scaled.sharpe_ratio - raw.sharpe_ratio * 2.0).abs() < 1e-9);
    }
}
