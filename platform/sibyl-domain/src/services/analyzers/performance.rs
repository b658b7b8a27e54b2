//! Realized trader performance, reconstructed from fills matched into
//! synthetic round trips.

use crate::entities::metrics::{compute_metrics, BacktestMetrics, MetricsConfig};
use crate::entities::performance::{MarketPerformance, MonthlyReturn, TraderPerformance};
use crate::services::analyzers::sorted_fills;
use crate::services::ledger::match_round_trips;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::fill::Fill;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

/// Normalized starting equity for the synthetic curve; the trader's real
/// capital base is unknown.
pub const SYNTHETIC_BASE_EQUITY: f64 = 1000.0;

const MAX_MARKET_ROWS: usize = 20;

pub fn build_performance(
    address: &str,
    fills: &[Fill],
    metrics_config: &MetricsConfig,
) -> TraderPerformance {
    if fills.is_empty() {
        return TraderPerformance {
            address: address.to_string(),
            equity_curve: Vec::new(),
            timestamps: Vec::new(),
            cumulative_pnl: Vec::new(),
            monthly_returns: Vec::new(),
            market_performance: Vec::new(),
            metrics: BacktestMetrics::default(),
        };
    }

    let fills = sorted_fills(fills);
    let matched = match_round_trips(&fills);

    let mut equity = SYNTHETIC_BASE_EQUITY;
    let mut running_pnl = 0.0;
    let mut equity_curve = vec![equity];
    let mut cumulative_pnl = vec![0.0];
    let mut timestamps = vec![0i64];
    let mut equity_points = vec![EquityPoint {
        timestamp: 0,
        equity,
        cash: equity,
        position_size: 0.0,
    }];

    for rt in &matched.round_trips {
        equity += rt.pnl;
        running_pnl += rt.pnl;
        equity_curve.push(equity);
        cumulative_pnl.push(running_pnl);
        timestamps.push(rt.close_time);
        equity_points.push(EquityPoint {
            timestamp: rt.close_time,
            equity,
            cash: equity,
            position_size: 0.0,
        });
    }

    let mut monthly: BTreeMap<String, f64> = BTreeMap::new();
    for rt in &matched.round_trips {
        *monthly.entry(month_key(rt.close_time)).or_insert(0.0) += rt.pnl;
    }
    let monthly_returns = monthly
        .into_iter()
        .map(|(month, pnl)| MonthlyReturn { month, pnl })
        .collect();

    let mut per_market: BTreeMap<&str, MarketPerformance> = BTreeMap::new();
    for rt in &matched.round_trips {
        let entry = per_market
            .entry(rt.market_id.as_str())
            .or_insert_with(|| MarketPerformance {
                market_id: rt.market_id.clone(),
                trades: 0,
                pnl: 0.0,
                wins: 0,
                losses: 0,
                roi_pct: 0.0,
            });
        entry.trades += 1;
        entry.pnl += rt.pnl;
        if rt.pnl > 0.0 {
            entry.wins += 1;
        } else if rt.pnl < 0.0 {
            entry.losses += 1;
        }
    }
    let mut market_performance: Vec<MarketPerformance> = per_market
        .into_values()
        .map(|mut market| {
            market.roi_pct = if market.trades > 0 {
                market.pnl / market.trades as f64 * 100.0
            } else {
                0.0
            };
            market
        })
        .collect();
    market_performance.sort_by(|a, b| {
        b.pnl
            .total_cmp(&a.pnl)
            .then_with(|| a.market_id.cmp(&b.market_id))
    });
    market_performance.truncate(MAX_MARKET_ROWS);

    let pnls: Vec<f64> = matched.round_trips.iter().map(|rt| rt.pnl).collect();
    let metrics = compute_metrics(&equity_points, &pnls, SYNTHETIC_BASE_EQUITY, metrics_config);

    TraderPerformance {
        address: address.to_string(),
        equity_curve,
        timestamps,
        cumulative_pnl,
        monthly_returns,
        market_performance,
        metrics,
    }
}

fn month_key(timestamp: i64) -> String {
    if timestamp <= 0 {
        return "unknown".to_string();
    }
    match Utc.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m").to_string(),
        _ => "unknown".to_string(),
    }
}
