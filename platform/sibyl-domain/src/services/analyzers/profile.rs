//! Activity profile: volume, market spread, and realized win rate for one
//! trader, derived from fills only.

use crate::entities::performance::{MarketActivity, TraderProfile};
use crate::services::analyzers::sorted_fills;
use crate::services::ledger::match_round_trips;
use crate::value_objects::fill::Fill;
use crate::value_objects::side::Side;
use std::collections::BTreeMap;

const MAX_MARKET_ROWS: usize = 20;

pub fn build_profile(address: &str, fills: &[Fill]) -> TraderProfile {
    if fills.is_empty() {
        return TraderProfile {
            address: address.to_string(),
            total_trades: 0,
            total_volume: 0.0,
            total_pnl: 0.0,
            roi_pct: 0.0,
            win_rate_pct: 0.0,
            avg_position_size: 0.0,
            unique_markets: 0,
            first_trade: None,
            last_trade: None,
            markets_breakdown: Vec::new(),
        };
    }

    let fills = sorted_fills(fills);
    let mut total_volume = 0.0;
    let mut markets: BTreeMap<&str, MarketActivity> = BTreeMap::new();
    for fill in &fills {
        let volume = fill.price * fill.size;
        total_volume += volume;
        let entry = markets
            .entry(fill.market_id.as_str())
            .or_insert_with(|| MarketActivity {
                market_id: fill.market_id.clone(),
                trades: 0,
                volume: 0.0,
                buys: 0,
                sells: 0,
            });
        entry.trades += 1;
        entry.volume += volume;
        match fill.side {
            Side::Buy => entry.buys += 1,
            Side::Sell => entry.sells += 1,
        }
    }

    let matched = match_round_trips(&fills);
    // Half the traded volume as a notional invested figure: each round trip
    // counts its notional twice (once per leg).
    let invested = total_volume / 2.0;
    let roi_pct = if invested > 0.0 {
        matched.total_pnl / invested * 100.0
    } else {
        0.0
    };

    let unique_markets = markets.len();
    let mut markets_breakdown: Vec<MarketActivity> = markets.into_values().collect();
    markets_breakdown.sort_by(|a, b| {
        b.volume
            .total_cmp(&a.volume)
            .then_with(|| a.market_id.cmp(&b.market_id))
    });
    markets_breakdown.truncate(MAX_MARKET_ROWS);

    TraderProfile {
        address: address.to_string(),
        total_trades: fills.len(),
        total_volume,
        total_pnl: matched.total_pnl,
        roi_pct,
        win_rate_pct: matched.win_rate_pct,
        avg_position_size: total_volume / fills.len() as f64,
        unique_markets,
        first_trade: fills.first().map(|fill| fill.timestamp),
        last_trade: fills.last().map(|fill| fill.timestamp),
        markets_breakdown,
    }
}
