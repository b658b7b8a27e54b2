//! Round-trip reconstruction: matches a trader's buy and sell fills per
//! market, FIFO, consuming partial fills, to recover realized P&L without
//! access to the venue's own accounting.

use crate::value_objects::fill::Fill;
use crate::value_objects::side::Side;
use std::collections::BTreeMap;

/// Residual sizes below this are treated as fully consumed.
const SIZE_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub market_id: String,
    pub size: f64,
    pub open_price: f64,
    pub close_price: f64,
    pub pnl: f64,
    pub open_time: i64,
    pub close_time: i64,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedHistory {
    pub total_pnl: f64,
    pub win_rate_pct: f64,
    pub round_trips: Vec<RoundTrip>,
}

/// Matches buys against sells per market in timestamp order. Output round
/// trips are sorted by close time, so the same fills always produce the
/// same history.
pub fn match_round_trips(fills: &[Fill]) -> MatchedHistory {
    if fills.is_empty() {
        return MatchedHistory::default();
    }

    let mut by_market: BTreeMap<&str, Vec<&Fill>> = BTreeMap::new();
    for fill in fills {
        by_market.entry(fill.market_id.as_str()).or_default().push(fill);
    }

    let mut round_trips = Vec::new();
    for (market_id, mut market_fills) in by_market {
        market_fills.sort_by_key(|fill| fill.timestamp);

        let mut buys: Vec<(f64, f64, i64)> = Vec::new();
        let mut sells: Vec<(f64, f64, i64)> = Vec::new();
        for fill in market_fills {
            match fill.side {
                Side::Buy => buys.push((fill.price, fill.size, fill.timestamp)),
                Side::Sell => sells.push((fill.price, fill.size, fill.timestamp)),
            }
        }

        let mut bi = 0;
        let mut si = 0;
        while bi < buys.len() && si < sells.len() {
            let (buy_price, buy_size, buy_ts) = buys[bi];
            let (sell_price, sell_size, sell_ts) = sells[si];

            let matched = buy_size.min(sell_size);
            if matched <= 0.0 {
                bi += 1;
                si += 1;
                continue;
            }

            round_trips.push(RoundTrip {
                market_id: market_id.to_string(),
                size: matched,
                open_price: buy_price,
                close_price: sell_price,
                pnl: (sell_price - buy_price) * matched,
                open_time: buy_ts,
                close_time: sell_ts,
                duration_seconds: (sell_ts - buy_ts).abs(),
            });

            let remaining_buy = buy_size - matched;
            let remaining_sell = sell_size - matched;
            if remaining_buy <= SIZE_EPSILON {
                bi += 1;
            } else {
                buys[bi].1 = remaining_buy;
            }
            if remaining_sell <= SIZE_EPSILON {
                si += 1;
            } else {
                sells[si].1 = remaining_sell;
            }
        }
    }

    round_trips.sort_by(|a, b| {
        a.close_time
            .cmp(&b.close_time)
            .then_with(|| a.market_id.cmp(&b.market_id))
            .then_with(|| a.open_time.cmp(&b.open_time))
    });

    let total_pnl = round_trips.iter().map(|rt| rt.pnl).sum();
    let wins = round_trips.iter().filter(|rt| rt.pnl > 0.0).count();
    let win_rate_pct = if round_trips.is_empty() {
        0.0
    } else {
        wins as f64 / round_trips.len() as f64 * 100.0
    };

    MatchedHistory {
        total_pnl,
        win_rate_pct,
        round_trips,
    }
}

#[cfg(test)]
mod tests {
    use super::match_round_trips;
    use crate::value_objects::fill::Fill;
    use crate::value_objects::side::Side;

    fn fill(ts: i64, market: &str, side: Side, price: f64, size: f64) -> Fill {
        Fill {
            timestamp: ts,
            market_id: market.to_string(),
            side,
            price,
            size,
        }
    }

    #[test]
    fn matches_a_simple_round_trip() {
        let fills = vec![
            fill(10, "m1", Side::Buy, 0.40, 100.0),
            fill(20, "m1", Side::Sell, 0.55, 100.0),
        ];
        let matched = match_round_trips(&fills);
        assert_eq!(matched.round_trips.len(), 1);
        let rt = &matched.round_trips[0];
        assert!((rt.pnl - 15.0).abs() < 1e-9);
        assert_eq!(rt.duration_seconds, 10);
        assert!((matched.win_rate_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn consumes_partial_fills_fifo() {
        let fills = vec![
            fill(10, "m1", Side::Buy, 0.40, 100.0),
            fill(20, "m1", Side::Sell, 0.50, 60.0),
            fill(30, "m1", Side::Sell, 0.60, 40.0),
        ];
        let matched = match_round_trips(&fills);
        assert_eq!(matched.round_trips.len(), 2);
        assert!((matched.round_trips[0].size - 60.0).abs() < 1e-9);
        assert!((matched.round_trips[1].size - 40.0).abs() < 1e-9);
        assert!((matched.total_pnl - (6.0 + 8.0)).abs() < 1e-9);
    }

    #[test]
    fn keeps_markets_separate() {
        let fills = vec![
            fill(10, "m1", Side::Buy, 0.40, 10.0),
            fill(15, "m2", Side::Sell, 0.70, 10.0),
            fill(20, "m2", Side::Buy, 0.60, 10.0),
            fill(25, "m1", Side::Sell, 0.50, 10.0),
        ];
        let matched = match_round_trips(&fills);
        assert_eq!(matched.round_trips.len(), 2);
        assert!(matched
            .round_trips
            .iter()
            .any(|rt| rt.market_id == "m1" && (rt.pnl - 1.0).abs() < 1e-9));
        assert!(matched
            .round_trips
            .iter()
            .any(|rt| rt.market_id == "m2" && (rt.pnl - 1.0).abs() < 1e-9));
    }

    #[test]
    fn unmatched_fills_produce_no_round_trips() {
        let fills = vec![fill(10, "m1", Side::Buy, 0.40, 100.0)];
        let matched = match_round_trips(&fills);
        assert!(matched.round_trips.is_empty());
        assert_eq!(matched.total_pnl, 0.0);
    }

    #[test]
    fn identical_input_yields_identical_history() {
        let fills = vec![
            fill(10, "m2", Side::Buy, 0.30, 50.0),
            fill(12, "m1", Side::Buy, 0.40, 100.0),
            fill(20, "m1", Side::Sell, 0.45, 70.0),
            fill(22, "m2", Side::Sell, 0.25, 50.0),
        ];
        assert_eq!(match_round_trips(&fills), match_round_trips(&fills));
    }
}
