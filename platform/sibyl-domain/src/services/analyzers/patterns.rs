//! Trader behavior classifier: extracts feature scores from a fill history
//! and reduces them to one labeled strategy with a confidence score.
//!
//! Sparse or patternless data degrades to `unknown`/low confidence; the
//! classifier never fails.

use crate::entities::detection::{
    CategoryFocus, DayBucket, HoldingStyle, PatternScores, PositionSizing, SizingStrategy,
    StrategyDetection, StrategyLabel, TimingAnalysis,
};
use crate::services::analyzers::{format_duration, sorted_fills, DAY_NAMES};
use crate::services::ledger::{match_round_trips, RoundTrip};
use crate::value_objects::fill::Fill;
use crate::value_objects::side::Side;
use chrono::{Datelike, TimeZone, Timelike, Utc};
use std::collections::BTreeMap;

/// Heuristic thresholds, all named and overridable. Defaults follow the
/// buckets documented in DESIGN.md.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// Below this many fills, confidence is capped regardless of scores.
    pub min_trades: usize,
    pub sparse_confidence_cap: f64,
    /// All pattern scores below this floor classify as `unknown`.
    pub score_floor: f64,
    /// Fractional price move that counts as a directional signal.
    pub move_threshold: f64,
    /// Size coefficient of variation below which sizing is `fixed`.
    pub fixed_cv_threshold: f64,
    /// Ratio of post-loss size to overall size that flags martingale-like
    /// sizing.
    pub martingale_step_up: f64,
    pub scalping_max_secs: i64,
    pub intraday_max_secs: i64,
    pub swing_max_secs: i64,
    pub market_making_min_trades: usize,
    pub market_making_max_markets: usize,
    /// Max |buys - sells| / total for flow to count as balanced.
    pub market_making_balance_tolerance: f64,
    /// Half-width of the window around an event marker.
    pub event_window_secs: i64,
    pub top_markets: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_trades: 10,
            sparse_confidence_cap: 0.2,
            score_floor: 0.15,
            move_threshold: 0.01,
            fixed_cv_threshold: 0.3,
            martingale_step_up: 1.25,
            scalping_max_secs: 3600,
            intraday_max_secs: 86_400,
            swing_max_secs: 604_800,
            market_making_min_trades: 50,
            market_making_max_markets: 5,
            market_making_balance_tolerance: 0.3,
            event_window_secs: 1800,
            top_markets: 5,
        }
    }
}

/// Classifies a trader's fill history. `event_markers` are external event
/// timestamps; without them the event-driven category scores zero and
/// degrades instead of being guessed.
pub fn classify(
    address: &str,
    fills: &[Fill],
    event_markers: Option<&[i64]>,
    config: &ClassifierConfig,
) -> StrategyDetection {
    if fills.is_empty() {
        return StrategyDetection {
            address: address.to_string(),
            primary_strategy: StrategyLabel::Unknown,
            confidence: 0.0,
            patterns: None,
            timing_analysis: None,
            position_sizing: None,
            category_focus: Vec::new(),
            summary: "Insufficient trade data for analysis.".to_string(),
        };
    }

    let fills = sorted_fills(fills);
    let matched = match_round_trips(&fills);

    let (momentum_score, mean_reversion_score, trend_signals, contrarian_signals) =
        directional_scores(&fills, config.move_threshold);
    let timing = timing_analysis(&fills, &matched.round_trips, config);
    let sizing = sizing_analysis(&fills, &matched.round_trips, config);
    let (concentration, market_counts) = concentration_analysis(&fills);
    let category_focus = category_focus(&market_counts, fills.len(), config.top_markets);

    let balanced = balanced_flow(&fills, config.market_making_balance_tolerance);
    let event_score = event_markers
        .map(|markers| event_cluster_score(&fills, markers, config.event_window_secs))
        .unwrap_or(0.0);

    let scores = [
        (
            StrategyLabel::Momentum,
            momentum_score * 0.4
                + style_bonus(timing.holding_style(), &[HoldingStyle::Scalping, HoldingStyle::Intraday], 0.2),
        ),
        (
            StrategyLabel::MeanReversion,
            mean_reversion_score * 0.4
                + if sizing.strategy == SizingStrategy::Fixed {
                    0.1
                } else {
                    0.0
                },
        ),
        (
            StrategyLabel::TrendFollowing,
            momentum_score * 0.3
                + style_bonus(timing.holding_style(), &[HoldingStyle::Swing, HoldingStyle::Position], 0.2),
        ),
        (
            StrategyLabel::MarketMaking,
            if fills.len() >= config.market_making_min_trades
                && market_counts.len() < config.market_making_max_markets
                && sizing.coefficient_of_variation < config.fixed_cv_threshold
                && balanced
            {
                0.3
            } else {
                0.0
            },
        ),
        (StrategyLabel::EventDriven, event_score),
    ];

    let (top_label, top_score) = scores
        .iter()
        .copied()
        .fold((StrategyLabel::Unknown, f64::MIN), |best, (label, score)| {
            if score > best.1 {
                (label, score)
            } else {
                best
            }
        });
    let runner_up = scores
        .iter()
        .filter(|(label, _)| *label != top_label)
        .map(|(_, score)| *score)
        .fold(0.0f64, f64::max);

    let (primary_strategy, mut confidence) = if top_score < config.score_floor {
        (StrategyLabel::Unknown, 0.0)
    } else {
        let dominance = ((top_score - runner_up) / top_score).clamp(0.0, 1.0);
        (top_label, dominance)
    };
    if fills.len() < config.min_trades {
        confidence = confidence.min(config.sparse_confidence_cap);
    }

    let patterns = PatternScores {
        momentum_score,
        mean_reversion_score,
        market_concentration: concentration,
        holding_style: timing.holding_style(),
        trend_following_signals: trend_signals,
        contrarian_signals,
    };

    let summary = summarize(
        primary_strategy,
        confidence,
        market_counts.len(),
        matched.win_rate_pct,
        matched.total_pnl,
        &timing.analysis,
        &sizing,
    );

    StrategyDetection {
        address: address.to_string(),
        primary_strategy,
        confidence,
        patterns: Some(patterns),
        timing_analysis: Some(timing.analysis),
        position_sizing: Some(sizing),
        category_focus,
        summary,
    }
}

fn style_bonus(style: HoldingStyle, styles: &[HoldingStyle], bonus: f64) -> f64 {
    if styles.contains(&style) {
        bonus
    } else {
        0.0
    }
}

/// Fraction of directional fills made with vs. against the preceding price
/// movement in the fill stream.
fn directional_scores(fills: &[Fill], move_threshold: f64) -> (f64, f64, u64, u64) {
    let mut trend = 0u64;
    let mut contrarian = 0u64;
    for pair in fills.windows(2) {
        let prev = pair[0].price;
        let curr = pair[1].price;
        if prev <= 0.0 || curr <= 0.0 {
            continue;
        }
        let price_change = (curr - prev) / prev;
        let is_buy = pair[1].side == Side::Buy;
        if (price_change > move_threshold && is_buy) || (price_change < -move_threshold && !is_buy)
        {
            trend += 1;
        } else if (price_change < -move_threshold && is_buy)
            || (price_change > move_threshold && !is_buy)
        {
            contrarian += 1;
        }
    }

    let total = trend + contrarian;
    if total == 0 {
        (0.0, 0.0, 0, 0)
    } else {
        (
            trend as f64 / total as f64,
            contrarian as f64 / total as f64,
            trend,
            contrarian,
        )
    }
}

struct Timing {
    analysis: TimingAnalysis,
    style: HoldingStyle,
}

impl Timing {
    fn holding_style(&self) -> HoldingStyle {
        self.style
    }
}

fn timing_analysis(fills: &[Fill], round_trips: &[RoundTrip], config: &ClassifierConfig) -> Timing {
    let mut hour_distribution: BTreeMap<u32, u64> = BTreeMap::new();
    let mut day_counts = [0u64; 7];
    for fill in fills {
        if fill.timestamp <= 0 {
            continue;
        }
        if let chrono::LocalResult::Single(dt) = Utc.timestamp_opt(fill.timestamp, 0) {
            *hour_distribution.entry(dt.hour()).or_insert(0) += 1;
            day_counts[dt.weekday().num_days_from_monday() as usize] += 1;
        }
    }

    let peak_hour_utc = hour_distribution
        .iter()
        .fold((0u32, 0u64), |best, (&hour, &count)| {
            if count > best.1 {
                (hour, count)
            } else {
                best
            }
        })
        .0;
    let peak_day_index = day_counts
        .iter()
        .enumerate()
        .fold((0usize, 0u64), |best, (idx, &count)| {
            if count > best.1 {
                (idx, count)
            } else {
                best
            }
        })
        .0;

    let day_distribution = day_counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(idx, &count)| DayBucket {
            day: DAY_NAMES[idx].to_string(),
            trades: count,
        })
        .collect();

    let durations: Vec<i64> = round_trips
        .iter()
        .map(|rt| rt.duration_seconds)
        .filter(|&secs| secs > 0)
        .collect();
    let avg_holding_seconds = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    };

    let style = if avg_holding_seconds < config.scalping_max_secs as f64 {
        HoldingStyle::Scalping
    } else if avg_holding_seconds < config.intraday_max_secs as f64 {
        HoldingStyle::Intraday
    } else if avg_holding_seconds < config.swing_max_secs as f64 {
        HoldingStyle::Swing
    } else {
        HoldingStyle::Position
    };

    Timing {
        analysis: TimingAnalysis {
            peak_hour_utc,
            peak_day: DAY_NAMES[peak_day_index].to_string(),
            hour_distribution,
            day_distribution,
            avg_holding_seconds,
            avg_holding_human: format_duration(avg_holding_seconds),
        },
        style,
    }
}

fn sizing_analysis(
    fills: &[Fill],
    round_trips: &[RoundTrip],
    config: &ClassifierConfig,
) -> PositionSizing {
    let sizes: Vec<f64> = fills.iter().map(|fill| fill.size).filter(|&s| s > 0.0).collect();
    if sizes.is_empty() {
        return PositionSizing {
            avg_size: 0.0,
            max_size: 0.0,
            min_size: 0.0,
            std_dev: 0.0,
            coefficient_of_variation: 0.0,
            strategy: SizingStrategy::Fixed,
        };
    }

    let avg_size = sizes.iter().sum::<f64>() / sizes.len() as f64;
    let max_size = sizes.iter().copied().fold(f64::MIN, f64::max);
    let min_size = sizes.iter().copied().fold(f64::MAX, f64::min);
    let std_dev = if sizes.len() > 1 {
        (sizes
            .iter()
            .map(|s| (s - avg_size) * (s - avg_size))
            .sum::<f64>()
            / (sizes.len() - 1) as f64)
            .sqrt()
    } else {
        0.0
    };
    let coefficient_of_variation = if avg_size > 0.0 { std_dev / avg_size } else { 0.0 };

    let strategy = if coefficient_of_variation < config.fixed_cv_threshold {
        SizingStrategy::Fixed
    } else if steps_up_after_losses(fills, round_trips, avg_size, config.martingale_step_up) {
        SizingStrategy::MartingaleLike
    } else {
        SizingStrategy::Variable
    };

    PositionSizing {
        avg_size,
        max_size,
        min_size,
        std_dev,
        coefficient_of_variation,
        strategy,
    }
}

/// Heuristic, not a strict classifier: compares the average size of the
/// first fill after each losing round trip against the overall average.
fn steps_up_after_losses(
    fills: &[Fill],
    round_trips: &[RoundTrip],
    avg_size: f64,
    step_up: f64,
) -> bool {
    if avg_size <= 0.0 {
        return false;
    }
    let mut post_loss_sizes = Vec::new();
    for rt in round_trips.iter().filter(|rt| rt.pnl < 0.0) {
        if let Some(next) = fills.iter().find(|fill| fill.timestamp > rt.close_time) {
            post_loss_sizes.push(next.size);
        }
    }
    if post_loss_sizes.is_empty() {
        return false;
    }
    let post_loss_avg = post_loss_sizes.iter().sum::<f64>() / post_loss_sizes.len() as f64;
    post_loss_avg / avg_size > step_up
}

/// Herfindahl index over per-market volume shares; higher = more
/// concentrated.
fn concentration_analysis(fills: &[Fill]) -> (f64, BTreeMap<String, u64>) {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut volumes: BTreeMap<String, f64> = BTreeMap::new();
    let mut total_volume = 0.0;
    for fill in fills {
        *counts.entry(fill.market_id.clone()).or_insert(0) += 1;
        let volume = fill.price * fill.size;
        *volumes.entry(fill.market_id.clone()).or_insert(0.0) += volume;
        total_volume += volume;
    }

    let concentration = if total_volume > 0.0 {
        volumes
            .values()
            .map(|v| {
                let share = v / total_volume;
                share * share
            })
            .sum()
    } else {
        0.0
    };

    (concentration, counts)
}

/// Top-N markets by trade count. Percentages are floored to one decimal so
/// they can never sum above 100.
fn category_focus(
    market_counts: &BTreeMap<String, u64>,
    total: usize,
    top_n: usize,
) -> Vec<CategoryFocus> {
    let mut ranked: Vec<(&String, &u64)> = market_counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(market_id, &count)| CategoryFocus {
            market_id: market_id.clone(),
            trade_count: count,
            pct: (count as f64 / total as f64 * 1000.0).floor() / 10.0,
        })
        .collect()
}

fn balanced_flow(fills: &[Fill], tolerance: f64) -> bool {
    let buys = fills.iter().filter(|fill| fill.side == Side::Buy).count() as f64;
    let sells = fills.len() as f64 - buys;
    (buys - sells).abs() / fills.len() as f64 <= tolerance
}

/// Fraction of fills landing within the window of any event marker, scaled
/// to a score comparable with the directional features.
fn event_cluster_score(fills: &[Fill], markers: &[i64], window_secs: i64) -> f64 {
    if markers.is_empty() {
        return 0.0;
    }
    let clustered = fills
        .iter()
        .filter(|fill| {
            markers
                .iter()
                .any(|&marker| (fill.timestamp - marker).abs() <= window_secs)
        })
        .count();
    clustered as f64 / fills.len() as f64 * 0.5
}

#[allow(clippy::too_many_arguments)]
fn summarize(
    primary: StrategyLabel,
    confidence: f64,
    markets: usize,
    win_rate_pct: f64,
    total_pnl: f64,
    timing: &TimingAnalysis,
    sizing: &PositionSizing,
) -> String {
    if primary == StrategyLabel::Unknown {
        return format!(
            "No dominant strategy pattern across {} markets ({:.1}% win rate, net PnL ${:.2}).",
            markets, win_rate_pct, total_pnl
        );
    }
    let sizing_label = match sizing.strategy {
        SizingStrategy::Fixed => "fixed",
        SizingStrategy::Variable => "variable",
        SizingStrategy::MartingaleLike => "martingale-like",
    };
    format!(
        "Primarily a {} trader ({:.0}% confidence). Trades across {} markets with a {:.1}% win rate. Average holding: {}. Position sizing: {}. Net PnL: ${:.2}.",
        primary.as_str(),
        confidence * 100.0,
        markets,
        win_rate_pct,
        timing.avg_holding_human,
        sizing_label,
        total_pnl
    )
}

#[cfg(test)]
mod tests {
    use super::{classify, ClassifierConfig};
    use crate::entities::detection::{SizingStrategy, StrategyLabel};
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
    fn empty_history_degrades_to_unknown() {
        let detection = classify("0xabc", &[], None, &ClassifierConfig::default());
        assert_eq!(detection.primary_strategy, StrategyLabel::Unknown);
        assert_eq!(detection.confidence, 0.0);
        assert!(detection.patterns.is_none());
    }

    #[test]
    fn momentum_heavy_history_classifies_as_momentum() {
        // Rising prices, ~90% of directional fills with the move,
        // concentrated in two markets.
        let mut fills = Vec::new();
        for i in 0..50i64 {
            let market = if i < 40 { "m1" } else { "m2" };
            let side = if i % 10 == 5 { Side::Sell } else { Side::Buy };
            fills.push(fill(
                1_700_000_000 + i * 600,
                market,
                side,
                0.30 + i as f64 * 0.01,
                10.0,
            ));
        }
        let detection = classify("0xabc", &fills, None, &ClassifierConfig::default());
        assert_eq!(detection.primary_strategy, StrategyLabel::Momentum);
        let patterns = detection.patterns.expect("patterns");
        assert!(patterns.momentum_score > 0.85);
        assert!(detection.confidence > 0.5);
        assert!(patterns.market_concentration > 0.4);
    }

    #[test]
    fn sparse_history_forces_low_confidence() {
        let fills: Vec<Fill> = (0..5i64)
            .map(|i| {
                fill(
                    1_700_000_000 + i * 600,
                    "m1",
                    Side::Buy,
                    0.30 + i as f64 * 0.05,
                    10.0,
                )
            })
            .collect();
        let config = ClassifierConfig::default();
        let detection = classify("0xabc", &fills, None, &config);
        assert!(detection.confidence <= config.sparse_confidence_cap);
    }

    #[test]
    fn classification_is_idempotent() {
        let fills: Vec<Fill> = (0..30i64)
            .map(|i| {
                let side = if i % 3 == 0 { Side::Sell } else { Side::Buy };
                fill(
                    1_700_000_000 + i * 3600,
                    if i % 4 == 0 { "m2" } else { "m1" },
                    side,
                    0.4 + (i % 7) as f64 * 0.02,
                    5.0 + (i % 3) as f64,
                )
            })
            .collect();
        let config = ClassifierConfig::default();
        let first = classify("0xabc", &fills, None, &config);
        let second = classify("0xabc", &fills, None, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn category_focus_percentages_never_exceed_hundred() {
        let fills: Vec<Fill> = (0..7i64)
            .map(|i| {
                fill(
                    1_700_000_000 + i,
                    &format!("m{}", i % 3),
                    Side::Buy,
                    0.5,
                    1.0,
                )
            })
            .collect();
        let detection = classify("0xabc", &fills, None, &ClassifierConfig::default());
        let total_pct: f64 = detection.category_focus.iter().map(|c| c.pct).sum();
        assert!(total_pct <= 100.0);
    }

    #[test]
    fn event_driven_without_markers_is_never_guessed() {
        // All fills tightly clustered, but no markers supplied.
        let fills: Vec<Fill> = (0..60i64)
            .map(|i| fill(1_700_000_000 + i, "m1", Side::Buy, 0.5, 10.0))
            .collect();
        let detection = classify("0xabc", &fills, None, &ClassifierConfig::default());
        assert_ne!(detection.primary_strategy, StrategyLabel::EventDriven);

        let markers = vec![1_700_000_030];
        let with_markers = classify(
            "0xabc",
            &fills,
            Some(&markers),
            &ClassifierConfig::default(),
        );
        assert_eq!(
            with_markers.primary_strategy,
            StrategyLabel::EventDriven
        );
    }

    #[test]
    fn flat_sizes_classify_as_fixed() {
        let fills: Vec<Fill> = (0..20i64)
            .map(|i| fill(1_700_000_000 + i * 60, "m1", Side::Buy, 0.5, 10.0))
            .collect();
        let detection = classify("0xabc", &fills, None, &ClassifierConfig::default());
        let sizing = detection.position_sizing.expect("sizing");
        assert_eq!(sizing.strategy, SizingStrategy::Fixed);
        assert!(sizing.coefficient_of_variation < 0.3);
    }
}
