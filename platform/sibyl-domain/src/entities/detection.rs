use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyLabel {
    Momentum,
    MeanReversion,
    TrendFollowing,
    MarketMaking,
    EventDriven,
    Unknown,
}

impl StrategyLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyLabel::Momentum => "momentum",
            StrategyLabel::MeanReversion => "mean reversion",
            StrategyLabel::TrendFollowing => "trend following",
            StrategyLabel::MarketMaking => "market making",
            StrategyLabel::EventDriven => "event driven",
            StrategyLabel::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingStyle {
    Scalping,
    Intraday,
    Swing,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingStrategy {
    Fixed,
    Variable,
    MartingaleLike,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternScores {
    pub momentum_score: f64,
    pub mean_reversion_score: f64,
    pub market_concentration: f64,
    pub holding_style: HoldingStyle,
    pub trend_following_signals: u64,
    pub contrarian_signals: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub day: String,
    pub trades: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub peak_hour_utc: u32,
    pub peak_day: String,
    pub hour_distribution: BTreeMap<u32, u64>,
    pub day_distribution: Vec<DayBucket>,
    pub avg_holding_seconds: f64,
    pub avg_holding_human: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub avg_size: f64,
    pub max_size: f64,
    pub min_size: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub strategy: SizingStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFocus {
    pub market_id: String,
    pub trade_count: u64,
    pub pct: f64,
}

/// Derived fresh on each analysis request; a pure function of the trade
/// history, so identical input yields an identical detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDetection {
    pub address: String,
    pub primary_strategy: StrategyLabel,
    pub confidence: f64,
    pub patterns: Option<PatternScores>,
    pub timing_analysis: Option<TimingAnalysis>,
    pub position_sizing: Option<PositionSizing>,
    pub category_focus: Vec<CategoryFocus>,
    pub summary: String,
}
