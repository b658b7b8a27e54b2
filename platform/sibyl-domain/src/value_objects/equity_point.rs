use serde::{Deserialize, Serialize};

/// One point of the equity curve: cash plus mark-to-market value of the open
/// position at that bar's price. `position_size` is signed (negative while
/// short).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub equity: f64,
    pub cash: f64,
    pub position_size: f64,
}
