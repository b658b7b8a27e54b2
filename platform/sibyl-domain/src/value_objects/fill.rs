use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

/// A trader's historical fill as reported by the upstream data API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: i64,
    pub market_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
}
