use serde::{Deserialize, Serialize};

/// One bar of the historical price series. Prediction-market share prices
/// sit in [0, 1]; general assets are unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

/// Checks that timestamps are non-decreasing and prices are finite and
/// positive. Duplicate timestamps are permitted and treated as consecutive
/// bars.
pub fn validate_series(series: &[PricePoint]) -> Result<(), String> {
    let mut prev: Option<i64> = None;
    for (idx, point) in series.iter().enumerate() {
        if !point.price.is_finite() || point.price <= 0.0 {
            return Err(format!(
                "non-positive or non-finite price {} at index {}",
                point.price, idx
            ));
        }
        if let Some(prev_ts) = prev {
            if point.timestamp < prev_ts {
                return Err(format!(
                    "timestamps out of order at index {} ({} < {})",
                    idx, point.timestamp, prev_ts
                ));
            }
        }
        prev = Some(point.timestamp);
    }
    Ok(())
}
