use crate::value_objects::price_point::PricePoint;

#[derive(Debug, Clone)]
pub struct PriceHistoryQuery {
    pub token_id: String,
    /// Upstream window label, e.g. "1d", "1w", "max".
    pub interval: String,
    /// Bar resolution in minutes.
    pub fidelity_minutes: u32,
}

/// Port for the upstream market-data provider. The core only ever sees an
/// already materialized series.
pub trait PriceHistoryRepository {
    fn load_price_history(&self, query: &PriceHistoryQuery) -> Result<Vec<PricePoint>, String>;
}
