use crate::value_objects::fill::Fill;

#[derive(Debug, Clone)]
pub struct FillQuery {
    pub address: String,
    pub limit: usize,
}

/// Port for the upstream trade-history provider.
pub trait TradeHistoryRepository {
    fn load_fills(&self, query: &FillQuery) -> Result<Vec<Fill>, String>;
}
