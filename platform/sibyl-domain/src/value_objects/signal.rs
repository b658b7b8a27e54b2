/// Decision output of strategy logic: buy (+1), sell (-1), hold (0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sell,
    Hold,
    Buy,
}

impl Signal {
    pub fn as_int(self) -> i64 {
        match self {
            Signal::Sell => -1,
            Signal::Hold => 0,
            Signal::Buy => 1,
        }
    }

    /// Maps an integer decision back to a signal. Values outside {-1, 0, 1}
    /// coerce to hold rather than erroring.
    pub fn from_int(value: i64) -> Self {
        match value {
            1 => Signal::Buy,
            -1 => Signal::Sell,
            _ => Signal::Hold,
        }
    }
}
