use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    #[serde(alias = "buy")]
    OpenLong,
    CloseLong,
    #[serde(alias = "sell")]
    OpenShort,
    CloseShort,
}

impl TradeKind {
    pub fn is_close(self) -> bool {
        matches!(self, TradeKind::CloseLong | TradeKind::CloseShort)
    }
}

/// Why a closing trade happened: a sell/buy signal, or the synthetic close
/// of a still-open position at the final bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Signal,
    EndOfData,
}

/// Immutable record of one executed trade. `pnl` is the realized P&L net of
/// the closing fee; opens carry `pnl = 0` and only their own fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(rename = "type")]
    pub kind: TradeKind,
    pub timestamp: i64,
    pub price: f64,
    pub size: f64,
    pub pnl: f64,
    pub fee: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CloseReason>,
}

#[cfg(test)]
mod tests {
    use super::{CloseReason, TradeKind, TradeRecord};

    #[test]
    fn serializes_kind_and_reason_snake_case() {
        let record = TradeRecord {
            kind: TradeKind::CloseShort,
            timestamp: 10,
            price: 0.55,
            size: 100.0,
            pnl: 4.5,
            fee: 0.1,
            reason: Some(CloseReason::EndOfData),
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["type"], "close_short");
        assert_eq!(json["reason"], "end_of_data");
    }

    #[test]
    fn accepts_buy_sell_aliases() {
        let record: TradeRecord = serde_json::from_value(serde_json::json!({
            "type": "buy",
            "timestamp": 1,
            "price": 0.5,
            "size": 10.0,
            "pnl": 0.0,
            "fee": 0.0,
        }))
        .expect("deserialize");
        assert_eq!(record.kind, TradeKind::OpenLong);
    }
}
