//! Backtest simulator: drives a signal source across an ordered price
//! series, maintaining a flat/long/short position state machine and the
//! cash book.
//!
//! Bars are processed strictly in timestamp order. The source at bar `i`
//! receives only `prices[0..=i]`; the first bar only seeds history. A
//! position still open after the last bar is force-closed at the final
//! price so the equity curve ends on the fully realized value.

use crate::errors::EngineError;
use crate::services::audit::AuditEvent;
use crate::services::sandbox::SignalSource;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::price_point::{validate_series, PricePoint};
use crate::value_objects::signal::Signal;
use crate::value_objects::trade::{CloseReason, TradeKind, TradeRecord};
use serde_json::json;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Proportional fee applied on every open/close notional; always >= 0
    /// and subtracted from P&L.
    pub fee_rate: f64,
    /// Fraction of available cash staked by each open.
    pub size_fraction: f64,
    /// Whether an opposite signal re-opens the other side in the same bar
    /// after closing, or just goes flat.
    pub reverse_on_opposite: bool,
    /// Wall-clock ceiling for the whole run.
    pub run_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1000.0,
            fee_rate: 0.0,
            size_fraction: 1.0,
            reverse_on_opposite: true,
            run_budget: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct RunOutput {
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub audit_events: Vec<AuditEvent>,
}

enum PositionState {
    Flat,
    Long {
        size: f64,
        entry: f64,
    },
    Short {
        size: f64,
        entry: f64,
        /// Cash staked at open, held back until the short is closed.
        margin: f64,
    },
}

/// Cash plus one open position. Owned exclusively by a single run.
struct Book {
    cash: f64,
    state: PositionState,
}

impl Book {
    fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            state: PositionState::Flat,
        }
    }

    fn signed_size(&self) -> f64 {
        match &self.state {
            PositionState::Flat => 0.0,
            PositionState::Long { size, .. } => *size,
            PositionState::Short { size, .. } => -size,
        }
    }

    fn equity(&self, price: f64) -> f64 {
        match &self.state {
            PositionState::Flat => self.cash,
            PositionState::Long { size, .. } => self.cash + size * price,
            PositionState::Short {
                size,
                entry,
                margin,
            } => self.cash + margin + (entry - price) * size,
        }
    }

    fn open_long(&mut self, timestamp: i64, price: f64, fraction: f64, fee_rate: f64) -> Option<TradeRecord> {
        let stake = self.cash * fraction;
        let fee = stake * fee_rate;
        let size = (stake - fee) / price;
        if size <= 0.0 {
            return None;
        }
        self.cash -= stake;
        self.state = PositionState::Long { size, entry: price };
        Some(TradeRecord {
            kind: TradeKind::OpenLong,
            timestamp,
            price,
            size,
            pnl: 0.0,
            fee,
            reason: None,
        })
    }

    fn open_short(&mut self, timestamp: i64, price: f64, fraction: f64, fee_rate: f64) -> Option<TradeRecord> {
        let stake = self.cash * fraction;
        let fee = stake * fee_rate;
        let size = (stake - fee) / price;
        if size <= 0.0 {
            return None;
        }
        self.cash -= stake;
        self.state = PositionState::Short {
            size,
            entry: price,
            margin: stake,
        };
        Some(TradeRecord {
            kind: TradeKind::OpenShort,
            timestamp,
            price,
            size,
            pnl: 0.0,
            fee,
            reason: None,
        })
    }

    fn close(&mut self, timestamp: i64, price: f64, fee_rate: f64, reason: CloseReason) -> Option<TradeRecord> {
        match std::mem::replace(&mut self.state, PositionState::Flat) {
            PositionState::Flat => None,
            PositionState::Long { size, entry } => {
                let gross = size * price;
                let fee = gross * fee_rate;
                let pnl = (price - entry) * size - fee;
                self.cash += gross - fee;
                Some(TradeRecord {
                    kind: TradeKind::CloseLong,
                    timestamp,
                    price,
                    size,
                    pnl,
                    fee,
                    reason: Some(reason),
                })
            }
            PositionState::Short {
                size,
                entry,
                margin,
            } => {
                let fee = size * price * fee_rate;
                let pnl = (entry - price) * size - fee;
                self.cash += margin + (entry - price) * size - fee;
                Some(TradeRecord {
                    kind: TradeKind::CloseShort,
                    timestamp,
                    price,
                    size,
                    pnl,
                    fee,
                    reason: Some(reason),
                })
            }
        }
    }
}

pub struct BacktestRunner<S: SignalSource> {
    run_id: String,
    source: S,
    config: EngineConfig,
}

impl<S: SignalSource> BacktestRunner<S> {
    pub fn new(run_id: String, source: S, config: EngineConfig) -> Result<Self, EngineError> {
        if !config.initial_capital.is_finite() || config.initial_capital <= 0.0 {
            return Err(EngineError::InvalidParameter {
                name: "initial_capital".to_string(),
                reason: "must be finite and positive".to_string(),
            });
        }
        if !config.fee_rate.is_finite() || config.fee_rate < 0.0 || config.fee_rate >= 1.0 {
            return Err(EngineError::InvalidParameter {
                name: "fee_rate".to_string(),
                reason: "must be finite and in [0, 1)".to_string(),
            });
        }
        if !config.size_fraction.is_finite()
            || config.size_fraction <= 0.0
            || config.size_fraction > 1.0
        {
            return Err(EngineError::InvalidParameter {
                name: "size_fraction".to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        Ok(Self {
            run_id,
            source,
            config,
        })
    }

    /// Hands the signal source back, e.g. to inspect state a test probe
    /// recorded during the run.
    pub fn into_source(self) -> S {
        self.source
    }

    pub fn run(&mut self, series: &[PricePoint]) -> Result<RunOutput, EngineError> {
        if series.is_empty() {
            return Err(EngineError::InsufficientData(
                "empty price series".to_string(),
            ));
        }
        validate_series(series).map_err(EngineError::MalformedSeries)?;

        let prices: Vec<f64> = series.iter().map(|point| point.price).collect();
        let mut book = Book::new(self.config.initial_capital);
        let mut equity = Vec::with_capacity(series.len());
        let mut trades: Vec<TradeRecord> = Vec::new();
        let mut audit_events = vec![self.audit(
            0,
            "engine",
            "start",
            None,
            json!({
                "strategy": self.source.name(),
                "bars": series.len(),
                "initial_capital": self.config.initial_capital,
                "fee_rate": self.config.fee_rate,
                "size_fraction": self.config.size_fraction,
            }),
        )];

        equity.push(EquityPoint {
            timestamp: series[0].timestamp,
            equity: self.config.initial_capital,
            cash: book.cash,
            position_size: 0.0,
        });

        let run_start = Instant::now();
        for i in 1..series.len() {
            if run_start.elapsed() > self.config.run_budget {
                return Err(EngineError::RunTimeout {
                    bar: i,
                    budget_ms: self.config.run_budget.as_millis() as u64,
                });
            }

            let bar = series[i];
            let signal = self.source.evaluate(&prices[..=i], book.signed_size())?;

            let executed = self.apply_signal(&mut book, signal, bar);
            for trade in executed {
                audit_events.push(self.trade_audit(&trade));
                trades.push(trade);
            }

            equity.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: book.equity(bar.price),
                cash: book.cash,
                position_size: book.signed_size(),
            });
        }

        // Force-close a still-open position at the final bar for P&L
        // accounting; the last equity point becomes the realized value.
        let last = series[series.len() - 1];
        if let Some(trade) = book.close(
            last.timestamp,
            last.price,
            self.config.fee_rate,
            CloseReason::EndOfData,
        ) {
            audit_events.push(self.trade_audit(&trade));
            trades.push(trade);
            let final_point = equity.last_mut().expect("non-empty curve");
            final_point.equity = book.cash;
            final_point.cash = book.cash;
            final_point.position_size = 0.0;
        }

        let final_equity = equity.last().map(|point| point.equity).unwrap_or(0.0);
        audit_events.push(self.audit(
            last.timestamp,
            "engine",
            "complete",
            None,
            json!({
                "bars_processed": equity.len(),
                "trades": trades.len(),
                "final_equity": final_equity,
            }),
        ));

        Ok(RunOutput {
            equity,
            trades,
            audit_events,
        })
    }

    fn apply_signal(&self, book: &mut Book, signal: Signal, bar: PricePoint) -> Vec<TradeRecord> {
        let mut executed = Vec::new();
        match (signal, &book.state) {
            (Signal::Buy, PositionState::Flat) => {
                executed.extend(book.open_long(
                    bar.timestamp,
                    bar.price,
                    self.config.size_fraction,
                    self.config.fee_rate,
                ));
            }
            (Signal::Buy, PositionState::Short { .. }) => {
                executed.extend(book.close(
                    bar.timestamp,
                    bar.price,
                    self.config.fee_rate,
                    CloseReason::Signal,
                ));
                if self.config.reverse_on_opposite {
                    executed.extend(book.open_long(
                        bar.timestamp,
                        bar.price,
                        self.config.size_fraction,
                        self.config.fee_rate,
                    ));
                }
            }
            (Signal::Sell, PositionState::Flat) => {
                executed.extend(book.open_short(
                    bar.timestamp,
                    bar.price,
                    self.config.size_fraction,
                    self.config.fee_rate,
                ));
            }
            (Signal::Sell, PositionState::Long { .. }) => {
                executed.extend(book.close(
                    bar.timestamp,
                    bar.price,
                    self.config.fee_rate,
                    CloseReason::Signal,
                ));
                if self.config.reverse_on_opposite {
                    executed.extend(book.open_short(
                        bar.timestamp,
                        bar.price,
                        self.config.size_fraction,
                        self.config.fee_rate,
                    ));
                }
            }
            // No pyramiding: same-direction signals and holds are no-ops.
            _ => {}
        }
        executed
    }

    fn trade_audit(&self, trade: &TradeRecord) -> AuditEvent {
        self.audit(
            trade.timestamp,
            "trade",
            match trade.kind {
                TradeKind::OpenLong => "open_long",
                TradeKind::CloseLong => "close_long",
                TradeKind::OpenShort => "open_short",
                TradeKind::CloseShort => "close_short",
            },
            None,
            json!({
                "price": trade.price,
                "size": trade.size,
                "pnl": trade.pnl,
                "fee": trade.fee,
                "reason": trade.reason,
            }),
        )
    }

    fn audit(
        &self,
        timestamp: i64,
        stage: &str,
        action: &str,
        error: Option<String>,
        details: serde_json::Value,
    ) -> AuditEvent {
        AuditEvent {
            run_id: self.run_id.clone(),
            timestamp,
            stage: stage.to_string(),
            market: None,
            action: action.to_string(),
            error,
            details,
        }
    }
}

/// Realized P&L of each closing trade, in chronological order. This is the
/// series the metrics calculator consumes.
pub fn closed_pnls(trades: &[TradeRecord]) -> Vec<f64> {
    trades
        .iter()
        .filter(|trade| trade.kind.is_close())
        .map(|trade| trade.pnl)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{closed_pnls, BacktestRunner, EngineConfig};
    use crate::errors::EngineError;
    use crate::services::sandbox::SignalSource;
    use crate::value_objects::price_point::PricePoint;
    use crate::value_objects::signal::Signal;
    use crate::value_objects::trade::{CloseReason, TradeKind};

    struct Scripted {
        signals: Vec<Signal>,
        index: usize,
    }

    impl Scripted {
        fn new(signals: Vec<Signal>) -> Self {
            Self { signals, index: 0 }
        }
    }

    impl SignalSource for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn evaluate(&mut self, _history: &[f64], _position: f64) -> Result<Signal, EngineError> {
            let signal = self.signals.get(self.index).copied().unwrap_or(Signal::Hold);
            self.index += 1;
            Ok(signal)
        }
    }

    fn series(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(idx, &price)| PricePoint {
                timestamp: idx as i64 + 1,
                price,
            })
            .collect()
    }

    #[test]
    fn empty_series_is_insufficient_data() {
        let mut runner = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(vec![]),
            EngineConfig::default(),
        )
        .expect("runner");
        let err = runner.run(&[]).expect_err("must fail");
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn equity_curve_matches_series_length() {
        let bars = series(&[0.5, 0.52, 0.51, 0.55]);
        let mut runner = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(vec![Signal::Hold; 3]),
            EngineConfig::default(),
        )
        .expect("runner");
        let output = runner.run(&bars).expect("run");
        assert_eq!(output.equity.len(), bars.len());
        assert!(output.trades.is_empty());
    }

    #[test]
    fn long_round_trip_realizes_price_difference_at_zero_fees() {
        let bars = series(&[1.0, 1.0, 1.2, 1.2]);
        // Buy at bar 1 (price 1.0), sell at bar 2 (price 1.2).
        let signals = vec![Signal::Buy, Signal::Sell, Signal::Hold];
        let mut runner = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(signals),
            EngineConfig::default(),
        )
        .expect("runner");
        let output = runner.run(&bars).expect("run");

        // Sell signal while long closes and re-opens short; the short is
        // force-closed flat at the final bar (same price, zero pnl).
        assert_eq!(output.trades[0].kind, TradeKind::OpenLong);
        assert_eq!(output.trades[1].kind, TradeKind::CloseLong);
        assert!((output.trades[1].pnl - 200.0).abs() < 1e-9);
        let final_equity = output.equity.last().expect("curve").equity;
        assert!((final_equity - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn open_position_is_force_closed_and_flagged() {
        let bars = series(&[1.0, 1.0, 1.1]);
        let mut runner = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(vec![Signal::Buy, Signal::Hold]),
            EngineConfig::default(),
        )
        .expect("runner");
        let output = runner.run(&bars).expect("run");

        let close = output.trades.last().expect("close");
        assert_eq!(close.kind, TradeKind::CloseLong);
        assert_eq!(close.reason, Some(CloseReason::EndOfData));
        // equity_curve last equals realized final equity.
        let final_point = output.equity.last().expect("curve");
        assert!((final_point.equity - final_point.cash).abs() < 1e-12);
        assert_eq!(final_point.position_size, 0.0);
    }

    #[test]
    fn short_accounting_keeps_equity_consistent() {
        let bars = series(&[1.0, 1.0, 0.8, 0.8]);
        let signals = vec![Signal::Sell, Signal::Hold, Signal::Hold];
        let mut runner = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(signals),
            EngineConfig::default(),
        )
        .expect("runner");
        let output = runner.run(&bars).expect("run");

        // Shorted 1000 shares at 1.0; price fell to 0.8 => +200 profit.
        let final_equity = output.equity.last().expect("curve").equity;
        assert!((final_equity - 1200.0).abs() < 1e-9);
        let close = output.trades.last().expect("close");
        assert_eq!(close.kind, TradeKind::CloseShort);
        assert!((close.pnl - 200.0).abs() < 1e-9);
    }

    #[test]
    fn fees_reduce_pnl_and_are_never_negative() {
        let bars = series(&[1.0, 1.0, 1.2, 1.2]);
        let zero_fee = {
            let mut runner = BacktestRunner::new(
                "t".to_string(),
                Scripted::new(vec![Signal::Buy, Signal::Hold, Signal::Hold]),
                EngineConfig::default(),
            )
            .expect("runner");
            runner.run(&bars).expect("run")
        };
        let with_fee = {
            let mut runner = BacktestRunner::new(
                "t".to_string(),
                Scripted::new(vec![Signal::Buy, Signal::Hold, Signal::Hold]),
                EngineConfig {
                    fee_rate: 0.01,
                    ..EngineConfig::default()
                },
            )
            .expect("runner");
            runner.run(&bars).expect("run")
        };

        let zero_final = zero_fee.equity.last().expect("curve").equity;
        let fee_final = with_fee.equity.last().expect("curve").equity;
        assert!(fee_final < zero_final);
        assert!(with_fee.trades.iter().all(|trade| trade.fee >= 0.0));
    }

    #[test]
    fn same_direction_signal_does_not_pyramid() {
        let bars = series(&[1.0, 1.0, 1.1, 1.2]);
        let mut runner = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(vec![Signal::Buy, Signal::Buy, Signal::Buy]),
            EngineConfig::default(),
        )
        .expect("runner");
        let output = runner.run(&bars).expect("run");
        let opens = output
            .trades
            .iter()
            .filter(|trade| trade.kind == TradeKind::OpenLong)
            .count();
        assert_eq!(opens, 1);
    }

    #[test]
    fn closed_pnls_picks_closing_trades_only() {
        let bars = series(&[1.0, 1.0, 1.2, 1.2]);
        let mut runner = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(vec![Signal::Buy, Signal::Sell, Signal::Hold]),
            EngineConfig::default(),
        )
        .expect("runner");
        let output = runner.run(&bars).expect("run");
        let pnls = closed_pnls(&output.trades);
        assert_eq!(
            pnls.len(),
            output
                .trades
                .iter()
                .filter(|trade| trade.kind.is_close())
                .count()
        );
    }

    #[test]
    fn invalid_fee_rate_is_rejected_up_front() {
        let err = BacktestRunner::new(
            "t".to_string(),
            Scripted::new(vec![]),
            EngineConfig {
                fee_rate: -0.1,
                ..EngineConfig::default()
            },
        )
        .err()
        .expect("must fail");
        assert!(matches!(err, EngineError::InvalidParameter { ref name, .. } if name == "fee_rate"));
    }
}
