use sibyl_domain::entities::backtest::BacktestResult;
use sibyl_domain::services::audit::AuditEvent;
use sibyl_domain::value_objects::equity_point::EquityPoint;
use sibyl_domain::value_objects::trade::{CloseReason, TradeKind, TradeRecord};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn write_audit_jsonl(path: &Path, events: &[AuditEvent]) -> Result<(), String> {
    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create logs: {}", err))?;
    for event in events {
        let line = serde_json::to_string(event)
            .map_err(|err| format!("failed to serialize audit event: {}", err))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|err| format!("failed to write audit event: {}", err))?;
    }
    Ok(())
}

pub fn write_trades_csv(path: &Path, trades: &[TradeRecord]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
    wtr.write_record(["timestamp_utc", "type", "price", "size", "pnl", "fee", "reason"])
        .map_err(|err| format!("failed to write trades csv header: {}", err))?;

    for trade in trades {
        let kind = match trade.kind {
            TradeKind::OpenLong => "open_long",
            TradeKind::CloseLong => "close_long",
            TradeKind::OpenShort => "open_short",
            TradeKind::CloseShort => "close_short",
        };
        let reason = match trade.reason {
            Some(CloseReason::Signal) => "signal",
            Some(CloseReason::EndOfData) => "end_of_data",
            None => "",
        };
        wtr.write_record([
            trade.timestamp.to_string(),
            kind.to_string(),
            trade.price.to_string(),
            trade.size.to_string(),
            trade.pnl.to_string(),
            trade.fee.to_string(),
            reason.to_string(),
        ])
        .map_err(|err| format!("failed to write trades row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush trades csv: {}", err))
}

pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create equity csv {}: {}", path.display(), err))?;
    wtr.write_record(["timestamp_utc", "equity", "cash", "position_size"])
        .map_err(|err| format!("failed to write equity csv header: {}", err))?;

    for point in points {
        wtr.write_record([
            point.timestamp.to_string(),
            point.equity.to_string(),
            point.cash.to_string(),
            point.position_size.to_string(),
        ])
        .map_err(|err| format!("failed to write equity row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush equity csv: {}", err))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize {what}: {err}"))?;
    fs::write(path, json)
        .map_err(|err| format!("failed to write {what} {}: {}", path.display(), err))
}

pub fn read_result_json(path: &Path) -> Result<BacktestResult, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read result {}: {}", path.display(), err))?;
    serde_json::from_str(&contents)
        .map_err(|err| format!("failed to parse result {}: {}", path.display(), err))
}
