use serde::Serialize;

/// One structured audit record, written as a JSONL line in the run
/// directory.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub run_id: String,
    pub timestamp: i64,
    pub stage: String,
    pub market: Option<String>,
    pub action: String,
    pub error: Option<String>,
    pub details: serde_json::Value,
}
