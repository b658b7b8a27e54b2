use thiserror::Error;

/// Failures the core engine can surface to callers.
///
/// Compile and parameter errors carry the offending detail; timeouts abort
/// the enclosing run and discard its partial state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("strategy failed to compile: {0}")]
    StrategyCompile(String),

    #[error("signal evaluation at bar {bar} took {elapsed_ms}ms (budget {budget_ms}ms)")]
    SandboxTimeout {
        bar: usize,
        elapsed_ms: u64,
        budget_ms: u64,
    },

    #[error("backtest exceeded its {budget_ms}ms run budget at bar {bar}")]
    RunTimeout { bar: usize, budget_ms: u64 },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("signal evaluation failed at bar {bar}: {reason}")]
    Evaluation { bar: usize, reason: String },

    #[error("malformed price series: {0}")]
    MalformedSeries(String),
}
