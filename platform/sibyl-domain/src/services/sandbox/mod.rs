//! Signal sandbox: evaluates one user-authored decision expression against a
//! bounded view of the price history, the current position, and the run
//! parameters.
//!
//! The expression is compiled once per run and re-evaluated bar by bar with
//! a context rebuilt from scratch on every call, so no state survives
//! between evaluations. The context exposes only the documented variables
//! and accessors; there is no clock, randomness, filesystem, or network.
//! Every accessor clamps to the visible window, so a strategy cannot read a
//! price past the bar currently being processed.

use crate::errors::EngineError;
use crate::value_objects::signal::Signal;
use evalexpr::{
    build_operator_tree, ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError,
    Function, HashMapContext, Node, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Window accessors installed into every evaluation context.
const HOST_FUNCTIONS: [&str; 7] = [
    "price", "sma", "sma_prev", "highest", "lowest", "change", "stdev",
];

/// evalexpr builtins a strategy may call. Everything else is rejected at
/// compile time.
const ALLOWED_BUILTINS: [&str; 13] = [
    "if",
    "min",
    "max",
    "floor",
    "round",
    "ceil",
    "math::abs",
    "math::ln",
    "math::log",
    "math::log2",
    "math::log10",
    "math::exp",
    "math::sqrt",
];

/// Variable names the sandbox itself defines.
const RESERVED_VARIABLES: [&str; 2] = ["position", "bars"];

/// Reserved parameter declaring the minimum visible bars before the
/// expression is evaluated at all.
pub const LOOKBACK_PARAM: &str = "lookback";

/// Wall-clock budgets for sandboxed evaluation. `per_eval` bounds a single
/// call; `per_run` bounds the whole backtest and is enforced by the engine.
#[derive(Debug, Clone, Copy)]
pub struct EvalBudget {
    pub per_eval: Duration,
    pub per_run: Duration,
}

impl Default for EvalBudget {
    fn default() -> Self {
        Self {
            per_eval: Duration::from_millis(50),
            per_run: Duration::from_secs(30),
        }
    }
}

/// A strategy parameter value. Accepted as an arbitrary flat map and
/// validated on first evaluation, not at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

pub type Params = BTreeMap<String, ParamValue>;

/// The single seam between the engine and whatever produces signals. The
/// engine hands each implementation only the prices up to and including the
/// current bar.
pub trait SignalSource {
    fn name(&self) -> &str;

    fn evaluate(&mut self, history: &[f64], position: f64) -> Result<Signal, EngineError>;
}

#[derive(Debug)]
struct ResolvedParams {
    values: Vec<(String, Value)>,
    lookback: usize,
}

/// A decision expression compiled against one price series.
#[derive(Debug)]
pub struct ExprSignalSource {
    name: String,
    node: Node,
    series: Arc<Vec<f64>>,
    raw_params: Params,
    resolved: Option<ResolvedParams>,
    per_eval: Duration,
}

impl ExprSignalSource {
    /// Parses the expression and rejects calls to anything outside the
    /// documented accessor set. Fails before any bar is processed.
    pub fn compile(
        name: &str,
        source: &str,
        params: Params,
        series: Arc<Vec<f64>>,
        per_eval: Duration,
    ) -> Result<Self, EngineError> {
        let node = build_operator_tree(source)
            .map_err(|err| EngineError::StrategyCompile(err.to_string()))?;

        for identifier in node.iter_function_identifiers() {
            if !HOST_FUNCTIONS.contains(&identifier) && !ALLOWED_BUILTINS.contains(&identifier) {
                return Err(EngineError::StrategyCompile(format!(
                    "unknown function `{identifier}`"
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            node,
            series,
            raw_params: params,
            resolved: None,
            per_eval,
        })
    }

    fn resolve_params(&self) -> Result<ResolvedParams, EngineError> {
        let mut values = Vec::with_capacity(self.raw_params.len());
        let mut lookback = 1usize;

        for (name, param) in &self.raw_params {
            if RESERVED_VARIABLES.contains(&name.as_str())
                || HOST_FUNCTIONS.contains(&name.as_str())
            {
                return Err(EngineError::InvalidParameter {
                    name: name.clone(),
                    reason: "shadows a built-in name".to_string(),
                });
            }
            if !is_identifier(name) {
                return Err(EngineError::InvalidParameter {
                    name: name.clone(),
                    reason: "not a valid identifier".to_string(),
                });
            }

            let value = match param {
                ParamValue::Bool(b) => Value::Boolean(*b),
                ParamValue::Int(i) => Value::Int(*i),
                ParamValue::Float(f) => {
                    if !f.is_finite() {
                        return Err(EngineError::InvalidParameter {
                            name: name.clone(),
                            reason: "must be finite".to_string(),
                        });
                    }
                    Value::Float(*f)
                }
            };

            if name == LOOKBACK_PARAM {
                let declared = match param {
                    ParamValue::Int(i) if *i >= 0 => *i as usize,
                    _ => {
                        return Err(EngineError::InvalidParameter {
                            name: name.clone(),
                            reason: "must be a non-negative integer".to_string(),
                        });
                    }
                };
                // An expression always needs at least one visible price.
                lookback = declared.max(1);
            }

            values.push((name.clone(), value));
        }

        Ok(ResolvedParams { values, lookback })
    }

    fn build_context(
        &self,
        visible: usize,
        position: f64,
        resolved: &ResolvedParams,
    ) -> Result<HashMapContext, EngineError> {
        let mut ctx = HashMapContext::new();

        ctx.set_value("position".to_string(), Value::Float(position))
            .map_err(context_error)?;
        ctx.set_value("bars".to_string(), Value::Int(visible as i64))
            .map_err(context_error)?;
        for (name, value) in &resolved.values {
            ctx.set_value(name.clone(), value.clone())
                .map_err(context_error)?;
        }

        let series = Arc::clone(&self.series);
        ctx.set_function(
            "price".to_string(),
            Function::new(move |arg| {
                let back = offset_arg(arg, "price")?;
                if back >= visible {
                    return Err(out_of_window("price", back, visible));
                }
                Ok(Value::Float(series[visible - 1 - back]))
            }),
        )
        .map_err(context_error)?;

        let series = Arc::clone(&self.series);
        ctx.set_function(
            "sma".to_string(),
            Function::new(move |arg| {
                let window = window_arg(arg, "sma")?;
                if window > visible {
                    return Err(out_of_window("sma", window, visible));
                }
                Ok(Value::Float(mean(&series[visible - window..visible])))
            }),
        )
        .map_err(context_error)?;

        let series = Arc::clone(&self.series);
        ctx.set_function(
            "sma_prev".to_string(),
            Function::new(move |arg| {
                let window = window_arg(arg, "sma_prev")?;
                if window + 1 > visible {
                    return Err(out_of_window("sma_prev", window + 1, visible));
                }
                Ok(Value::Float(mean(
                    &series[visible - 1 - window..visible - 1],
                )))
            }),
        )
        .map_err(context_error)?;

        let series = Arc::clone(&self.series);
        ctx.set_function(
            "highest".to_string(),
            Function::new(move |arg| {
                let window = window_arg(arg, "highest")?;
                if window + 1 > visible {
                    return Err(out_of_window("highest", window + 1, visible));
                }
                let slice = &series[visible - 1 - window..visible - 1];
                Ok(Value::Float(slice.iter().copied().fold(f64::MIN, f64::max)))
            }),
        )
        .map_err(context_error)?;

        let series = Arc::clone(&self.series);
        ctx.set_function(
            "lowest".to_string(),
            Function::new(move |arg| {
                let window = window_arg(arg, "lowest")?;
                if window + 1 > visible {
                    return Err(out_of_window("lowest", window + 1, visible));
                }
                let slice = &series[visible - 1 - window..visible - 1];
                Ok(Value::Float(slice.iter().copied().fold(f64::MAX, f64::min)))
            }),
        )
        .map_err(context_error)?;

        let series = Arc::clone(&self.series);
        ctx.set_function(
            "change".to_string(),
            Function::new(move |arg| {
                let back = window_arg(arg, "change")?;
                if back >= visible {
                    return Err(out_of_window("change", back + 1, visible));
                }
                let base = series[visible - 1 - back];
                if base == 0.0 {
                    return Err(EvalexprError::CustomMessage(
                        "change: base price is zero".to_string(),
                    ));
                }
                Ok(Value::Float(series[visible - 1] / base - 1.0))
            }),
        )
        .map_err(context_error)?;

        let series = Arc::clone(&self.series);
        ctx.set_function(
            "stdev".to_string(),
            Function::new(move |arg| {
                let window = window_arg(arg, "stdev")?;
                if window > visible {
                    return Err(out_of_window("stdev", window, visible));
                }
                let slice = &series[visible - window..visible];
                let avg = mean(slice);
                let var = slice.iter().map(|v| (v - avg) * (v - avg)).sum::<f64>()
                    / slice.len() as f64;
                Ok(Value::Float(var.sqrt()))
            }),
        )
        .map_err(context_error)?;

        Ok(ctx)
    }
}

impl SignalSource for ExprSignalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&mut self, history: &[f64], position: f64) -> Result<Signal, EngineError> {
        let bar = history.len().saturating_sub(1);
        if history.len() > self.series.len() {
            return Err(EngineError::Evaluation {
                bar,
                reason: "history window exceeds the compiled series".to_string(),
            });
        }

        if self.resolved.is_none() {
            self.resolved = Some(self.resolve_params()?);
        }
        let resolved = self.resolved.as_ref().expect("resolved above");

        // Insufficient history is a hold, never an error.
        if history.len() < resolved.lookback {
            return Ok(Signal::Hold);
        }

        let mut ctx = self.build_context(history.len(), position, resolved)?;
        let start = Instant::now();
        let value = self.node.eval_with_context_mut(&mut ctx);
        let elapsed = start.elapsed();
        if elapsed > self.per_eval {
            return Err(EngineError::SandboxTimeout {
                bar,
                elapsed_ms: elapsed.as_millis() as u64,
                budget_ms: self.per_eval.as_millis() as u64,
            });
        }

        let value = value.map_err(|err| EngineError::Evaluation {
            bar,
            reason: err.to_string(),
        })?;
        Ok(coerce_signal(&value))
    }
}

/// Expression results other than -1/0/1 coerce to hold.
fn coerce_signal(value: &Value) -> Signal {
    match value {
        Value::Int(i) => Signal::from_int(*i),
        Value::Float(f) if f.fract() == 0.0 => Signal::from_int(*f as i64),
        _ => Signal::Hold,
    }
}

fn mean(slice: &[f64]) -> f64 {
    slice.iter().sum::<f64>() / slice.len() as f64
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn offset_arg(value: &Value, function: &str) -> Result<usize, EvalexprError> {
    let number = value.as_number()?;
    if !number.is_finite() || number < 0.0 || number.fract() != 0.0 {
        return Err(EvalexprError::CustomMessage(format!(
            "{function}: offset must be a non-negative integer"
        )));
    }
    Ok(number as usize)
}

fn window_arg(value: &Value, function: &str) -> Result<usize, EvalexprError> {
    let number = value.as_number()?;
    if !number.is_finite() || number < 1.0 || number.fract() != 0.0 {
        return Err(EvalexprError::CustomMessage(format!(
            "{function}: window must be a positive integer"
        )));
    }
    Ok(number as usize)
}

fn out_of_window(function: &str, needed: usize, visible: usize) -> EvalexprError {
    EvalexprError::CustomMessage(format!(
        "{function}: needs {needed} bars but only {visible} are visible"
    ))
}

fn context_error(err: EvalexprError) -> EngineError {
    EngineError::Evaluation {
        bar: 0,
        reason: format!("failed to build evaluation context: {err}"),
    }
}
