use crate::config::Config;
use crate::templates;
use sha2::{Digest, Sha256};
use sibyl_domain::entities::metrics::MetricsConfig;
use sibyl_domain::services::analyzers::patterns::ClassifierConfig;
use sibyl_domain::services::engine::EngineConfig;
use sibyl_domain::services::sandbox::{EvalBudget, ParamValue, Params};
use std::time::Duration;

/// The strategy a run will execute: display name, expression source, and
/// fully merged parameters.
#[derive(Debug, Clone)]
pub struct ResolvedStrategy {
    pub name: String,
    pub source: String,
    pub params: Params,
}

pub fn resolve_strategy(config: &Config) -> Result<ResolvedStrategy, String> {
    let overrides = config.strategy.params.clone().unwrap_or_default();
    match (&config.strategy.template, &config.strategy.source) {
        (Some(_), Some(_)) => {
            Err("strategy.template and strategy.source are mutually exclusive".to_string())
        }
        (Some(name), None) => {
            let template = templates::find(name)
                .ok_or_else(|| format!("unknown strategy template `{name}`"))?;
            let mut params = templates::default_params(&template);
            params.extend(overrides);
            Ok(ResolvedStrategy {
                name: template.name.to_string(),
                source: template.source.to_string(),
                params,
            })
        }
        (None, Some(source)) => Ok(ResolvedStrategy {
            name: "custom".to_string(),
            source: source.clone(),
            params: overrides,
        }),
        (None, None) => Err("strategy requires either a template or a source".to_string()),
    }
}

pub fn resolve_engine_config(config: &Config) -> EngineConfig {
    let defaults = EngineConfig::default();
    let sizing = config.sizing.as_ref();
    EngineConfig {
        initial_capital: config.run.initial_capital,
        fee_rate: config.costs.fee_rate,
        size_fraction: sizing
            .and_then(|sizing| sizing.fraction)
            .unwrap_or(defaults.size_fraction),
        reverse_on_opposite: sizing
            .and_then(|sizing| sizing.reverse_on_opposite)
            .unwrap_or(defaults.reverse_on_opposite),
        run_budget: resolve_eval_budget(config).per_run,
    }
}

pub fn resolve_eval_budget(config: &Config) -> EvalBudget {
    let defaults = EvalBudget::default();
    let sandbox = config.sandbox.as_ref();
    EvalBudget {
        per_eval: sandbox
            .and_then(|sandbox| sandbox.eval_budget_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.per_eval),
        per_run: sandbox
            .and_then(|sandbox| sandbox.run_budget_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.per_run),
    }
}

pub fn resolve_metrics_config(config: &Config) -> MetricsConfig {
    let defaults = MetricsConfig::default();
    let metrics = config.metrics.as_ref();
    MetricsConfig {
        risk_free_rate: metrics
            .and_then(|metrics| metrics.risk_free_rate)
            .unwrap_or(defaults.risk_free_rate),
        annualization_factor: metrics.and_then(|metrics| metrics.annualization_factor),
    }
}

pub fn resolve_classifier_config(config: &Config) -> ClassifierConfig {
    let mut resolved = ClassifierConfig::default();
    let Some(analysis) = config.analysis.as_ref() else {
        return resolved;
    };
    if let Some(value) = analysis.min_trades {
        resolved.min_trades = value;
    }
    if let Some(value) = analysis.sparse_confidence_cap {
        resolved.sparse_confidence_cap = value;
    }
    if let Some(value) = analysis.score_floor {
        resolved.score_floor = value;
    }
    if let Some(value) = analysis.move_threshold {
        resolved.move_threshold = value;
    }
    if let Some(value) = analysis.fixed_cv_threshold {
        resolved.fixed_cv_threshold = value;
    }
    if let Some(value) = analysis.martingale_step_up {
        resolved.martingale_step_up = value;
    }
    if let Some(value) = analysis.scalping_max_secs {
        resolved.scalping_max_secs = value;
    }
    if let Some(value) = analysis.intraday_max_secs {
        resolved.intraday_max_secs = value;
    }
    if let Some(value) = analysis.swing_max_secs {
        resolved.swing_max_secs = value;
    }
    if let Some(value) = analysis.market_making_min_trades {
        resolved.market_making_min_trades = value;
    }
    if let Some(value) = analysis.market_making_max_markets {
        resolved.market_making_max_markets = value;
    }
    if let Some(value) = analysis.market_making_balance_tolerance {
        resolved.market_making_balance_tolerance = value;
    }
    if let Some(value) = analysis.event_window_secs {
        resolved.event_window_secs = value;
    }
    if let Some(value) = analysis.top_markets {
        resolved.top_markets = value;
    }
    resolved
}

/// Deterministic strategy identifier: the source and the canonical
/// parameter map hashed together.
pub fn strategy_hash(source: &str, params: &Params) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    for (name, value) in params {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        match value {
            ParamValue::Bool(b) => hasher.update(if *b { b"true".as_slice() } else { b"false".as_slice() }),
            ParamValue::Int(i) => hasher.update(i.to_string().as_bytes()),
            ParamValue::Float(f) => hasher.update(f.to_bits().to_string().as_bytes()),
        }
        hasher.update(b";");
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::{resolve_strategy, strategy_hash};
    use crate::config::Config;
    use sibyl_domain::services::sandbox::{ParamValue, Params};

    fn config(strategy_block: &str) -> Config {
        let toml_str = format!(
            r#"
[run]
run_id = "t"
token_id = "0x1"
initial_capital = 1000.0

{strategy_block}

[costs]
fee_rate = 0.0

[paths]
out_dir = "runs/"
"#
        );
        toml::from_str(&toml_str).expect("config")
    }

    #[test]
    fn template_params_can_be_overridden() {
        let config = config(
            r#"
[strategy]
template = "momentum_breakout"

[strategy.params]
window = 5
"#,
        );
        let resolved = resolve_strategy(&config).expect("resolve");
        assert_eq!(resolved.params.get("window"), Some(&ParamValue::Int(5)));
        // Untouched defaults survive.
        assert_eq!(resolved.params.get("lookback"), Some(&ParamValue::Int(16)));
    }

    #[test]
    fn template_and_source_are_mutually_exclusive() {
        let config = config(
            r#"
[strategy]
template = "ma_crossover"
source = "1"
"#,
        );
        assert!(resolve_strategy(&config).is_err());
    }

    #[test]
    fn missing_strategy_is_rejected() {
        let config = config("[strategy]\n");
        assert!(resolve_strategy(&config).is_err());
    }

    #[test]
    fn strategy_hash_is_stable_and_param_sensitive() {
        let mut params = Params::new();
        params.insert("lookback".to_string(), ParamValue::Int(2));
        let a = strategy_hash("1", &params);
        let b = strategy_hash("1", &params);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        params.insert("lookback".to_string(), ParamValue::Int(3));
        assert_ne!(a, strategy_hash("1", &params));
    }
}
