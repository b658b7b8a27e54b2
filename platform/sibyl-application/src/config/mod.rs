use serde::{Deserialize, Serialize};
use sibyl_domain::services::sandbox::Params;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub strategy: StrategyConfig,
    pub costs: CostsConfig,
    pub sizing: Option<SizingConfig>,
    pub sandbox: Option<SandboxConfig>,
    pub metrics: Option<MetricsConfig>,
    pub data: Option<DataConfig>,
    pub analysis: Option<AnalysisConfig>,
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub token_id: String,
    pub market_name: Option<String>,
    pub initial_capital: f64,
}

/// Either a built-in template by name or an inline decision expression.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub template: Option<String>,
    pub source: Option<String>,
    pub params: Option<Params>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CostsConfig {
    pub fee_rate: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SizingConfig {
    pub fraction: Option<f64>,
    pub reverse_on_opposite: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    pub eval_budget_ms: Option<u64>,
    pub run_budget_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub risk_free_rate: Option<f64>,
    pub annualization_factor: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub prices_url: Option<String>,
    pub trades_url: Option<String>,
    pub prices_csv: Option<String>,
    pub trades_csv: Option<String>,
    pub interval: Option<String>,
    pub fidelity_minutes: Option<u32>,
    pub fill_limit: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    pub min_trades: Option<usize>,
    pub sparse_confidence_cap: Option<f64>,
    pub score_floor: Option<f64>,
    pub move_threshold: Option<f64>,
    pub fixed_cv_threshold: Option<f64>,
    pub martingale_step_up: Option<f64>,
    pub scalping_max_secs: Option<i64>,
    pub intraday_max_secs: Option<i64>,
    pub swing_max_secs: Option<i64>,
    pub market_making_min_trades: Option<usize>,
    pub market_making_max_markets: Option<usize>,
    pub market_making_balance_tolerance: Option<f64>,
    pub event_window_secs: Option<i64>,
    pub top_markets: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub out_dir: String,
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}
