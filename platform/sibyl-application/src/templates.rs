//! Built-in strategy templates, expressed in the sandbox expression
//! language. Each ships with the default parameters the expression expects;
//! `[strategy.params]` entries override them per run.

use sibyl_domain::services::sandbox::{ParamValue, Params};

#[derive(Debug, Clone, Copy)]
pub struct StrategyTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub source: &'static str,
}

pub const MA_CROSSOVER: StrategyTemplate = StrategyTemplate {
    name: "ma_crossover",
    description: "Buys when the short moving average crosses above the long one, sells on the opposite cross.",
    source: "\
if(sma(short) > sma(long) && sma_prev(short) <= sma_prev(long), 1, \
if(sma(short) < sma(long) && sma_prev(short) >= sma_prev(long), -1, 0))",
};

pub const MEAN_REVERSION: StrategyTemplate = StrategyTemplate {
    name: "mean_reversion",
    description: "Buys when the price sits below the moving average by a threshold, sells when above. Assumes prices revert to the mean.",
    source: "\
if(sma(window) <= 0.0, 0, \
if((price(0) - sma(window)) / sma(window) < -threshold, 1, \
if((price(0) - sma(window)) / sma(window) > threshold, -1, 0)))",
};

pub const MOMENTUM_BREAKOUT: StrategyTemplate = StrategyTemplate {
    name: "momentum_breakout",
    description: "Buys when the price breaks above the recent high, sells when it breaks below the recent low.",
    source: "\
if(price(0) > highest(window) * (1.0 + breakout_pct), 1, \
if(price(0) < lowest(window) * (1.0 - breakout_pct), -1, 0))",
};

pub fn all() -> [StrategyTemplate; 3] {
    [MA_CROSSOVER, MEAN_REVERSION, MOMENTUM_BREAKOUT]
}

pub fn find(name: &str) -> Option<StrategyTemplate> {
    all().into_iter().find(|template| template.name == name)
}

pub fn default_params(template: &StrategyTemplate) -> Params {
    let mut params = Params::new();
    match template.name {
        "ma_crossover" => {
            params.insert("short".to_string(), ParamValue::Int(10));
            params.insert("long".to_string(), ParamValue::Int(30));
            params.insert("lookback".to_string(), ParamValue::Int(31));
        }
        "mean_reversion" => {
            params.insert("window".to_string(), ParamValue::Int(20));
            params.insert("threshold".to_string(), ParamValue::Float(0.05));
            params.insert("lookback".to_string(), ParamValue::Int(20));
        }
        "momentum_breakout" => {
            params.insert("window".to_string(), ParamValue::Int(15));
            params.insert("breakout_pct".to_string(), ParamValue::Float(0.03));
            params.insert("lookback".to_string(), ParamValue::Int(16));
        }
        _ => {}
    }
    params
}
