use crate::infra;
use sibyl_application::analysis::compare_traders;
use sibyl_application::config::load_config;
use std::path::PathBuf;

pub fn run(config_path: PathBuf, addresses: &[String]) -> Result<(), String> {
    let config = load_config(&config_path)?;
    let trade_history = infra::build_trade_repo(&config)?;

    let rows = compare_traders(&config, addresses, trade_history.as_ref())?;
    let json = serde_json::to_string_pretty(&rows)
        .map_err(|err| format!("failed to serialize comparison: {err}"))?;
    println!("{json}");
    Ok(())
}
