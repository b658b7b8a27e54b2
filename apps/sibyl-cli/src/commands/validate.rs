use sibyl_application::config::load_config;
use sibyl_application::shared::{resolve_engine_config, resolve_eval_budget, resolve_strategy};
use sibyl_domain::services::engine::BacktestRunner;
use sibyl_domain::services::sandbox::ExprSignalSource;
use std::path::PathBuf;
use std::sync::Arc;

/// Parses the config, compiles the strategy, and checks the engine
/// parameters without touching any data source.
pub fn run(config_path: PathBuf) -> Result<(), String> {
    let config = load_config(&config_path)?;
    let strategy = resolve_strategy(&config)?;
    let budget = resolve_eval_budget(&config);

    let source = ExprSignalSource::compile(
        &strategy.name,
        &strategy.source,
        strategy.params.clone(),
        Arc::new(Vec::new()),
        budget.per_eval,
    )
    .map_err(|err| err.to_string())?;

    BacktestRunner::new(
        config.run.run_id.clone(),
        source,
        resolve_engine_config(&config),
    )
    .map_err(|err| err.to_string())?;

    println!("config ok: strategy `{}` compiles", strategy.name);
    Ok(())
}
