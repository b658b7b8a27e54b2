use crate::infra;
use sibyl_application::backtesting::run_backtest;
use sibyl_application::config::load_config_with_source;
use sibyl_infrastructure::artifacts::FilesystemArtifactWriter;
use std::path::PathBuf;

pub fn run(config_path: PathBuf, out: Option<PathBuf>) -> Result<(), String> {
    let (config, config_toml) = load_config_with_source(&config_path)?;
    let market_data = infra::build_price_repo(&config)?;
    let artifacts = FilesystemArtifactWriter::new();

    let report = run_backtest(&config, &config_toml, out, market_data.as_ref(), &artifacts)?;
    let metrics = &report.result.metrics;

    println!("run:            {}", config.run.run_id);
    println!("bars:           {}", report.result.data_points);
    println!("trades:         {}", metrics.total_trades);
    println!("total pnl:      {:.4}", metrics.total_pnl);
    println!("roi:            {:.2}%", metrics.roi_pct);
    println!("sharpe:         {:.4}", metrics.sharpe_ratio);
    println!("max drawdown:   {:.2}%", metrics.max_drawdown_pct);
    println!("win rate:       {:.2}%", metrics.win_rate_pct);
    println!("artifacts:      {}", report.run_dir.display());
    Ok(())
}
