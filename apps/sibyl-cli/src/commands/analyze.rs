use crate::infra;
use sibyl_application::analysis::analyze_trader;
use sibyl_application::config::load_config;
use sibyl_infrastructure::artifacts::FilesystemArtifactWriter;
use std::path::PathBuf;

pub fn run(config_path: PathBuf, address: &str, out: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(&config_path)?;
    let trade_history = infra::build_trade_repo(&config)?;
    let artifacts = FilesystemArtifactWriter::new();

    let report = analyze_trader(&config, address, out, trade_history.as_ref(), &artifacts)?;
    let profile = &report.profile;
    let metrics = &report.performance.metrics;

    println!("address:        {}", profile.address);
    println!("trades:         {}", profile.total_trades);
    println!("volume:         {:.2}", profile.total_volume);
    println!("realized pnl:   {:.2}", profile.total_pnl);
    println!("win rate:       {:.2}%", metrics.win_rate_pct);
    println!("max drawdown:   {:.2}%", metrics.max_drawdown_pct);
    println!("unique markets: {}", profile.unique_markets);
    println!("artifacts:      {}", report.out_dir.display());
    Ok(())
}
