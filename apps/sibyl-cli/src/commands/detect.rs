use crate::infra;
use sibyl_application::analysis::detect_strategy;
use sibyl_application::config::load_config;
use sibyl_infrastructure::artifacts::FilesystemArtifactWriter;
use std::path::PathBuf;

pub fn run(config_path: PathBuf, address: &str, out: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(&config_path)?;
    let trade_history = infra::build_trade_repo(&config)?;
    let artifacts = FilesystemArtifactWriter::new();

    let report = detect_strategy(&config, address, out, trade_history.as_ref(), &artifacts)?;
    let detection = &report.detection;

    println!("address:    {}", detection.address);
    println!(
        "strategy:   {}",
        serde_json::to_value(detection.primary_strategy)
            .map_err(|err| format!("failed to render strategy label: {err}"))?
            .as_str()
            .unwrap_or("unknown")
    );
    println!("confidence: {:.3}", detection.confidence);
    println!("summary:    {}", detection.summary);
    println!("artifacts:  {}", report.out_dir.display());
    Ok(())
}
