mod analyze;
mod backtest;
mod bench;
mod compare;
mod detect;
mod templates;
mod validate;

use std::path::PathBuf;

pub enum Command {
    Backtest {
        config: PathBuf,
        out: Option<PathBuf>,
    },
    Analyze {
        config: PathBuf,
        address: String,
        out: Option<PathBuf>,
    },
    Detect {
        config: PathBuf,
        address: String,
        out: Option<PathBuf>,
    },
    Compare {
        config: PathBuf,
        addresses: Vec<String>,
    },
    Validate {
        config: PathBuf,
    },
    Templates,
    Bench {
        bars: usize,
        step_seconds: i64,
        json: bool,
    },
}

pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Backtest { config, out } => backtest::run(config, out),
        Command::Analyze {
            config,
            address,
            out,
        } => analyze::run(config, &address, out),
        Command::Detect {
            config,
            address,
            out,
        } => detect::run(config, &address, out),
        Command::Compare { config, addresses } => compare::run(config, &addresses),
        Command::Validate { config } => validate::run(config),
        Command::Templates => templates::run(),
        Command::Bench {
            bars,
            step_seconds,
            json,
        } => bench::run(bars, step_seconds, json),
    }
}
