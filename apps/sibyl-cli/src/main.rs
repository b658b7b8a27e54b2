mod commands;
mod infra;
mod obs;
mod output;

use clap::{Parser, Subcommand};
use commands::Command;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sibyl")]
#[command(about = "Sibyl CLI", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  sibyl backtest --config configs/sample.toml --out runs/\n  sibyl analyze --config configs/sample.toml --address 0xabc...\n  sibyl detect --config configs/sample.toml --address 0xabc...\n  sibyl validate --config configs/sample.toml\n  sibyl templates\n"
)]
struct Cli {
    /// Log filter when SIBYL_LOG is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
    /// Log output format: text or json.
    #[arg(long, default_value = "text", global = true)]
    log_format: String,
    /// Serve prometheus metrics on host:port.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run a backtest described by a config file.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build performance and profile artifacts for a trader.
    Analyze {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        address: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Classify a trader's strategy from their fill history.
    Detect {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        address: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare several traders side by side.
    Compare {
        #[arg(long)]
        config: PathBuf,
        #[arg(long = "address", required = true)]
        addresses: Vec<String>,
    },
    /// Parse the config and compile the strategy without running it.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// List the built-in strategy templates.
    Templates,
    Bench {
        /// Number of synthetic bars to generate.
        #[arg(long, default_value_t = 500_000)]
        bars: usize,
        /// Timestamp step in seconds.
        #[arg(long, default_value_t = 60)]
        step_seconds: i64,
        /// Print a single JSON line instead of human output.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() {
    output::print_banner();
    let cli = Cli::parse();

    if let Err(err) = obs::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Backtest { config, out } => Command::Backtest { config, out },
        CliCommand::Analyze {
            config,
            address,
            out,
        } => Command::Analyze {
            config,
            address,
            out,
        },
        CliCommand::Detect {
            config,
            address,
            out,
        } => Command::Detect {
            config,
            address,
            out,
        },
        CliCommand::Compare { config, addresses } => Command::Compare { config, addresses },
        CliCommand::Validate { config } => Command::Validate { config },
        CliCommand::Templates => Command::Templates,
        CliCommand::Bench {
            bars,
            step_seconds,
            json,
        } => Command::Bench {
            bars,
            step_seconds,
            json,
        },
    };

    if let Err(err) = commands::run(command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
