use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

mod app;
mod units;

#[derive(Parser, Debug)]
#[command(author, version, about = "dtest - end-to-end tests for the media-server daemon", long_about = None)]
struct Args {
    /// Path to harness configuration file
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Do not print a final status line
    #[arg(long)]
    no_report: bool,

    /// List available test units and exit
    #[arg(short, long)]
    list: bool,

    /// Test units to run (default: all)
    units: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let registry = units::registry()?;
    if args.list {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    info!("Starting dtest v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if let Some(config_path) = args.config {
        dtest_core::config::HarnessConfig::load_from_path(config_path)?
    } else {
        dtest_core::config::HarnessConfig::load_or_default()?
    };

    info!("Test root: {}", config.general.test_root);
    info!("Daemon: {}", config.daemon.binary);

    let result = app::run(config, &registry, &args.units)?;
    if args.no_report {
        return Ok(if result.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }
    Ok(result.report())
}
