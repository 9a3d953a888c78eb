use std::io;
use std::process::ExitCode;

use clap::Parser;
use gridsec_cli::{load_config, Cli, Commands};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::commands::{check_limits, contingencies, security_analysis, CommandOutcome};

mod commands;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));

    let result = match &cli.command {
        Commands::SecurityAnalysis(args) => security_analysis::handle(args, &config),
        Commands::CheckLimits(args) => check_limits::handle(args, &config),
        Commands::Contingencies { command } => contingencies::handle(command),
    };

    match result {
        Ok(CommandOutcome::BaseCaseFailed) => {
            error!("base case computation failed");
            CommandOutcome::BaseCaseFailed.into()
        }
        Ok(outcome) => outcome.into(),
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
