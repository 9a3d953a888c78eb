use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use gridsec_algo::{LimitViolationType, Partition};
use std::path::PathBuf;

use crate::config::Threads;

#[derive(Parser, Debug)]
#[command(name = "gridsec", author, version, about = "Contingency-based security analysis of power networks", long_about = None)]
pub struct Cli {
    /// Logging level; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (defaults to ./gridsec.toml when present)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a network case against a list of contingencies
    SecurityAnalysis(SecurityAnalysisArgs),
    /// Solve the base case and report its limit violations
    CheckLimits(CheckLimitsArgs),
    /// Contingency list utilities
    Contingencies {
        #[command(subcommand)]
        command: ContingenciesCommands,
    },
}

#[derive(Args, Debug)]
pub struct SecurityAnalysisArgs {
    /// Network case (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub case_file: PathBuf,

    /// Contingency list (YAML or JSON); N-1 over every branch when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub contingencies: Option<PathBuf>,

    /// Violation types to report, comma separated (e.g. CURRENT,LOW_VOLTAGE)
    #[arg(long, value_delimiter = ',')]
    pub limit_types: Vec<LimitViolationType>,

    /// Write the report here instead of stdout
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub output_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Ascii)]
    pub output_format: OutputFormat,

    /// Worker threads: "auto" or a count
    #[arg(long)]
    pub threads: Option<Threads>,

    /// Evaluate only slice i of n of the contingency list (e.g. 2/4)
    #[arg(long)]
    pub task: Option<Partition>,

    /// Factor applied to every current limit
    #[arg(long)]
    pub limit_reduction: Option<f32>,

    /// Record flows and voltages of every element in the results
    #[arg(long)]
    pub with_monitors: bool,

    /// Leave out post-contingency violations already present in the base case
    #[arg(long)]
    pub skip_pre_violations: bool,
}

#[derive(Args, Debug)]
pub struct CheckLimitsArgs {
    /// Network case (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub case_file: PathBuf,

    #[arg(long, value_delimiter = ',')]
    pub limit_types: Vec<LimitViolationType>,

    #[arg(long)]
    pub limit_reduction: Option<f32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Ascii)]
    pub output_format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum ContingenciesCommands {
    /// Write one contingency per in-service element
    N1 {
        /// Network case (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        case_file: PathBuf,
        /// Output list; JSON when the extension is .json, YAML otherwise
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Also trip generators
        #[arg(long)]
        generators: bool,
        /// Also trip three-winding transformers
        #[arg(long)]
        three_windings_transformers: bool,
        /// Also trip HVDC lines
        #[arg(long)]
        hvdc_lines: bool,
        /// Include elements that are already out of service
        #[arg(long)]
        include_disconnected: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Ascii,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn security_analysis_flags_parse() {
        let cli = Cli::parse_from([
            "gridsec",
            "--log-level",
            "debug",
            "security-analysis",
            "case.json",
            "--limit-types",
            "CURRENT,low-voltage",
            "--threads",
            "4",
            "--task",
            "2/3",
            "--output-format",
            "json",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Commands::SecurityAnalysis(args) = cli.command else {
            panic!("expected security-analysis");
        };
        assert_eq!(
            args.limit_types,
            vec![LimitViolationType::Current, LimitViolationType::LowVoltage]
        );
        assert_eq!(args.threads, Some(Threads::Fixed(4)));
        assert_eq!(args.task, Some(Partition::new(2, 3).unwrap()));
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(!args.with_monitors);
    }

    #[test]
    fn bad_partition_is_rejected() {
        assert!(Cli::try_parse_from(["gridsec", "security-analysis", "case.json", "--task", "4/3"]).is_err());
    }
}
