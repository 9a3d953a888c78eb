pub mod cli;
pub mod config;
pub mod report;

pub use cli::{
    CheckLimitsArgs, Cli, Commands, ContingenciesCommands, OutputFormat, SecurityAnalysisArgs,
};
pub use config::{load_config, GridSecConfig, Threads};
