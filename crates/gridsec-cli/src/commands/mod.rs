pub mod check_limits;
pub mod contingencies;
pub mod security_analysis;
pub mod util;

use std::process::ExitCode;

/// How a command finished when it did not return an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// The base case did not converge; the report was still written
    BaseCaseFailed,
}

impl From<CommandOutcome> for ExitCode {
    fn from(outcome: CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Success => ExitCode::SUCCESS,
            CommandOutcome::BaseCaseFailed => ExitCode::from(2),
        }
    }
}
