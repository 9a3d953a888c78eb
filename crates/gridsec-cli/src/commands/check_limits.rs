use std::sync::Arc;

use anyhow::Result;
use gridsec_algo::{CancellationToken, SecurityAnalysis};
use gridsec_cli::report::ReportOptions;
use gridsec_cli::{CheckLimitsArgs, GridSecConfig};
use gridsec_core::INITIAL_VARIANT_ID;

use crate::commands::util::{load_network, write_result};
use crate::commands::CommandOutcome;

/// Base case only: a security analysis with no contingencies.
pub fn handle(args: &CheckLimitsArgs, config: &GridSecConfig) -> Result<CommandOutcome> {
    let network = Arc::new(load_network(&args.case_file)?);
    let result = SecurityAnalysis::new(network.clone())
        .with_detector(Arc::new(config.detector(args.limit_reduction)?))
        .with_filter(config.filter(&args.limit_types)?)
        .execute(
            INITIAL_VARIANT_ID,
            &config.analysis_parameters(None),
            &[],
            &CancellationToken::new(),
        )?;

    write_result(
        &result,
        &network,
        args.output_format,
        None,
        &ReportOptions::default(),
    )?;

    if result.is_failed() {
        Ok(CommandOutcome::BaseCaseFailed)
    } else {
        Ok(CommandOutcome::Success)
    }
}
