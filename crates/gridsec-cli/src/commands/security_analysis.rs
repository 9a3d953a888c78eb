use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use gridsec_algo::{
    CancellationToken, ContingencyContext, LoggingInterceptor, SecurityAnalysis, StateMonitor,
};
use gridsec_cli::report::ReportOptions;
use gridsec_cli::{GridSecConfig, SecurityAnalysisArgs};
use gridsec_contingency::{
    generate_n1, load_contingency_list, resolve_contingencies, Contingency, GenerationOptions,
};
use gridsec_core::{Network, INITIAL_VARIANT_ID};
use tracing::info;

use crate::commands::util::{load_network, write_result};
use crate::commands::CommandOutcome;

pub fn handle(args: &SecurityAnalysisArgs, config: &GridSecConfig) -> Result<CommandOutcome> {
    let start = Instant::now();
    let network = Arc::new(load_network(&args.case_file)?);

    let mut contingencies = contingencies_for(args, &network)?;
    if let Some(task) = &args.task {
        let total = contingencies.len();
        contingencies = task.select(&contingencies).to_vec();
        info!(
            task = %task,
            selected = contingencies.len(),
            total,
            "evaluating a slice of the contingency list"
        );
    }

    let parameters = config.analysis_parameters(args.threads);
    let mut analysis = SecurityAnalysis::new(network.clone())
        .with_detector(Arc::new(config.detector(args.limit_reduction)?))
        .with_filter(config.filter(&args.limit_types)?)
        .with_interceptor(Arc::new(LoggingInterceptor));
    if args.with_monitors {
        analysis = analysis.with_monitors(vec![StateMonitor::all_elements(
            &network,
            ContingencyContext::All,
        )]);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("starting async runtime")?;
    let result = runtime.block_on(analysis.run(
        INITIAL_VARIANT_ID,
        parameters,
        contingencies,
        CancellationToken::new(),
    ))?;

    info!(
        contingencies = result.post_contingency_results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "security analysis finished"
    );

    write_result(
        &result,
        &network,
        args.output_format,
        args.output_file.as_deref(),
        &ReportOptions {
            skip_pre_violations: args.skip_pre_violations,
        },
    )?;

    if result.is_failed() {
        Ok(CommandOutcome::BaseCaseFailed)
    } else {
        Ok(CommandOutcome::Success)
    }
}

fn contingencies_for(args: &SecurityAnalysisArgs, network: &Network) -> Result<Vec<Contingency>> {
    match &args.contingencies {
        Some(path) => {
            let list = load_contingency_list(path)?;
            resolve_contingencies(&list)
        }
        None => {
            let list = generate_n1(network, &GenerationOptions::default());
            info!(
                count = list.contingencies.len(),
                "no contingency list given, using N-1 over every branch"
            );
            Ok(list.contingencies)
        }
    }
}
