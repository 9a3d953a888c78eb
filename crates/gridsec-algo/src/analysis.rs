//! Contingency analysis orchestration.
//!
//! [`SecurityAnalysis`] solves the base case, then evaluates every
//! contingency on its own copy of the base-case variant. Contingencies run on
//! a dedicated rayon pool; results come back in list order regardless of
//! completion order.
//!
//! ## Algorithm
//!
//! 1. Solve the base case in place on the requested variant.
//! 2. If it did not converge, return [`SecurityAnalysisResult::failed`].
//! 3. Detect and record base-case violations.
//! 4. For each contingency, on a worker: clone the solved variant, apply the
//!    contingency, re-solve from the base-case voltages, detect.
//! 5. Merge in contingency order.
//!
//! A worker holds at most one variant at a time, so the pool size bounds the
//! number of live variants.

use gridsec_contingency::{ApplyOutcome, Contingency};
use gridsec_core::{GridSecError, GridSecResult, Network, NetworkView, VariantManager};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::builder::{PostContingencyResultBuilder, ResultPipeline, SecurityAnalysisResultBuilder};
use crate::detection::{DefaultLimitViolationDetector, LimitViolationDetector};
use crate::filter::LimitViolationFilter;
use crate::interceptor::{RunningContext, SharedInterceptor};
use crate::monitor::{StateMonitor, StateMonitorIndex};
use crate::power_flow::{LoadFlowParameters, LoadFlowProvider, NewtonRaphsonLoadFlow, VoltageInitMode};
use crate::result::{NetworkMetadata, PostContingencyComputationStatus, PostContingencyResult, SecurityAnalysisResult};

pub const DEFAULT_MAX_VARIANTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityAnalysisParameters {
    /// Base-case solver settings; contingencies reuse them with a warm start
    pub load_flow: LoadFlowParameters,
    /// Turn errors and panics inside one contingency into a FAILED result
    /// instead of aborting the run
    pub isolate_contingency_failures: bool,
    /// Worker threads; `None` uses one per CPU
    pub threads: Option<usize>,
    /// Upper bound on variants alive at the same time
    pub max_variants: usize,
}

impl Default for SecurityAnalysisParameters {
    fn default() -> Self {
        Self {
            load_flow: LoadFlowParameters::default(),
            isolate_contingency_failures: true,
            threads: None,
            max_variants: DEFAULT_MAX_VARIANTS,
        }
    }
}

impl SecurityAnalysisParameters {
    pub fn with_load_flow(mut self, load_flow: LoadFlowParameters) -> Self {
        self.load_flow = load_flow;
        self
    }

    pub fn with_isolate_contingency_failures(mut self, isolate: bool) -> Self {
        self.isolate_contingency_failures = isolate;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_max_variants(mut self, max_variants: usize) -> Self {
        self.max_variants = max_variants;
        self
    }

    pub fn validate(&self) -> GridSecResult<()> {
        self.load_flow.validate()?;
        if self.threads == Some(0) {
            return Err(GridSecError::Config(
                "thread count must be at least 1".into(),
            ));
        }
        if self.max_variants == 0 {
            return Err(GridSecError::Config(
                "max_variants must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Pool size for `contingency_count` contingencies.
    pub fn worker_count(&self, contingency_count: usize) -> usize {
        self.threads
            .unwrap_or_else(num_cpus::get)
            .min(self.max_variants)
            .min(contingency_count)
            .max(1)
    }
}

/// Cooperative cancellation flag shared with a running analysis.
///
/// Contingencies not yet started when the flag is raised are skipped and the
/// run ends with [`GridSecError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sets multi-thread variant access for the duration of the parallel phase.
struct MultiThreadAccess<'a> {
    manager: &'a VariantManager,
    previous: bool,
}

impl<'a> MultiThreadAccess<'a> {
    fn enable(manager: &'a VariantManager) -> Self {
        let previous = manager.is_multi_thread_access_allowed();
        manager.allow_multi_thread_access(true);
        Self { manager, previous }
    }
}

impl Drop for MultiThreadAccess<'_> {
    fn drop(&mut self) {
        self.manager.allow_multi_thread_access(self.previous);
    }
}

/// Everything a worker needs besides the analysis itself.
struct ContingencyRun<'a> {
    variant_id: &'a str,
    warm_start: LoadFlowParameters,
    isolate_failures: bool,
    pipeline: &'a ResultPipeline,
    monitors: &'a StateMonitorIndex,
    cancel: &'a CancellationToken,
}

/// A configured security analysis over one network.
///
/// Cloning is cheap: the network, solver and detector are shared.
#[derive(Clone)]
pub struct SecurityAnalysis {
    network: Arc<Network>,
    provider: Arc<dyn LoadFlowProvider>,
    detector: Arc<dyn LimitViolationDetector>,
    filter: LimitViolationFilter,
    interceptors: Vec<SharedInterceptor>,
    monitors: Vec<StateMonitor>,
}

impl SecurityAnalysis {
    /// Newton-Raphson solver, default detector, no filtering.
    pub fn new(network: Arc<Network>) -> Self {
        Self {
            network,
            provider: Arc::new(NewtonRaphsonLoadFlow::new()),
            detector: Arc::new(DefaultLimitViolationDetector::default()),
            filter: LimitViolationFilter::default(),
            interceptors: Vec::new(),
            monitors: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn LoadFlowProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn LimitViolationDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_filter(mut self, filter: LimitViolationFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_interceptor(mut self, interceptor: SharedInterceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_monitors(mut self, monitors: Vec<StateMonitor>) -> Self {
        self.monitors = monitors;
        self
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// Run on tokio's blocking pool.
    pub async fn run(
        &self,
        variant_id: &str,
        parameters: SecurityAnalysisParameters,
        contingencies: Vec<Contingency>,
        cancel: CancellationToken,
    ) -> GridSecResult<SecurityAnalysisResult> {
        let analysis = self.clone();
        let variant_id = variant_id.to_string();
        tokio::task::spawn_blocking(move || {
            analysis.execute(&variant_id, &parameters, &contingencies, &cancel)
        })
        .await
        .map_err(|e| GridSecError::Other(format!("security analysis task failed: {e}")))?
    }

    /// Blocking form of [`run`](Self::run).
    pub fn execute(
        &self,
        variant_id: &str,
        parameters: &SecurityAnalysisParameters,
        contingencies: &[Contingency],
        cancel: &CancellationToken,
    ) -> GridSecResult<SecurityAnalysisResult> {
        parameters.validate()?;
        if cancel.is_cancelled() {
            return Err(GridSecError::Cancelled);
        }
        for monitor in &self.monitors {
            monitor.validate_against(&self.network)?;
        }

        let network = self.network.as_ref();
        let started = Instant::now();
        let variant = network.variant_manager().variant(variant_id)?;
        info!(
            network = network.id(),
            variant = variant_id,
            solver = self.provider.name(),
            contingencies = contingencies.len(),
            "starting security analysis"
        );

        let mut builder = SecurityAnalysisResultBuilder::new(
            self.filter.clone(),
            RunningContext::new(network.id(), variant_id),
            self.interceptors.clone(),
        )
        .with_network_metadata(NetworkMetadata::from_network(network));
        let monitors = StateMonitorIndex::new(&self.monitors);

        {
            let mut state = variant.write();
            let base = self.provider.run(network, &mut state, &parameters.load_flow)?;
            let view = NetworkView::new(network, &state);
            let mut pre = builder.pre_contingency(&view)?;
            pre.set_status(base.status);
            if !base.is_ok() {
                warn!(
                    network = network.id(),
                    status = ?base.status,
                    iterations = base.iterations,
                    "base case did not converge, skipping contingencies"
                );
                pre.set_computation_ok(false);
                pre.end_pre_contingency();
                return builder.build();
            }
            pre.add_violations(self.detector.detect(&view))
                .set_network_result(monitors.network_result(&view, None));
            pre.end_pre_contingency();
        }

        if !contingencies.is_empty() {
            let posts = self.evaluate_all(variant_id, parameters, contingencies, &builder, &monitors, cancel)?;
            builder.add_post_contingency_results(posts);
        }
        if cancel.is_cancelled() {
            return Err(GridSecError::Cancelled);
        }

        let result = builder.build()?;
        info!(
            network = network.id(),
            contingencies = result.post_contingency_results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "security analysis complete"
        );
        Ok(result)
    }

    fn evaluate_all(
        &self,
        variant_id: &str,
        parameters: &SecurityAnalysisParameters,
        contingencies: &[Contingency],
        builder: &SecurityAnalysisResultBuilder,
        monitors: &StateMonitorIndex,
        cancel: &CancellationToken,
    ) -> GridSecResult<Vec<PostContingencyResult>> {
        let workers = parameters.worker_count(contingencies.len());
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gridsec-sa-{i}"))
            .build()
            .map_err(|e| GridSecError::Other(format!("building contingency thread pool: {e}")))?;
        debug!(workers, "evaluating contingencies");

        let run = ContingencyRun {
            variant_id,
            warm_start: parameters
                .load_flow
                .clone()
                .with_voltage_init_mode(VoltageInitMode::PreviousValues),
            isolate_failures: parameters.isolate_contingency_failures,
            pipeline: builder.pipeline(),
            monitors,
            cancel,
        };

        let _access = MultiThreadAccess::enable(self.network.variant_manager());
        pool.install(|| {
            contingencies
                .par_iter()
                .enumerate()
                .map(|(index, contingency)| self.evaluate_isolated(&run, index, contingency))
                .collect()
        })
    }

    fn evaluate_isolated(
        &self,
        run: &ContingencyRun<'_>,
        index: usize,
        contingency: &Contingency,
    ) -> GridSecResult<PostContingencyResult> {
        if run.cancel.is_cancelled() {
            return Err(GridSecError::Cancelled);
        }
        let message = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluate(run, index, contingency)
        })) {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(GridSecError::Cancelled)) => return Err(GridSecError::Cancelled),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        if !run.isolate_failures {
            return Err(GridSecError::contingency(contingency.id(), message));
        }
        warn!(contingency = contingency.id(), error = %message, "contingency evaluation failed");
        let mut builder =
            PostContingencyResultBuilder::detached(contingency, &self.network, run.pipeline);
        builder
            .set_computation_ok(false)
            .set_status(PostContingencyComputationStatus::Failed);
        Ok(builder.end_contingency())
    }

    fn evaluate(
        &self,
        run: &ContingencyRun<'_>,
        index: usize,
        contingency: &Contingency,
    ) -> GridSecResult<PostContingencyResult> {
        let network = self.network.as_ref();
        let manager = network.variant_manager();
        let variant = manager.scoped_clone(
            run.variant_id,
            &format!("{}-{}-{}", run.variant_id, index, contingency.id()),
        )?;
        manager.set_working_variant(variant.id())?;
        let working = manager.working_variant()?;
        let mut state = working.write();

        let status = match contingency.apply(network, &mut state)? {
            ApplyOutcome::NoImpact => PostContingencyComputationStatus::NoImpact,
            ApplyOutcome::Modified => {
                let outcome = self.provider.run(network, &mut state, &run.warm_start)?;
                PostContingencyComputationStatus::from(outcome.status)
            }
        };
        let computation_ok = matches!(
            status,
            PostContingencyComputationStatus::Converged | PostContingencyComputationStatus::NoImpact
        );
        debug!(contingency = contingency.id(), %status, "contingency solved");

        let view = NetworkView::new(network, &state);
        let mut builder = PostContingencyResultBuilder::detached(contingency, network, run.pipeline);
        builder.set_status(status).set_computation_ok(computation_ok);
        if computation_ok {
            builder
                .add_violations(self.detector.detect_for_contingency(contingency, &view))
                .set_network_result(run.monitors.network_result(&view, Some(contingency.id())));
        }
        Ok(builder.end_contingency())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{triangle_contingencies, triangle_network};
    use gridsec_core::INITIAL_VARIANT_ID;

    #[test]
    fn parameters_validate_and_size_the_pool() {
        let params = SecurityAnalysisParameters::default();
        assert!(params.validate().is_ok());
        assert!(params.isolate_contingency_failures);
        assert_eq!(params.max_variants, DEFAULT_MAX_VARIANTS);

        let params = params.with_threads(Some(8)).with_max_variants(3);
        assert_eq!(params.worker_count(100), 3);
        assert_eq!(params.worker_count(2), 2);
        assert_eq!(params.worker_count(0), 1);

        assert!(SecurityAnalysisParameters::default()
            .with_threads(Some(0))
            .validate()
            .is_err());
        assert!(SecurityAnalysisParameters::default()
            .with_max_variants(0)
            .validate()
            .is_err());
    }

    #[test]
    fn parameters_deserialize_with_defaults() {
        let params: SecurityAnalysisParameters =
            serde_json::from_str(r#"{"threads": 2, "load_flow": {"max_iterations": 30}}"#).unwrap();
        assert_eq!(params.threads, Some(2));
        assert_eq!(params.load_flow.max_iterations, 30);
        assert!(params.isolate_contingency_failures);
    }

    #[test]
    fn cancellation_token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn multi_thread_access_is_restored() {
        let network = triangle_network().unwrap();
        let manager = network.variant_manager();
        {
            let _access = MultiThreadAccess::enable(manager);
            assert!(manager.is_multi_thread_access_allowed());
        }
        assert!(!manager.is_multi_thread_access_allowed());
    }

    #[test]
    fn unknown_variant_is_an_error() {
        let analysis = SecurityAnalysis::new(Arc::new(triangle_network().unwrap()));
        let err = analysis
            .execute(
                "missing",
                &SecurityAnalysisParameters::default(),
                &triangle_contingencies(),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, GridSecError::Variant(_)));
    }

    #[test]
    fn triangle_results_follow_the_contingency_order() {
        let network = Arc::new(triangle_network().unwrap());
        let result = SecurityAnalysis::new(Arc::clone(&network))
            .execute(
                INITIAL_VARIANT_ID,
                &SecurityAnalysisParameters::default().with_threads(Some(3)),
                &triangle_contingencies(),
                &CancellationToken::new(),
            )
            .unwrap();

        assert!(!result.is_failed());
        let ids: Vec<_> = result
            .post_contingency_results
            .iter()
            .map(|r| r.contingency_id.as_str())
            .collect();
        assert_eq!(ids, vec!["L12", "L23", "L13"]);
        assert_eq!(network.variant_manager().variant_count(), 1);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
