//! Hooks called as results are produced.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::result::{PostContingencyResult, PreContingencyResult, SecurityAnalysisResult};
use crate::violation::LimitViolation;

/// Identifies the run an interceptor is being called for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContext {
    pub network_id: String,
    pub initial_variant_id: String,
}

impl RunningContext {
    pub fn new(network_id: impl Into<String>, initial_variant_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            initial_variant_id: initial_variant_id.into(),
        }
    }
}

/// Observer of a security analysis.
///
/// Post-contingency callbacks come from worker threads as contingencies
/// finish, so their order is not the contingency list order. Every method
/// defaults to a no-op.
pub trait SecurityAnalysisInterceptor: Send + Sync {
    /// Receives the base case result as solved. When the base case does not
    /// converge this carries the load flow's own status (for instance
    /// `MaxIterationReached`), while the final result handed to
    /// [`Self::on_security_analysis_result`] is the `Failed` sentinel.
    fn on_pre_contingency_result(&self, _result: &PreContingencyResult, _context: &RunningContext) {}

    fn on_post_contingency_result(
        &self,
        _result: &PostContingencyResult,
        _context: &RunningContext,
    ) {
    }

    fn on_security_analysis_result(
        &self,
        _result: &SecurityAnalysisResult,
        _context: &RunningContext,
    ) {
    }

    /// Called once per violation kept by the filter. `contingency_id` is
    /// `None` for the base case.
    fn on_limit_violation(
        &self,
        _contingency_id: Option<&str>,
        _violation: &LimitViolation,
        _context: &RunningContext,
    ) {
    }
}

pub type SharedInterceptor = Arc<dyn SecurityAnalysisInterceptor>;

/// Logs every result through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInterceptor;

impl SecurityAnalysisInterceptor for LoggingInterceptor {
    fn on_pre_contingency_result(&self, result: &PreContingencyResult, context: &RunningContext) {
        info!(
            network = %context.network_id,
            status = ?result.status,
            violations = result.limit_violations_result.limit_violations.len(),
            "pre-contingency result"
        );
    }

    fn on_post_contingency_result(&self, result: &PostContingencyResult, context: &RunningContext) {
        if result.limit_violations_result.computation_ok {
            debug!(
                network = %context.network_id,
                contingency = %result.contingency_id,
                status = %result.status,
                violations = result.limit_violations_result.limit_violations.len(),
                "post-contingency result"
            );
        } else {
            warn!(
                network = %context.network_id,
                contingency = %result.contingency_id,
                status = %result.status,
                "post-contingency computation failed"
            );
        }
    }

    fn on_security_analysis_result(&self, result: &SecurityAnalysisResult, context: &RunningContext) {
        info!(
            network = %context.network_id,
            failed = result.is_failed(),
            contingencies = result.post_contingency_results.len(),
            "security analysis result"
        );
    }

    fn on_limit_violation(
        &self,
        contingency_id: Option<&str>,
        violation: &LimitViolation,
        _context: &RunningContext,
    ) {
        debug!(
            contingency = contingency_id.unwrap_or("N"),
            subject = violation.subject_id(),
            limit_type = %violation.limit_type(),
            value = violation.value(),
            limit = violation.limit(),
            "limit violation"
        );
    }
}

type PostCallback = Box<dyn Fn(&PostContingencyResult) + Send + Sync>;
type FinalCallback = Box<dyn Fn(&SecurityAnalysisResult) + Send + Sync>;

/// Adapts closures to the interceptor interface.
#[derive(Default)]
pub struct FnInterceptor {
    on_post: Option<PostCallback>,
    on_result: Option<FinalCallback>,
}

impl FnInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_post_contingency(
        mut self,
        callback: impl Fn(&PostContingencyResult) + Send + Sync + 'static,
    ) -> Self {
        self.on_post = Some(Box::new(callback));
        self
    }

    pub fn on_result(
        mut self,
        callback: impl Fn(&SecurityAnalysisResult) + Send + Sync + 'static,
    ) -> Self {
        self.on_result = Some(Box::new(callback));
        self
    }
}

impl SecurityAnalysisInterceptor for FnInterceptor {
    fn on_post_contingency_result(&self, result: &PostContingencyResult, _: &RunningContext) {
        if let Some(callback) = &self.on_post {
            callback(result);
        }
    }

    fn on_security_analysis_result(&self, result: &SecurityAnalysisResult, _: &RunningContext) {
        if let Some(callback) = &self.on_result {
            callback(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fn_interceptor_forwards_to_closures() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let interceptor = FnInterceptor::new()
            .on_post_contingency(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let context = RunningContext::new("n", "InitialState");

        interceptor.on_post_contingency_result(&PostContingencyResult::failed("C1"), &context);
        interceptor.on_security_analysis_result(&SecurityAnalysisResult::failed(), &context);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn logging_interceptor_accepts_every_callback() {
        let context = RunningContext::new("n", "InitialState");
        let interceptor: SharedInterceptor = Arc::new(LoggingInterceptor);
        interceptor.on_pre_contingency_result(&PreContingencyResult::failed(), &context);
        interceptor.on_post_contingency_result(&PostContingencyResult::failed("C1"), &context);
        interceptor.on_security_analysis_result(&SecurityAnalysisResult::failed(), &context);
    }
}
