//! Result builder.
//!
//! [`SecurityAnalysisResultBuilder`] collects one base-case result and any
//! number of post-contingency results, then produces the final
//! [`SecurityAnalysisResult`]. Opening a phase borrows the builder mutably
//! until the phase is closed, so the compiler enforces that at most one phase
//! is open at a time. Closing a phase filters its violations and notifies the
//! interceptors.
//!
//! Parallel workers use [`PostContingencyResultBuilder::detached`] instead:
//! it shares only the read-only [`ResultPipeline`] and hands its result back
//! to the caller. [`SharedResultBuilder`] serves callers that really want one
//! builder shared between threads; it holds the lock from open to close.

use gridsec_contingency::Contingency;
use gridsec_core::{GridSecError, GridSecResult, Network, NetworkView};
use parking_lot::{Mutex, MutexGuard};

use crate::filter::LimitViolationFilter;
use crate::interceptor::{RunningContext, SharedInterceptor};
use crate::merge::merge;
use crate::power_flow::LoadFlowStatus;
use crate::result::{
    LimitViolationsResult, NetworkMetadata, NetworkResult, PostContingencyComputationStatus,
    PostContingencyResult, PreContingencyResult, SecurityAnalysisResult,
};
use crate::violation::LimitViolation;

/// What happens to every closed result: filtering and interceptor calls.
pub struct ResultPipeline {
    filter: LimitViolationFilter,
    context: RunningContext,
    interceptors: Vec<SharedInterceptor>,
}

impl ResultPipeline {
    pub fn new(
        filter: LimitViolationFilter,
        context: RunningContext,
        interceptors: Vec<SharedInterceptor>,
    ) -> Self {
        Self {
            filter,
            context,
            interceptors,
        }
    }

    pub fn context(&self) -> &RunningContext {
        &self.context
    }

    pub fn filter(&self) -> &LimitViolationFilter {
        &self.filter
    }

    fn kept_violations(
        &self,
        network: &Network,
        contingency_id: Option<&str>,
        violations: &[LimitViolation],
    ) -> Vec<LimitViolation> {
        let kept = self.filter.apply(violations, network);
        for violation in &kept {
            for interceptor in &self.interceptors {
                interceptor.on_limit_violation(contingency_id, violation, &self.context);
            }
        }
        kept
    }

    fn finish_pre(
        &self,
        network: &Network,
        mut draft: Draft,
        status: LoadFlowStatus,
    ) -> PreContingencyResult {
        let network_result = std::mem::take(&mut draft.network_result);
        let result = PreContingencyResult {
            status,
            limit_violations_result: draft.into_violations_result(self, network, None),
            network_result,
        };
        for interceptor in &self.interceptors {
            interceptor.on_pre_contingency_result(&result, &self.context);
        }
        result
    }

    fn finish_post(
        &self,
        network: &Network,
        contingency_id: String,
        mut draft: Draft,
        status: PostContingencyComputationStatus,
    ) -> PostContingencyResult {
        let network_result = std::mem::take(&mut draft.network_result);
        let limit_violations_result =
            draft.into_violations_result(self, network, Some(&contingency_id));
        let result = PostContingencyResult {
            contingency_id,
            status,
            limit_violations_result,
            network_result,
        };
        for interceptor in &self.interceptors {
            interceptor.on_post_contingency_result(&result, &self.context);
        }
        result
    }
}

/// Content accumulated while a phase is open.
#[derive(Debug, Clone)]
struct Draft {
    computation_ok: bool,
    violations: Vec<LimitViolation>,
    actions_taken: Vec<String>,
    network_result: NetworkResult,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            computation_ok: true,
            violations: Vec::new(),
            actions_taken: Vec::new(),
            network_result: NetworkResult::default(),
        }
    }
}

impl Draft {
    fn into_violations_result(
        self,
        pipeline: &ResultPipeline,
        network: &Network,
        contingency_id: Option<&str>,
    ) -> LimitViolationsResult {
        LimitViolationsResult {
            computation_ok: self.computation_ok,
            limit_violations: pipeline.kept_violations(network, contingency_id, &self.violations),
            actions_taken: self.actions_taken,
        }
    }
}

pub struct SecurityAnalysisResultBuilder {
    pipeline: ResultPipeline,
    network_metadata: Option<NetworkMetadata>,
    pre_contingency: Option<PreContingencyResult>,
    post_contingency: Vec<PostContingencyResult>,
}

impl SecurityAnalysisResultBuilder {
    pub fn new(
        filter: LimitViolationFilter,
        context: RunningContext,
        interceptors: Vec<SharedInterceptor>,
    ) -> Self {
        Self {
            pipeline: ResultPipeline::new(filter, context, interceptors),
            network_metadata: None,
            pre_contingency: None,
            post_contingency: Vec::new(),
        }
    }

    pub fn with_network_metadata(mut self, metadata: NetworkMetadata) -> Self {
        self.network_metadata = Some(metadata);
        self
    }

    pub fn pipeline(&self) -> &ResultPipeline {
        &self.pipeline
    }

    /// Open the base-case phase. Fails if a base-case result was already stored.
    pub fn pre_contingency<'b>(
        &'b mut self,
        view: &NetworkView<'b>,
    ) -> GridSecResult<PreContingencyResultBuilder<'b>> {
        self.check_pre_not_closed()?;
        Ok(PreContingencyResultBuilder::new(Slot::Borrowed(self), view.network()))
    }

    /// Open a post-contingency phase.
    pub fn contingency<'b>(
        &'b mut self,
        contingency: &Contingency,
        view: &NetworkView<'b>,
    ) -> PostContingencyResultBuilder<'b> {
        PostContingencyResultBuilder::new(
            Target::Attached(Slot::Borrowed(self)),
            contingency,
            view.network(),
        )
    }

    /// Store already built post-contingency results, in order.
    pub fn add_post_contingency_results(
        &mut self,
        results: impl IntoIterator<Item = PostContingencyResult>,
    ) {
        self.post_contingency.extend(results);
    }

    pub fn has_pre_contingency_result(&self) -> bool {
        self.pre_contingency.is_some()
    }

    fn check_pre_not_closed(&self) -> GridSecResult<()> {
        if self.pre_contingency.is_some() {
            return Err(GridSecError::IllegalState(
                "pre-contingency result already set".into(),
            ));
        }
        Ok(())
    }

    pub fn build(self) -> GridSecResult<SecurityAnalysisResult> {
        let pre = self
            .pre_contingency
            .ok_or_else(|| GridSecError::IllegalState("no pre-contingency result".into()))?;
        let mut result = merge(pre, self.post_contingency);
        result.network_metadata = self.network_metadata;
        for interceptor in &self.pipeline.interceptors {
            interceptor.on_security_analysis_result(&result, &self.pipeline.context);
        }
        Ok(result)
    }
}

/// Exclusive access to a parent builder, either borrowed or locked.
enum Slot<'b> {
    Borrowed(&'b mut SecurityAnalysisResultBuilder),
    Locked(MutexGuard<'b, SecurityAnalysisResultBuilder>),
}

impl Slot<'_> {
    fn get_mut(&mut self) -> &mut SecurityAnalysisResultBuilder {
        match self {
            Slot::Borrowed(builder) => &mut **builder,
            Slot::Locked(guard) => &mut **guard,
        }
    }
}

macro_rules! draft_accessors {
    () => {
        pub fn add_violation(&mut self, violation: LimitViolation) -> &mut Self {
            self.draft.violations.push(violation);
            self
        }

        pub fn add_violations(
            &mut self,
            violations: impl IntoIterator<Item = LimitViolation>,
        ) -> &mut Self {
            self.draft.violations.extend(violations);
            self
        }

        pub fn set_computation_ok(&mut self, ok: bool) -> &mut Self {
            self.draft.computation_ok = ok;
            self
        }

        pub fn add_action_taken(&mut self, action: impl Into<String>) -> &mut Self {
            self.draft.actions_taken.push(action.into());
            self
        }

        pub fn set_network_result(&mut self, network_result: NetworkResult) -> &mut Self {
            self.draft.network_result = network_result;
            self
        }
    };
}

pub struct PreContingencyResultBuilder<'b> {
    slot: Slot<'b>,
    network: &'b Network,
    status: LoadFlowStatus,
    draft: Draft,
}

impl<'b> PreContingencyResultBuilder<'b> {
    fn new(slot: Slot<'b>, network: &'b Network) -> Self {
        Self {
            slot,
            network,
            status: LoadFlowStatus::Converged,
            draft: Draft::default(),
        }
    }

    draft_accessors!();

    pub fn set_status(&mut self, status: LoadFlowStatus) -> &mut Self {
        self.status = status;
        self
    }

    pub fn end_pre_contingency(self) {
        let Self {
            mut slot,
            network,
            status,
            draft,
        } = self;
        let parent = slot.get_mut();
        let result = parent.pipeline.finish_pre(network, draft, status);
        parent.pre_contingency = Some(result);
    }
}

enum Target<'b> {
    Attached(Slot<'b>),
    Detached(&'b ResultPipeline),
}

pub struct PostContingencyResultBuilder<'b> {
    target: Target<'b>,
    network: &'b Network,
    contingency_id: String,
    status: PostContingencyComputationStatus,
    draft: Draft,
}

impl<'b> PostContingencyResultBuilder<'b> {
    fn new(target: Target<'b>, contingency: &Contingency, network: &'b Network) -> Self {
        Self {
            target,
            network,
            contingency_id: contingency.id().to_string(),
            status: PostContingencyComputationStatus::Converged,
            draft: Draft::default(),
        }
    }

    /// A builder that is not attached to any parent. Its result is returned
    /// by [`end_contingency`](Self::end_contingency) and nowhere stored.
    pub fn detached(
        contingency: &Contingency,
        network: &'b Network,
        pipeline: &'b ResultPipeline,
    ) -> Self {
        Self::new(Target::Detached(pipeline), contingency, network)
    }

    draft_accessors!();

    pub fn set_status(&mut self, status: PostContingencyComputationStatus) -> &mut Self {
        self.status = status;
        self
    }

    /// Close the phase. An attached builder also appends the result to its parent.
    pub fn end_contingency(self) -> PostContingencyResult {
        let Self {
            target,
            network,
            contingency_id,
            status,
            draft,
        } = self;
        match target {
            Target::Detached(pipeline) => {
                pipeline.finish_post(network, contingency_id, draft, status)
            }
            Target::Attached(mut slot) => {
                let parent = slot.get_mut();
                let result = parent
                    .pipeline
                    .finish_post(network, contingency_id, draft, status);
                parent.post_contingency.push(result.clone());
                result
            }
        }
    }
}

/// A result builder usable from several threads.
///
/// Opening a phase locks the builder until that phase is closed.
pub struct SharedResultBuilder {
    inner: Mutex<SecurityAnalysisResultBuilder>,
}

impl SharedResultBuilder {
    pub fn new(builder: SecurityAnalysisResultBuilder) -> Self {
        Self {
            inner: Mutex::new(builder),
        }
    }

    pub fn pre_contingency<'b>(
        &'b self,
        view: &NetworkView<'b>,
    ) -> GridSecResult<PreContingencyResultBuilder<'b>> {
        let guard = self.inner.lock();
        guard.check_pre_not_closed()?;
        Ok(PreContingencyResultBuilder::new(Slot::Locked(guard), view.network()))
    }

    pub fn contingency<'b>(
        &'b self,
        contingency: &Contingency,
        view: &NetworkView<'b>,
    ) -> GridSecResult<PostContingencyResultBuilder<'b>> {
        let guard = self.inner.lock();
        Ok(PostContingencyResultBuilder::new(
            Target::Attached(Slot::Locked(guard)),
            contingency,
            view.network(),
        ))
    }

    pub fn build(self) -> GridSecResult<SecurityAnalysisResult> {
        self.inner.into_inner().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::SecurityAnalysisInterceptor;
    use crate::test_utils::triangle_network;
    use crate::violation::LimitViolationType;
    use gridsec_core::{TwoSides, INITIAL_VARIANT_ID};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counting {
        violations: AtomicUsize,
        pre: AtomicUsize,
        post: AtomicUsize,
        results: AtomicUsize,
    }

    impl SecurityAnalysisInterceptor for Counting {
        fn on_pre_contingency_result(&self, _: &PreContingencyResult, _: &RunningContext) {
            self.pre.fetch_add(1, Ordering::SeqCst);
        }

        fn on_post_contingency_result(&self, _: &PostContingencyResult, _: &RunningContext) {
            self.post.fetch_add(1, Ordering::SeqCst);
        }

        fn on_security_analysis_result(&self, _: &SecurityAnalysisResult, _: &RunningContext) {
            self.results.fetch_add(1, Ordering::SeqCst);
        }

        fn on_limit_violation(&self, _: Option<&str>, _: &LimitViolation, _: &RunningContext) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn builder(filter: LimitViolationFilter, counting: &Arc<Counting>) -> SecurityAnalysisResultBuilder {
        let interceptor: SharedInterceptor = counting.clone();
        SecurityAnalysisResultBuilder::new(
            filter,
            RunningContext::new("triangle", INITIAL_VARIANT_ID),
            vec![interceptor],
        )
    }

    fn current(id: &str) -> LimitViolation {
        LimitViolation::builder(id, LimitViolationType::Current)
            .limit(500.0)
            .value(600.0)
            .side(TwoSides::One)
            .build()
            .unwrap()
    }

    fn low_voltage() -> LimitViolation {
        LimitViolation::builder("VL1", LimitViolationType::LowVoltage)
            .limit(380.0)
            .value(370.0)
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_a_closed_pre_contingency_phase() {
        let counting = Arc::new(Counting::default());
        let err = builder(LimitViolationFilter::default(), &counting)
            .build()
            .unwrap_err();
        assert!(matches!(err, GridSecError::IllegalState(_)));
    }

    #[test]
    fn phases_filter_and_notify() {
        let network = triangle_network().unwrap();
        let state = network.initial_state();
        let view = NetworkView::new(&network, &state);
        let counting = Arc::new(Counting::default());
        let only_current = LimitViolationFilter::new(
            Some(HashSet::from([LimitViolationType::Current])),
            0.0,
            None,
        )
        .unwrap();
        let mut builder = builder(only_current, &counting)
            .with_network_metadata(NetworkMetadata::from_network(&network));

        let mut pre = builder.pre_contingency(&view).unwrap();
        pre.add_violations([current("L12"), low_voltage()]);
        pre.end_pre_contingency();
        assert!(builder.pre_contingency(&view).is_err());

        let contingency = Contingency::branch("L13");
        let mut post = builder.contingency(&contingency, &view);
        post.add_violation(current("L12"))
            .add_action_taken("redispatch")
            .set_status(PostContingencyComputationStatus::Converged);
        let closed = post.end_contingency();
        assert_eq!(closed.limit_violations_result.actions_taken, vec!["redispatch"]);

        let result = builder.build().unwrap();
        assert_eq!(
            result.pre_contingency_result.limit_violations_result.limit_violations,
            vec![current("L12")]
        );
        assert_eq!(result.post_contingency_results, vec![closed]);
        assert_eq!(result.network_metadata.unwrap().id, "triangle");

        assert_eq!(counting.violations.load(Ordering::SeqCst), 2);
        assert_eq!(counting.pre.load(Ordering::SeqCst), 1);
        assert_eq!(counting.post.load(Ordering::SeqCst), 1);
        assert_eq!(counting.results.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_base_case_builds_the_failed_sentinel() {
        let network = triangle_network().unwrap();
        let state = network.initial_state();
        let view = NetworkView::new(&network, &state);
        let counting = Arc::new(Counting::default());
        let mut builder = builder(LimitViolationFilter::default(), &counting);

        let mut pre = builder.pre_contingency(&view).unwrap();
        pre.set_computation_ok(false).set_status(LoadFlowStatus::Failed);
        pre.end_pre_contingency();
        builder.add_post_contingency_results([PostContingencyResult::failed("C1")]);

        let result = builder.build().unwrap();
        assert_eq!(result, SecurityAnalysisResult::failed());
    }

    #[test]
    fn detached_builders_leave_the_parent_untouched() {
        let network = triangle_network().unwrap();
        let state = network.initial_state();
        let view = NetworkView::new(&network, &state);
        let counting = Arc::new(Counting::default());
        let mut parent = builder(LimitViolationFilter::default(), &counting);

        let detached = {
            let contingency = Contingency::branch("L12");
            let mut post =
                PostContingencyResultBuilder::detached(&contingency, &network, parent.pipeline());
            post.set_computation_ok(false)
                .set_status(PostContingencyComputationStatus::Failed);
            post.end_contingency()
        };
        assert_eq!(detached.status, PostContingencyComputationStatus::Failed);
        assert_eq!(counting.post.load(Ordering::SeqCst), 1);

        parent.pre_contingency(&view).unwrap().end_pre_contingency();
        assert!(parent.build().unwrap().post_contingency_results.is_empty());
    }

    #[test]
    fn shared_builder_accepts_results_from_several_threads() {
        let network = triangle_network().unwrap();
        let state = network.initial_state();
        let counting = Arc::new(Counting::default());
        let shared = SharedResultBuilder::new(builder(LimitViolationFilter::default(), &counting));

        {
            let view = NetworkView::new(&network, &state);
            shared.pre_contingency(&view).unwrap().end_pre_contingency();
        }
        std::thread::scope(|scope| {
            for id in ["L12", "L23", "L13"] {
                let shared = &shared;
                let network = &network;
                let state = &state;
                scope.spawn(move || {
                    let view = NetworkView::new(network, state);
                    let contingency = Contingency::branch(id);
                    let mut post = shared.contingency(&contingency, &view).unwrap();
                    post.add_violation(current(id));
                    post.end_contingency();
                });
            }
        });

        let result = shared.build().unwrap();
        let mut ids: Vec<_> = result
            .post_contingency_results
            .iter()
            .map(|r| r.contingency_id.clone())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["L12", "L13", "L23"]);
        assert_eq!(counting.violations.load(Ordering::SeqCst), 3);
    }
}
