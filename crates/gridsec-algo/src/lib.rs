//! # gridsec-algo: contingency-based security analysis
//!
//! Given a network variant and a list of contingencies, determines which
//! elements exceed their operating limits in the base case and after each
//! contingency taken on its own.
//!
//! ## Pipeline
//!
//! | Stage | Type | Role |
//! |-------|------|------|
//! | Solve | [`LoadFlowProvider`] | AC power flow, warm-started after each outage |
//! | Detect | [`LimitViolationDetector`] | Current (PATL/TATL), voltage and angle checks |
//! | Filter | [`LimitViolationFilter`] | Keep violations by type, base voltage, country |
//! | Collect | [`SecurityAnalysisResultBuilder`] | Base-case then per-contingency results |
//! | Merge | [`merge()`], [`merge_partial_results`] | Ordered final result, split runs |
//!
//! [`SecurityAnalysis`] drives the stages over a rayon pool, each contingency
//! on its own variant. Interceptors observe results as they are produced and
//! state monitors copy selected flows and voltages into them.
//!
//! ## Example
//!
//! ```ignore
//! use gridsec_algo::{CancellationToken, SecurityAnalysis, SecurityAnalysisParameters};
//! use gridsec_core::INITIAL_VARIANT_ID;
//! use std::sync::Arc;
//!
//! let network = Arc::new(load_case("case.json")?);
//! let contingencies = gridsec_contingency::generate_n1(&network, &Default::default()).contingencies;
//!
//! let result = SecurityAnalysis::new(network).execute(
//!     INITIAL_VARIANT_ID,
//!     &SecurityAnalysisParameters::default(),
//!     &contingencies,
//!     &CancellationToken::new(),
//! )?;
//! println!("{} contingencies evaluated", result.post_contingency_results.len());
//! ```

pub mod analysis;
pub mod builder;
pub mod detection;
pub mod filter;
pub mod interceptor;
pub mod merge;
pub mod monitor;
pub mod power_flow;
pub mod result;
pub mod test_utils;
pub mod violation;

pub use analysis::{CancellationToken, SecurityAnalysis, SecurityAnalysisParameters};
pub use builder::{
    PostContingencyResultBuilder, PreContingencyResultBuilder, ResultPipeline,
    SecurityAnalysisResultBuilder, SharedResultBuilder,
};
pub use detection::{dc_current, DefaultLimitViolationDetector, LimitViolationDetector, LoadingLimitType};
pub use filter::{FilterConfig, LimitViolationFilter};
pub use interceptor::{
    FnInterceptor, LoggingInterceptor, RunningContext, SecurityAnalysisInterceptor,
    SharedInterceptor,
};
pub use merge::{merge, merge_partial_results, Partition};
pub use monitor::{
    BranchResult, BusResult, ContingencyContext, StateMonitor, StateMonitorIndex,
    ThreeWindingsTransformerResult,
};
pub use power_flow::{
    LoadFlowParameters, LoadFlowProvider, LoadFlowResult, LoadFlowStatus, NewtonRaphsonLoadFlow,
    VoltageInitMode,
};
pub use result::{
    LimitViolationsResult, NetworkMetadata, NetworkResult, PostContingencyComputationStatus,
    PostContingencyResult, PreContingencyResult, SecurityAnalysisResult,
};
pub use violation::{
    LimitViolation, LimitViolationBuilder, LimitViolationKey, LimitViolationType,
    PERMANENT_LIMIT_DURATION,
};
