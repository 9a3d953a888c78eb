//! Security analysis results.

use gridsec_core::Network;
use serde::{Deserialize, Serialize};

use crate::monitor::{BranchResult, BusResult, ThreeWindingsTransformerResult};
use crate::power_flow::LoadFlowStatus;
use crate::violation::LimitViolation;

/// Violations found in one network state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitViolationsResult {
    /// False when the state could not be computed; the violations are then
    /// meaningless
    pub computation_ok: bool,
    pub limit_violations: Vec<LimitViolation>,
    #[serde(default)]
    pub actions_taken: Vec<String>,
}

impl LimitViolationsResult {
    pub fn new(computation_ok: bool, limit_violations: Vec<LimitViolation>) -> Self {
        Self {
            computation_ok,
            limit_violations,
            actions_taken: Vec::new(),
        }
    }

    pub fn failed() -> Self {
        Self::new(false, Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostContingencyComputationStatus {
    Converged,
    MaxIterationReached,
    SolverFailed,
    /// The contingency could not be evaluated at all
    Failed,
    /// Every element of the contingency was already out of service
    NoImpact,
}

impl PostContingencyComputationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostContingencyComputationStatus::Converged => "CONVERGED",
            PostContingencyComputationStatus::MaxIterationReached => "MAX_ITERATION_REACHED",
            PostContingencyComputationStatus::SolverFailed => "SOLVER_FAILED",
            PostContingencyComputationStatus::Failed => "FAILED",
            PostContingencyComputationStatus::NoImpact => "NO_IMPACT",
        }
    }
}

impl std::fmt::Display for PostContingencyComputationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LoadFlowStatus> for PostContingencyComputationStatus {
    fn from(status: LoadFlowStatus) -> Self {
        match status {
            LoadFlowStatus::Converged => PostContingencyComputationStatus::Converged,
            LoadFlowStatus::MaxIterationReached => {
                PostContingencyComputationStatus::MaxIterationReached
            }
            LoadFlowStatus::Failed => PostContingencyComputationStatus::SolverFailed,
        }
    }
}

/// Flows and voltages recorded by state monitors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkResult {
    pub branch_results: Vec<BranchResult>,
    pub bus_results: Vec<BusResult>,
    pub three_windings_transformer_results: Vec<ThreeWindingsTransformerResult>,
}

impl NetworkResult {
    pub fn is_empty(&self) -> bool {
        self.branch_results.is_empty()
            && self.bus_results.is_empty()
            && self.three_windings_transformer_results.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreContingencyResult {
    pub status: LoadFlowStatus,
    pub limit_violations_result: LimitViolationsResult,
    #[serde(default, skip_serializing_if = "NetworkResult::is_empty")]
    pub network_result: NetworkResult,
}

impl PreContingencyResult {
    pub fn failed() -> Self {
        Self {
            status: LoadFlowStatus::Failed,
            limit_violations_result: LimitViolationsResult::failed(),
            network_result: NetworkResult::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostContingencyResult {
    pub contingency_id: String,
    pub status: PostContingencyComputationStatus,
    pub limit_violations_result: LimitViolationsResult,
    #[serde(default, skip_serializing_if = "NetworkResult::is_empty")]
    pub network_result: NetworkResult,
}

impl PostContingencyResult {
    /// Result of a contingency whose evaluation raised an error.
    pub fn failed(contingency_id: impl Into<String>) -> Self {
        Self {
            contingency_id: contingency_id.into(),
            status: PostContingencyComputationStatus::Failed,
            limit_violations_result: LimitViolationsResult::failed(),
            network_result: NetworkResult::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMetadata {
    pub id: String,
    pub source_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_date: Option<String>,
}

impl NetworkMetadata {
    pub fn from_network(network: &Network) -> Self {
        Self {
            id: network.id().to_string(),
            source_format: network.source_format().to_string(),
            case_date: network.case_date().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_metadata: Option<NetworkMetadata>,
    pub pre_contingency_result: PreContingencyResult,
    pub post_contingency_results: Vec<PostContingencyResult>,
}

impl SecurityAnalysisResult {
    /// The base case could not be computed: no violations, no contingencies.
    pub fn failed() -> Self {
        Self {
            network_metadata: None,
            pre_contingency_result: PreContingencyResult::failed(),
            post_contingency_results: Vec::new(),
        }
    }

    pub fn with_network_metadata(mut self, metadata: NetworkMetadata) -> Self {
        self.network_metadata = Some(metadata);
        self
    }

    pub fn is_failed(&self) -> bool {
        !self
            .pre_contingency_result
            .limit_violations_result
            .computation_ok
    }

    pub fn post_contingency_result(&self, contingency_id: &str) -> Option<&PostContingencyResult> {
        self.post_contingency_results
            .iter()
            .find(|r| r.contingency_id == contingency_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_sentinel_has_nothing_in_it() {
        let failed = SecurityAnalysisResult::failed();
        assert!(failed.is_failed());
        assert_eq!(failed.pre_contingency_result.status, LoadFlowStatus::Failed);
        assert!(failed
            .pre_contingency_result
            .limit_violations_result
            .limit_violations
            .is_empty());
        assert!(failed.post_contingency_results.is_empty());
    }

    #[test]
    fn solver_statuses_map_onto_post_contingency_statuses() {
        assert_eq!(
            PostContingencyComputationStatus::from(LoadFlowStatus::Failed),
            PostContingencyComputationStatus::SolverFailed
        );
        assert_eq!(
            PostContingencyComputationStatus::from(LoadFlowStatus::MaxIterationReached)
                .to_string(),
            "MAX_ITERATION_REACHED"
        );
    }

    #[test]
    fn json_omits_empty_network_results() {
        let result = SecurityAnalysisResult {
            network_metadata: Some(NetworkMetadata {
                id: "n".into(),
                source_format: "gridsec-json".into(),
                case_date: None,
            }),
            pre_contingency_result: PreContingencyResult {
                status: LoadFlowStatus::Converged,
                limit_violations_result: LimitViolationsResult::new(true, Vec::new()),
                network_result: NetworkResult::default(),
            },
            post_contingency_results: vec![PostContingencyResult::failed("C1")],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["pre_contingency_result"].get("network_result").is_none());
        assert_eq!(json["post_contingency_results"][0]["status"], "FAILED");
        let back: SecurityAnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
