//! Power flow providers.
//!
//! The security analysis only needs a solver that fills a [`VariantState`] with
//! voltages and flows and reports whether it converged. [`LoadFlowProvider`] is
//! that seam; [`ac_pf::NewtonRaphsonLoadFlow`] is the built-in AC implementation.
//!
//! ## Warm start
//!
//! With [`VoltageInitMode::PreviousValues`] the solver starts from the voltages
//! already stored in the state. Post-contingency runs use it, since the cloned
//! variant still holds the solved base case.

use gridsec_core::{GridSecError, GridSecResult, Network, SolverKind, VariantState};
use serde::{Deserialize, Serialize};

pub mod ac_pf;

pub use ac_pf::{BusType, NewtonRaphsonLoadFlow};

/// Starting point of the Newton-Raphson iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageInitMode {
    /// Flat start: 1.0 pu and 0 rad, setpoints on voltage-controlled buses
    #[default]
    UniformValues,
    /// Reuse the voltages stored in the state; unsolved buses fall back to flat
    PreviousValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadFlowParameters {
    pub voltage_init_mode: VoltageInitMode,
    /// Largest accepted power mismatch (pu)
    pub tolerance: f64,
    pub max_iterations: usize,
    /// System MVA base for per-unit conversion
    pub base_mva: f64,
    pub linear_solver: SolverKind,
}

impl Default for LoadFlowParameters {
    fn default() -> Self {
        Self {
            voltage_init_mode: VoltageInitMode::UniformValues,
            tolerance: 1e-6,
            max_iterations: 20,
            base_mva: 100.0,
            linear_solver: SolverKind::default(),
        }
    }
}

impl LoadFlowParameters {
    pub fn with_voltage_init_mode(mut self, mode: VoltageInitMode) -> Self {
        self.voltage_init_mode = mode;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_linear_solver(mut self, solver: SolverKind) -> Self {
        self.linear_solver = solver;
        self
    }

    pub fn validate(&self) -> GridSecResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(GridSecError::Config(format!(
                "load flow tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(GridSecError::Config(
                "load flow needs at least one iteration".into(),
            ));
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            return Err(GridSecError::Config(format!(
                "base MVA must be positive, got {}",
                self.base_mva
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadFlowStatus {
    Converged,
    MaxIterationReached,
    Failed,
}

/// Outcome for one synchronous island that has generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    /// Position of the island, largest first
    pub synchronous_component: usize,
    pub bus_count: usize,
    pub slack_bus_id: Option<String>,
    pub status: LoadFlowStatus,
    pub iterations: usize,
    pub max_mismatch: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadFlowResult {
    /// Status of the main island
    pub status: LoadFlowStatus,
    pub iterations: usize,
    pub max_mismatch: f64,
    pub components: Vec<ComponentResult>,
}

impl LoadFlowResult {
    pub fn is_ok(&self) -> bool {
        self.status == LoadFlowStatus::Converged
    }

    pub fn failed() -> Self {
        Self {
            status: LoadFlowStatus::Failed,
            iterations: 0,
            max_mismatch: f64::INFINITY,
            components: Vec::new(),
        }
    }
}

/// A power flow engine the security analysis can drive.
///
/// Implementations write their solution into `state`. Divergence is reported
/// through [`LoadFlowResult::status`]; `Err` is reserved for invalid inputs.
pub trait LoadFlowProvider: Send + Sync {
    fn name(&self) -> &str;

    fn run(
        &self,
        network: &Network,
        state: &mut VariantState,
        parameters: &LoadFlowParameters,
    ) -> GridSecResult<LoadFlowResult>;
}
