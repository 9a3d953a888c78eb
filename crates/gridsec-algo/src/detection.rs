//! Limit violation detection.
//!
//! A detector walks one network state and reports every measured quantity
//! that is beyond its limit: branch and transformer-leg currents against
//! permanent (PATL) and temporary (TATL) limits, bus voltages against their
//! voltage level's bounds, and angle differences against voltage angle
//! limits. Measurements that were not computed (NaN) never violate anything.
//!
//! Current limits are compared against `reduction × limit`. Voltage and
//! angle limits are never reduced.

use gridsec_contingency::Contingency;
use gridsec_core::{
    CurrentLimits, GridSecError, GridSecResult, NetworkView, TerminalState, ThreeSides, TwoSides,
    VoltageAngleLimit, VoltageLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::violation::{LimitViolation, LimitViolationType, PERMANENT_LIMIT_DURATION};

/// Which current limits a detector looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingLimitType {
    /// Permanent admissible transmission limit
    Patl,
    /// Temporary admissible transmission limits
    Tatl,
}

impl FromStr for LoadingLimitType {
    type Err = GridSecError;

    fn from_str(input: &str) -> GridSecResult<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "PATL" => Ok(LoadingLimitType::Patl),
            "TATL" => Ok(LoadingLimitType::Tatl),
            other => Err(GridSecError::Parse(format!(
                "unknown current limit type '{other}', expected PATL or TATL"
            ))),
        }
    }
}

pub trait LimitViolationDetector: Send + Sync {
    /// Report every violation of the state behind `view`.
    fn check_all(&self, view: &NetworkView<'_>, consumer: &mut dyn FnMut(LimitViolation));

    /// Same as [`check_all`](Self::check_all) for a post-contingency state.
    fn check_all_for_contingency(
        &self,
        _contingency: &Contingency,
        view: &NetworkView<'_>,
        consumer: &mut dyn FnMut(LimitViolation),
    ) {
        self.check_all(view, consumer);
    }

    fn detect(&self, view: &NetworkView<'_>) -> Vec<LimitViolation> {
        let mut violations = Vec::new();
        self.check_all(view, &mut |v| violations.push(v));
        violations
    }

    fn detect_for_contingency(
        &self,
        contingency: &Contingency,
        view: &NetworkView<'_>,
    ) -> Vec<LimitViolation> {
        let mut violations = Vec::new();
        self.check_all_for_contingency(contingency, view, &mut |v| violations.push(v));
        violations
    }
}

/// Current of a terminal computed from its active power alone.
///
/// `1000·|P| / (√3·V·pf)` with `P` in MW, `V` in kV and the result in A.
pub fn dc_current(p_mw: f64, nominal_kv: f64, power_factor: f64) -> GridSecResult<f64> {
    validate_power_factor(power_factor)?;
    Ok(dc_current_unchecked(p_mw, nominal_kv, power_factor))
}

fn dc_current_unchecked(p_mw: f64, nominal_kv: f64, power_factor: f64) -> f64 {
    1000.0 * p_mw.abs() / (3f64.sqrt() * nominal_kv * power_factor)
}

fn validate_power_factor(power_factor: f64) -> GridSecResult<()> {
    if power_factor > 0.0 && power_factor <= 1.0 {
        Ok(())
    } else {
        Err(GridSecError::Config(format!(
            "power factor must be in (0, 1], got {power_factor}"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct DefaultLimitViolationDetector {
    limit_reduction: f32,
    current_limit_types: BTreeSet<LoadingLimitType>,
    /// When set, terminals without a measured current fall back to
    /// [`dc_current`] from their active power
    dc_power_factor: Option<f64>,
}

impl Default for DefaultLimitViolationDetector {
    fn default() -> Self {
        Self {
            limit_reduction: 1.0,
            current_limit_types: [LoadingLimitType::Patl, LoadingLimitType::Tatl]
                .into_iter()
                .collect(),
            dc_power_factor: None,
        }
    }
}

impl DefaultLimitViolationDetector {
    pub fn new(
        limit_reduction: f32,
        current_limit_types: impl IntoIterator<Item = LoadingLimitType>,
    ) -> GridSecResult<Self> {
        if !(limit_reduction.is_finite() && limit_reduction > 0.0) {
            return Err(GridSecError::Config(format!(
                "limit reduction must be > 0, got {limit_reduction}"
            )));
        }
        Ok(Self {
            limit_reduction,
            current_limit_types: current_limit_types.into_iter().collect(),
            dc_power_factor: None,
        })
    }

    pub fn with_dc_power_factor(mut self, power_factor: f64) -> GridSecResult<Self> {
        validate_power_factor(power_factor)?;
        self.dc_power_factor = Some(power_factor);
        Ok(self)
    }

    pub fn limit_reduction(&self) -> f32 {
        self.limit_reduction
    }

    pub fn current_limit_types(&self) -> impl Iterator<Item = LoadingLimitType> + '_ {
        self.current_limit_types.iter().copied()
    }

    fn checks(&self, limit_type: LoadingLimitType) -> bool {
        self.current_limit_types.contains(&limit_type)
    }

    /// Compare a measured current (A) against one terminal's limits.
    ///
    /// The most restrictive exceeded temporary limit wins over the permanent
    /// one; a temporary violation reports that limit's name, duration and value.
    pub fn check_current(
        &self,
        subject_id: &str,
        subject_name: Option<&str>,
        side: ThreeSides,
        limits: &CurrentLimits,
        current: f64,
    ) -> Option<LimitViolation> {
        if current.is_nan() {
            return None;
        }
        let reduction = f64::from(self.limit_reduction);
        let violation = |limit: f64| {
            LimitViolation::builder(subject_id, LimitViolationType::Current)
                .subject_name(subject_name)
                .limit(limit)
                .limit_reduction(self.limit_reduction)
                .value(current)
                .side(side)
        };

        if self.checks(LoadingLimitType::Tatl) {
            let exceeded = limits
                .temporary_limits
                .iter()
                .filter(|t| t.value.is_finite() && current >= reduction * t.value.value())
                .min_by_key(|t| t.acceptable_duration);
            if let Some(temporary) = exceeded {
                return Some(
                    violation(temporary.value.value())
                        .limit_name(temporary.name.clone())
                        .acceptable_duration(temporary.acceptable_duration)
                        .finish(),
                );
            }
        }

        if self.checks(LoadingLimitType::Patl)
            && current >= reduction * limits.permanent_limit.value()
        {
            return Some(
                violation(limits.permanent_limit.value())
                    .acceptable_duration(PERMANENT_LIMIT_DURATION)
                    .finish(),
            );
        }
        None
    }

    /// Compare a bus voltage (kV) against its voltage level's bounds.
    ///
    /// Voltage bounds are exclusive: a voltage equal to a limit is not a
    /// violation, unlike angle bounds in [`Self::check_voltage_angle`].
    pub fn check_voltage(&self, voltage_level: &VoltageLevel, v: f64) -> Option<LimitViolation> {
        if v.is_nan() {
            return None;
        }
        let violation = |limit_type, limit: f64| {
            LimitViolation::builder(voltage_level.id.as_str(), limit_type)
                .subject_name(voltage_level.name.as_deref())
                .limit(limit)
                .value(v)
                .finish()
        };
        if let Some(low) = voltage_level.low_voltage_limit {
            if v < low.value() {
                return Some(violation(LimitViolationType::LowVoltage, low.value()));
            }
        }
        if let Some(high) = voltage_level.high_voltage_limit {
            if v > high.value() {
                return Some(violation(LimitViolationType::HighVoltage, high.value()));
            }
        }
        None
    }

    /// Compare `angle(other) - angle(reference)` (degrees) against its bounds.
    pub fn check_voltage_angle(
        &self,
        limit: &VoltageAngleLimit,
        difference: f64,
    ) -> Option<LimitViolation> {
        if difference.is_nan() {
            return None;
        }
        let violation = |limit_type, bound: f64| {
            LimitViolation::builder(limit.id.as_str(), limit_type)
                .limit(bound)
                .value(difference)
                .finish()
        };
        if let Some(low) = limit.low_limit {
            if difference <= low.value() {
                return Some(violation(LimitViolationType::LowVoltageAngle, low.value()));
            }
        }
        if let Some(high) = limit.high_limit {
            if difference >= high.value() {
                return Some(violation(LimitViolationType::HighVoltageAngle, high.value()));
            }
        }
        None
    }

    fn terminal_current(&self, terminal: &TerminalState, nominal_kv: Option<f64>) -> f64 {
        if !terminal.connected {
            return f64::NAN;
        }
        match (terminal.i.is_nan(), self.dc_power_factor, nominal_kv) {
            (true, Some(pf), Some(kv)) if terminal.p.is_finite() => {
                dc_current_unchecked(terminal.p, kv, pf)
            }
            _ => terminal.i,
        }
    }

    fn check_currents(&self, view: &NetworkView<'_>, consumer: &mut dyn FnMut(LimitViolation)) {
        let network = view.network();
        for (edge, branch) in network.branches() {
            let (Some(state), Some((bus1, bus2))) =
                (view.branch_state(edge), network.edge_buses(edge))
            else {
                continue;
            };
            for side in TwoSides::ALL {
                let Some(limits) = branch.current_limits(side) else {
                    continue;
                };
                let bus = match side {
                    TwoSides::One => bus1,
                    TwoSides::Two => bus2,
                };
                let nominal = view.bus_voltage_level(bus).map(|vl| vl.nominal_v.value());
                let current = self.terminal_current(state.terminal(side), nominal);
                if let Some(v) = self.check_current(
                    &branch.id,
                    branch.name.as_deref(),
                    side.into(),
                    limits,
                    current,
                ) {
                    consumer(v);
                }
            }
        }

        for (i, transformer) in network.three_windings_transformers().iter().enumerate() {
            let Some(state) = view.three_windings_state(i) else {
                continue;
            };
            for side in ThreeSides::ALL {
                let leg = transformer.leg(side);
                let Some(limits) = &leg.current_limits else {
                    continue;
                };
                let nominal = network
                    .bus(&leg.bus)
                    .and_then(|bus| network.voltage_level(&bus.voltage_level_id))
                    .map(|vl| vl.nominal_v.value());
                let current = self.terminal_current(state.leg(side), nominal);
                if let Some(v) = self.check_current(
                    &transformer.id,
                    transformer.name.as_deref(),
                    side,
                    limits,
                    current,
                ) {
                    consumer(v);
                }
            }
        }
    }

    fn check_voltages(&self, view: &NetworkView<'_>, consumer: &mut dyn FnMut(LimitViolation)) {
        for (bus, _) in view.network().buses() {
            let (Some(state), Some(voltage_level)) =
                (view.bus_state(bus), view.bus_voltage_level(bus))
            else {
                continue;
            };
            if !state.is_solved() {
                continue;
            }
            if let Some(v) = self.check_voltage(voltage_level, state.v) {
                consumer(v);
            }
        }
    }

    fn check_voltage_angles(
        &self,
        view: &NetworkView<'_>,
        consumer: &mut dyn FnMut(LimitViolation),
    ) {
        let network = view.network();
        if network.voltage_angle_limits().is_empty() {
            return;
        }
        let components = view.components();
        for limit in network.voltage_angle_limits() {
            let (Some(reference), Some(other)) = (
                network.bus_index(&limit.reference_bus),
                network.bus_index(&limit.other_bus),
            ) else {
                continue;
            };
            let (Some(reference_state), Some(other_state)) =
                (view.bus_state(reference), view.bus_state(other))
            else {
                continue;
            };
            if !(reference_state.is_solved() && other_state.is_solved()) {
                continue;
            }
            if !components.same_component(reference, other) {
                continue;
            }
            let difference = other_state.angle - reference_state.angle;
            if let Some(v) = self.check_voltage_angle(limit, difference) {
                consumer(v);
            }
        }
    }
}

impl LimitViolationDetector for DefaultLimitViolationDetector {
    fn check_all(&self, view: &NetworkView<'_>, consumer: &mut dyn FnMut(LimitViolation)) {
        self.check_currents(view, consumer);
        self.check_voltages(view, consumer);
        self.check_voltage_angles(view, consumer);
    }
}
