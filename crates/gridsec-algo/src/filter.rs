//! Violation filtering by type, base voltage and country.

use gridsec_core::{Country, GridSecError, GridSecResult, Network};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::violation::{LimitViolation, LimitViolationType};

/// Keeps the violations that pass every active dimension.
///
/// `None` sets accept everything; a base voltage of `0.0` accepts every
/// voltage level. Subjects whose voltage level cannot be resolved pass only
/// when neither the base-voltage nor the country dimension is active.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitViolationFilter {
    violation_types: Option<HashSet<LimitViolationType>>,
    min_base_voltage: f64,
    countries: Option<BTreeSet<Country>>,
}

impl Default for LimitViolationFilter {
    fn default() -> Self {
        Self {
            violation_types: None,
            min_base_voltage: 0.0,
            countries: None,
        }
    }
}

impl LimitViolationFilter {
    pub fn new(
        violation_types: Option<HashSet<LimitViolationType>>,
        min_base_voltage: f64,
        countries: Option<BTreeSet<Country>>,
    ) -> GridSecResult<Self> {
        if violation_types.as_ref().is_some_and(HashSet::is_empty) {
            return Err(GridSecError::Config(
                "violation type filter cannot be an empty set".into(),
            ));
        }
        if countries.as_ref().is_some_and(BTreeSet::is_empty) {
            return Err(GridSecError::Config(
                "country filter cannot be an empty set".into(),
            ));
        }
        if min_base_voltage.is_nan() || min_base_voltage < 0.0 {
            return Err(GridSecError::Config(format!(
                "minimum base voltage must be >= 0, got {min_base_voltage}"
            )));
        }
        Ok(Self {
            violation_types,
            min_base_voltage,
            countries,
        })
    }

    pub fn violation_types(&self) -> Option<&HashSet<LimitViolationType>> {
        self.violation_types.as_ref()
    }

    pub fn min_base_voltage(&self) -> f64 {
        self.min_base_voltage
    }

    pub fn countries(&self) -> Option<&BTreeSet<Country>> {
        self.countries.as_ref()
    }

    fn needs_location(&self) -> bool {
        self.min_base_voltage > 0.0 || self.countries.is_some()
    }

    pub fn accepts(&self, violation: &LimitViolation, network: &Network) -> bool {
        if let Some(types) = &self.violation_types {
            if !types.contains(&violation.limit_type()) {
                return false;
            }
        }
        if !self.needs_location() {
            return true;
        }

        let Some(voltage_level) = network
            .locatable(violation.subject_id())
            .and_then(|l| l.voltage_level(network, violation.side()))
        else {
            return false;
        };
        if voltage_level.nominal_v.value() < self.min_base_voltage {
            return false;
        }
        match &self.countries {
            Some(countries) => network
                .country(voltage_level)
                .is_some_and(|c| countries.contains(c)),
            None => true,
        }
    }

    /// Violations that pass the filter, in their original order.
    pub fn apply(&self, violations: &[LimitViolation], network: &Network) -> Vec<LimitViolation> {
        violations
            .iter()
            .filter(|v| self.accepts(v, network))
            .cloned()
            .collect()
    }
}

/// Serialized form of a filter, as found in the `[filter]` config section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub violation_types: Option<Vec<LimitViolationType>>,
    pub min_base_voltage: f64,
    pub countries: Option<Vec<String>>,
}

impl FilterConfig {
    pub fn to_filter(&self) -> GridSecResult<LimitViolationFilter> {
        LimitViolationFilter::new(
            self.violation_types
                .as_ref()
                .map(|types| types.iter().copied().collect()),
            self.min_base_voltage,
            self.countries
                .as_ref()
                .map(|codes| codes.iter().map(Country::new).collect()),
        )
    }
}
