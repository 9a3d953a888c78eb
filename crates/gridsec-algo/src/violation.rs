//! Limit violation records.

use gridsec_core::{GridSecError, GridSecResult, ThreeSides};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Acceptable duration of a permanent limit violation.
pub const PERMANENT_LIMIT_DURATION: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitViolationType {
    Current,
    LowVoltage,
    HighVoltage,
    LowVoltageAngle,
    HighVoltageAngle,
    ActivePower,
    ApparentPower,
    LowShortCircuitCurrent,
    HighShortCircuitCurrent,
}

impl LimitViolationType {
    pub const ALL: [LimitViolationType; 9] = [
        LimitViolationType::Current,
        LimitViolationType::LowVoltage,
        LimitViolationType::HighVoltage,
        LimitViolationType::LowVoltageAngle,
        LimitViolationType::HighVoltageAngle,
        LimitViolationType::ActivePower,
        LimitViolationType::ApparentPower,
        LimitViolationType::LowShortCircuitCurrent,
        LimitViolationType::HighShortCircuitCurrent,
    ];

    /// Flow limits belong to one terminal of the element.
    pub fn requires_side(self) -> bool {
        matches!(
            self,
            LimitViolationType::Current
                | LimitViolationType::ActivePower
                | LimitViolationType::ApparentPower
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LimitViolationType::Current => "CURRENT",
            LimitViolationType::LowVoltage => "LOW_VOLTAGE",
            LimitViolationType::HighVoltage => "HIGH_VOLTAGE",
            LimitViolationType::LowVoltageAngle => "LOW_VOLTAGE_ANGLE",
            LimitViolationType::HighVoltageAngle => "HIGH_VOLTAGE_ANGLE",
            LimitViolationType::ActivePower => "ACTIVE_POWER",
            LimitViolationType::ApparentPower => "APPARENT_POWER",
            LimitViolationType::LowShortCircuitCurrent => "LOW_SHORT_CIRCUIT_CURRENT",
            LimitViolationType::HighShortCircuitCurrent => "HIGH_SHORT_CIRCUIT_CURRENT",
        }
    }
}

impl fmt::Display for LimitViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitViolationType {
    type Err = GridSecError;

    fn from_str(input: &str) -> GridSecResult<Self> {
        let normalized = input.trim().to_ascii_uppercase().replace('-', "_");
        LimitViolationType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                GridSecError::Parse(format!("unknown limit violation type '{input}'"))
            })
    }
}

/// A measured value beyond a limit of one network element.
///
/// Built through [`LimitViolation::builder`], which enforces the invariants:
/// flow violations carry a side, the subject id is not empty and the limit
/// reduction is a positive number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitViolation {
    subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject_name: Option<String>,
    limit_type: LimitViolationType,
    limit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit_name: Option<String>,
    acceptable_duration: u32,
    limit_reduction: f32,
    value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    side: Option<ThreeSides>,
}

impl LimitViolation {
    pub fn builder(subject_id: impl Into<String>, limit_type: LimitViolationType) -> LimitViolationBuilder {
        LimitViolationBuilder {
            violation: LimitViolation {
                subject_id: subject_id.into(),
                subject_name: None,
                limit_type,
                limit: f64::NAN,
                limit_name: None,
                acceptable_duration: PERMANENT_LIMIT_DURATION,
                limit_reduction: 1.0,
                value: f64::NAN,
                side: None,
            },
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn subject_name(&self) -> Option<&str> {
        self.subject_name.as_deref()
    }

    pub fn limit_type(&self) -> LimitViolationType {
        self.limit_type
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    pub fn limit_name(&self) -> Option<&str> {
        self.limit_name.as_deref()
    }

    pub fn acceptable_duration(&self) -> u32 {
        self.acceptable_duration
    }

    pub fn limit_reduction(&self) -> f32 {
        self.limit_reduction
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn side(&self) -> Option<ThreeSides> {
        self.side
    }

    pub fn is_permanent(&self) -> bool {
        self.acceptable_duration == PERMANENT_LIMIT_DURATION
    }

    /// Measured value as a percentage of the reduced limit.
    pub fn loading_rate(&self) -> f64 {
        let reduced = self.limit * f64::from(self.limit_reduction);
        if reduced == 0.0 {
            f64::NAN
        } else {
            self.value / reduced * 100.0
        }
    }

    pub fn key(&self) -> LimitViolationKey {
        LimitViolationKey {
            subject_id: self.subject_id.clone(),
            limit_type: self.limit_type,
            limit_name: self.limit_name.clone(),
            side: self.side,
        }
    }
}

pub struct LimitViolationBuilder {
    violation: LimitViolation,
}

impl LimitViolationBuilder {
    pub fn subject_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.violation.subject_name = name.map(Into::into);
        self
    }

    pub fn limit(mut self, limit: f64) -> Self {
        self.violation.limit = limit;
        self
    }

    pub fn limit_name(mut self, name: impl Into<String>) -> Self {
        self.violation.limit_name = Some(name.into());
        self
    }

    pub fn acceptable_duration(mut self, seconds: u32) -> Self {
        self.violation.acceptable_duration = seconds;
        self
    }

    pub fn limit_reduction(mut self, reduction: f32) -> Self {
        self.violation.limit_reduction = reduction;
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.violation.value = value;
        self
    }

    pub fn side(mut self, side: impl Into<ThreeSides>) -> Self {
        self.violation.side = Some(side.into());
        self
    }

    pub fn build(self) -> GridSecResult<LimitViolation> {
        let violation = self.violation;
        if violation.subject_id.trim().is_empty() {
            return Err(GridSecError::Config(
                "limit violation subject id cannot be empty".into(),
            ));
        }
        if violation.limit_type.requires_side() && violation.side.is_none() {
            return Err(GridSecError::Config(format!(
                "{} violation on '{}' requires a side",
                violation.limit_type, violation.subject_id
            )));
        }
        if !(violation.limit_reduction.is_finite() && violation.limit_reduction > 0.0) {
            return Err(GridSecError::Config(format!(
                "limit reduction must be positive, got {}",
                violation.limit_reduction
            )));
        }
        Ok(violation)
    }

    /// Skip validation. The detector always sets a side on flow violations and
    /// its reduction was checked when it was constructed.
    pub(crate) fn finish(self) -> LimitViolation {
        debug_assert!(
            !self.violation.limit_type.requires_side() || self.violation.side.is_some()
        );
        self.violation
    }
}

/// Identity of a violation regardless of its measured value.
///
/// Two violations with the same key describe the same limit being exceeded,
/// which is how post-contingency reports spot violations already present in
/// the base case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LimitViolationKey {
    pub subject_id: String,
    pub limit_type: LimitViolationType,
    pub limit_name: Option<String>,
    pub side: Option<ThreeSides>,
}
