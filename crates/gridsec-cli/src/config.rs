//! `gridsec.toml` handling.
//!
//! Every section and key is optional; command-line flags override what the
//! file says.

use anyhow::{anyhow, Context, Result};
use gridsec_algo::analysis::DEFAULT_MAX_VARIANTS;
use gridsec_algo::{
    DefaultLimitViolationDetector, FilterConfig, LimitViolationFilter, LoadFlowParameters,
    LoadingLimitType, SecurityAnalysisParameters, VoltageInitMode,
};
use gridsec_core::SolverKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "gridsec.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSecConfig {
    pub analysis: AnalysisConfig,
    pub load_flow: LoadFlowConfig,
    pub filter: FilterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub limit_reduction: f32,
    pub current_limit_types: Vec<LoadingLimitType>,
    pub threads: Threads,
    pub max_variants_per_analysis: usize,
    pub isolate_contingency_failures: bool,
    /// Power factor used to estimate missing currents from active power
    pub dc_power_factor: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            limit_reduction: 1.0,
            current_limit_types: vec![LoadingLimitType::Patl, LoadingLimitType::Tatl],
            threads: Threads::Auto,
            max_variants_per_analysis: DEFAULT_MAX_VARIANTS,
            isolate_contingency_failures: true,
            dc_power_factor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadFlowConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub base_mva: f64,
    pub solver: SolverKind,
    pub voltage_init_mode: VoltageInitMode,
}

impl Default for LoadFlowConfig {
    fn default() -> Self {
        let defaults = LoadFlowParameters::default();
        Self {
            tolerance: defaults.tolerance,
            max_iterations: defaults.max_iterations,
            base_mva: defaults.base_mva,
            solver: defaults.linear_solver,
            voltage_init_mode: defaults.voltage_init_mode,
        }
    }
}

impl LoadFlowConfig {
    pub fn to_parameters(&self) -> LoadFlowParameters {
        LoadFlowParameters {
            voltage_init_mode: self.voltage_init_mode,
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            base_mva: self.base_mva,
            linear_solver: self.solver,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Worker thread setting: `"auto"` or a positive count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threads {
    #[default]
    Auto,
    Fixed(usize),
}

impl Threads {
    pub fn count(self) -> Option<usize> {
        match self {
            Threads::Auto => None,
            Threads::Fixed(count) => Some(count),
        }
    }
}

impl FromStr for Threads {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("auto") {
            return Ok(Threads::Auto);
        }
        match input.parse::<usize>() {
            Ok(count) if count > 0 => Ok(Threads::Fixed(count)),
            _ => Err(format!(
                "invalid thread count '{input}', expected \"auto\" or a positive integer"
            )),
        }
    }
}

impl fmt::Display for Threads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threads::Auto => f.write_str("auto"),
            Threads::Fixed(count) => write!(f, "{count}"),
        }
    }
}

impl Serialize for Threads {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Threads::Auto => serializer.serialize_str("auto"),
            Threads::Fixed(count) => serializer.serialize_u64(*count as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Threads {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(usize),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Count(count) => Threads::from_str(&count.to_string()),
            Raw::Text(text) => Threads::from_str(&text),
        }
        .map_err(serde::de::Error::custom)
    }
}

impl GridSecConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: GridSecConfig = toml::from_str(text).context("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, mid-run.
    pub fn validate(&self) -> Result<()> {
        self.filter
            .to_filter()
            .context("invalid [filter] section")?;
        self.detector(None).context("invalid [analysis] section")?;
        self.analysis_parameters(None)
            .validate()
            .context("invalid [analysis] or [load_flow] section")?;
        Ok(())
    }

    pub fn analysis_parameters(&self, threads: Option<Threads>) -> SecurityAnalysisParameters {
        SecurityAnalysisParameters::default()
            .with_load_flow(self.load_flow.to_parameters())
            .with_isolate_contingency_failures(self.analysis.isolate_contingency_failures)
            .with_threads(threads.unwrap_or(self.analysis.threads).count())
            .with_max_variants(self.analysis.max_variants_per_analysis)
    }

    pub fn detector(&self, limit_reduction: Option<f32>) -> Result<DefaultLimitViolationDetector> {
        let detector = DefaultLimitViolationDetector::new(
            limit_reduction.unwrap_or(self.analysis.limit_reduction),
            self.analysis.current_limit_types.iter().copied(),
        )?;
        match self.analysis.dc_power_factor {
            Some(power_factor) => Ok(detector.with_dc_power_factor(power_factor)?),
            None => Ok(detector),
        }
    }

    /// The configured filter, with its violation types replaced by
    /// `limit_types` when that is not empty.
    pub fn filter(&self, limit_types: &[gridsec_algo::LimitViolationType]) -> Result<LimitViolationFilter> {
        let mut config = self.filter.clone();
        if !limit_types.is_empty() {
            config.violation_types = Some(limit_types.to_vec());
        }
        Ok(config.to_filter()?)
    }
}

/// Read `path`, or `./gridsec.toml` when no path is given and that file
/// exists, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<GridSecConfig> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(GridSecConfig::default());
            }
            default
        }
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file '{}'", path.display()))?;
    GridSecConfig::from_toml(&text)
        .map_err(|err| anyhow!("{}: {err:#}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsec_algo::LimitViolationType;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = GridSecConfig::from_toml("").unwrap();
        assert_eq!(config, GridSecConfig::default());
        let params = config.analysis_parameters(None);
        assert_eq!(params.threads, None);
        assert_eq!(params.max_variants, DEFAULT_MAX_VARIANTS);
        assert!(params.isolate_contingency_failures);
    }

    #[test]
    fn sections_are_read() {
        let config = GridSecConfig::from_toml(
            r#"
[analysis]
limit_reduction = 0.9
threads = 3
max_variants_per_analysis = 2
isolate_contingency_failures = false

[load_flow]
tolerance = 1e-8
solver = "faer"
voltage_init_mode = "previous_values"

[filter]
violation_types = ["CURRENT"]
min_base_voltage = 225.0
countries = ["FR"]

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.analysis.threads, Threads::Fixed(3));
        assert_eq!(config.detector(None).unwrap().limit_reduction(), 0.9);
        assert_eq!(config.detector(Some(0.5)).unwrap().limit_reduction(), 0.5);
        let params = config.analysis_parameters(Some(Threads::Auto));
        assert_eq!(params.threads, None);
        assert_eq!(params.max_variants, 2);
        assert!(!params.isolate_contingency_failures);
        assert_eq!(params.load_flow.linear_solver, SolverKind::Faer);
        assert_eq!(params.load_flow.voltage_init_mode, VoltageInitMode::PreviousValues);
        assert_eq!(config.logging.level, "debug");

        let filter = config.filter(&[]).unwrap();
        assert_eq!(filter.min_base_voltage(), 225.0);
        let overridden = config.filter(&[LimitViolationType::LowVoltage]).unwrap();
        assert!(overridden
            .violation_types()
            .unwrap()
            .contains(&LimitViolationType::LowVoltage));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "[filter]\nviolation_types = []",
            "[filter]\nmin_base_voltage = -1.0",
            "[analysis]\nlimit_reduction = 0.0",
            "[analysis]\nthreads = 0",
            "[analysis]\nthreads = \"many\"",
            "[analysis]\nmax_variants_per_analysis = 0",
            "[load_flow]\nsolver = \"lu\"",
        ] {
            assert!(GridSecConfig::from_toml(text).is_err(), "{text}");
        }
    }

    #[test]
    fn threads_parse_from_text() {
        assert_eq!("auto".parse::<Threads>().unwrap(), Threads::Auto);
        assert_eq!(" 8 ".parse::<Threads>().unwrap(), Threads::Fixed(8));
        assert!("0".parse::<Threads>().is_err());
        assert_eq!(Threads::Fixed(2).to_string(), "2");
    }

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert!(load_config(Some(Path::new("/nonexistent/gridsec.toml"))).is_err());
    }
}
