use crate::domain::{ModelError, ModelResult};
use crate::lattice::SynchronizationMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STABILITY_TOLERANCE: f64 = 1.0e-9;
/// Shortest accepted `maxStepLength` (m).
pub const MIN_STEP_LENGTH: f64 = 1.0e-6;
pub const MAX_SLICES_PER_ELEMENT: usize = 1_000_000;

/// Run-time options for a scenario, loaded from camelCase JSON.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioConfig {
    pub sync_mode: SynchronizationMode,
    /// Thick elements are split so no step exceeds this length (m); `None` keeps them whole.
    pub max_step_length: Option<f64>,
    /// Record a trajectory state after every slice instead of once per element.
    pub record_slices: bool,
    /// Half-width of the marginal band around `|Tr| = 2`.
    pub stability_tolerance: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            sync_mode: SynchronizationMode::Design,
            max_step_length: None,
            record_slices: false,
            stability_tolerance: DEFAULT_STABILITY_TOLERANCE,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if let Some(step) = self.max_step_length {
            if !(step.is_finite() && step >= MIN_STEP_LENGTH) {
                return Err(ModelError::construction(
                    "CONFIG.MAX_STEP_LENGTH",
                    format!("maxStepLength must be at least {MIN_STEP_LENGTH:e} m, got {step}"),
                ));
            }
        }
        if !(self.stability_tolerance.is_finite() && self.stability_tolerance >= 0.0) {
            return Err(ModelError::construction(
                "CONFIG.STABILITY_TOLERANCE",
                format!(
                    "stabilityTolerance must be non-negative, got {}",
                    self.stability_tolerance
                ),
            ));
        }
        Ok(())
    }

    /// Number of equal slices for an element of `length` metres.
    pub fn slice_count(&self, length: f64) -> ModelResult<usize> {
        let step = match self.max_step_length {
            Some(step) if length > step => step,
            _ => return Ok(1),
        };
        let count = (length / step).ceil();
        if !count.is_finite() || count > MAX_SLICES_PER_ELEMENT as f64 {
            return Err(ModelError::construction(
                "CONFIG.MAX_STEP_LENGTH",
                format!(
                    "{length} m at maxStepLength {step} m needs {count} slices, limit is {MAX_SLICES_PER_ELEMENT}"
                ),
            ));
        }
        Ok(count as usize)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read scenario config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse scenario config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid scenario config '{}': {source}", path.display())]
    Invalid { path: PathBuf, source: ModelError },
}

impl From<ConfigError> for ModelError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Invalid { source, .. } => source,
            other => ModelError::construction("CONFIG.LOAD", other.to_string()),
        }
    }
}

pub fn load_scenario_config(config_path: impl AsRef<Path>) -> Result<ScenarioConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    let config: ScenarioConfig =
        serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
    config.validate().map_err(|source| ConfigError::Invalid {
        path: config_path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MAX_SLICES_PER_ELEMENT, ScenarioConfig, load_scenario_config};
    use crate::lattice::SynchronizationMode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: ScenarioConfig =
            serde_json::from_str(r#"{ "syncMode": "rfDesign" }"#).expect("config json");
        assert_eq!(config.sync_mode, SynchronizationMode::RfDesign);
        assert_eq!(config.max_step_length, None);
        assert_eq!(config.stability_tolerance, 1.0e-9);
        assert_eq!(config.slice_count(5.0), Ok(1));
    }

    #[test]
    fn slice_count_rounds_up() {
        let config = ScenarioConfig {
            max_step_length: Some(0.1),
            ..ScenarioConfig::default()
        };
        assert_eq!(config.slice_count(0.35), Ok(4));
        assert_eq!(config.slice_count(0.05), Ok(1));
        assert_eq!(config.slice_count(0.0), Ok(1));
    }

    #[test]
    fn tiny_step_lengths_are_rejected_before_slicing() {
        let config = ScenarioConfig {
            max_step_length: Some(1.0e-15),
            ..ScenarioConfig::default()
        };
        let error = config.validate().expect_err("step below floor");
        assert_eq!(error.placeholder(), "CONFIG.MAX_STEP_LENGTH");

        let floor = ScenarioConfig {
            max_step_length: Some(1.0e-6),
            ..ScenarioConfig::default()
        };
        floor.validate().expect("floor is accepted");
        assert_eq!(floor.slice_count(0.5), Ok(500_000));
        let error = floor.slice_count(10.0).expect_err("too many slices");
        assert_eq!(error.placeholder(), "CONFIG.MAX_STEP_LENGTH");
        assert!(error.message().contains(&MAX_SLICES_PER_ELEMENT.to_string()));
    }

    #[test]
    fn load_scenario_config_reports_each_failure_stage() {
        let temp = TempDir::new().expect("tempdir");
        let missing = temp.path().join("missing.json");
        assert!(matches!(
            load_scenario_config(&missing),
            Err(ConfigError::Read { .. })
        ));

        let malformed = temp.path().join("malformed.json");
        fs::write(&malformed, "{ not json").expect("write");
        assert!(matches!(
            load_scenario_config(&malformed),
            Err(ConfigError::Parse { .. })
        ));

        for body in [r#"{ "maxStepLength": -1.0 }"#, r#"{ "maxStepLength": 1e-15 }"#] {
            let invalid = temp.path().join("invalid.json");
            fs::write(&invalid, body).expect("write");
            let error = load_scenario_config(&invalid).expect_err("invalid");
            assert!(matches!(error, ConfigError::Invalid { .. }));
            assert!(error.to_string().contains("maxStepLength"));
        }

        let valid = temp.path().join("valid.json");
        fs::write(
            &valid,
            r#"{ "syncMode": "live", "maxStepLength": 0.05, "recordSlices": true }"#,
        )
        .expect("write");
        let config = load_scenario_config(&valid).expect("valid config");
        assert!(config.record_slices);
        assert_eq!(config.sync_mode, SynchronizationMode::Live);
    }
}
