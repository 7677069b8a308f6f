use super::element::{Element, ElementKind};
use super::sequence::Lattice;
use crate::domain::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Where element parameters come from when a scenario is resynchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SynchronizationMode {
    /// Design values only.
    #[default]
    Design,
    /// Live magnet settings, design RF settings.
    RfDesign,
    /// Live magnet and RF settings.
    Live,
}

impl SynchronizationMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Design => "design",
            Self::RfDesign => "rfDesign",
            Self::Live => "live",
        }
    }

    pub const fn uses_live_magnets(self) -> bool {
        matches!(self, Self::RfDesign | Self::Live)
    }

    pub const fn uses_live_rf(self) -> bool {
        matches!(self, Self::Live)
    }
}

impl Display for SynchronizationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiveParameter {
    Gradient,
    IntegratedStrength,
    KickX,
    KickY,
    RfAmplitude,
    RfPhase,
}

impl LiveParameter {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::IntegratedStrength => "integratedStrength",
            Self::KickX => "kickX",
            Self::KickY => "kickY",
            Self::RfAmplitude => "rfAmplitude",
            Self::RfPhase => "rfPhase",
        }
    }
}

impl Display for LiveParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("no live {parameter} value for element '{element}'")]
    Missing {
        element: String,
        parameter: LiveParameter,
    },
    #[error("live {parameter} value for element '{element}' is not finite: {value}")]
    NonFinite {
        element: String,
        parameter: LiveParameter,
        value: f64,
    },
    #[error("live parameter source unavailable: {0}")]
    Unavailable(String),
}

impl From<SyncError> for ModelError {
    fn from(error: SyncError) -> Self {
        let placeholder = match error {
            SyncError::Missing { .. } => "SYNC.MISSING_VALUE",
            SyncError::NonFinite { .. } => "SYNC.NON_FINITE",
            SyncError::Unavailable(_) => "SYNC.SOURCE",
        };
        ModelError::synchronization(placeholder, error.to_string())
    }
}

/// Supplier of live machine settings, injected into resynchronization.
pub trait ParameterSource {
    fn live_value(&self, element_id: &str, parameter: LiveParameter) -> Result<f64, SyncError>;
}

/// Recorded machine settings keyed by element id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotParameters {
    values: BTreeMap<String, BTreeMap<LiveParameter, f64>>,
}

impl SnapshotParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element_id: impl Into<String>, parameter: LiveParameter, value: f64) {
        self.values
            .entry(element_id.into())
            .or_default()
            .insert(parameter, value);
    }

    pub fn with(mut self, element_id: impl Into<String>, parameter: LiveParameter, value: f64) -> Self {
        self.insert(element_id, parameter, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ParameterSource for SnapshotParameters {
    fn live_value(&self, element_id: &str, parameter: LiveParameter) -> Result<f64, SyncError> {
        self.values
            .get(element_id)
            .and_then(|values| values.get(&parameter))
            .copied()
            .ok_or_else(|| SyncError::Missing {
                element: element_id.to_string(),
                parameter,
            })
    }
}

/// Resolves every element parameter for `mode`, returning a new lattice.
///
/// Implicit drifts, markers and bends always keep their design values.
pub fn resync(
    lattice: &Lattice,
    mode: SynchronizationMode,
    source: Option<&dyn ParameterSource>,
) -> ModelResult<Lattice> {
    if mode == SynchronizationMode::Design {
        return Ok(lattice.clone());
    }
    let Some(source) = source else {
        return Err(SyncError::Unavailable(format!(
            "mode {mode} requires a live parameter source"
        ))
        .into());
    };

    let mut elements = Vec::with_capacity(lattice.len());
    let mut updated = 0_usize;
    for element in lattice.elements() {
        let resolved = resolve_element(element, mode, source)?;
        if resolved != *element {
            updated += 1;
        }
        resolved.validate()?;
        elements.push(resolved);
    }

    debug!(
        lattice = lattice.id(),
        mode = %mode,
        updated,
        "lattice resynchronized"
    );
    Ok(lattice.with_elements(elements))
}

fn resolve_element(
    element: &Element,
    mode: SynchronizationMode,
    source: &dyn ParameterSource,
) -> ModelResult<Element> {
    let fetch = |parameter| fetch_finite(source, &element.id, parameter);
    let mut resolved = element.clone();
    match &mut resolved.kind {
        ElementKind::Quadrupole(params) if mode.uses_live_magnets() => {
            params.gradient = fetch(LiveParameter::Gradient)?;
        }
        ElementKind::ThinLens(params) if mode.uses_live_magnets() => {
            params.integrated_strength = fetch(LiveParameter::IntegratedStrength)?;
        }
        ElementKind::Corrector(params) if mode.uses_live_magnets() => {
            params.kick_x = fetch(LiveParameter::KickX)?;
            params.kick_y = fetch(LiveParameter::KickY)?;
        }
        ElementKind::RfGap(params) if mode.uses_live_rf() => {
            params.etl = fetch(LiveParameter::RfAmplitude)?;
            params.phase = fetch(LiveParameter::RfPhase)?;
        }
        ElementKind::Bend(_) if mode.uses_live_magnets() => {
            warn!(element = %element.id, mode = %mode, "bend keeps its design field");
        }
        _ => {}
    }
    Ok(resolved)
}

fn fetch_finite(
    source: &dyn ParameterSource,
    element_id: &str,
    parameter: LiveParameter,
) -> Result<f64, SyncError> {
    let value = source.live_value(element_id, parameter)?;
    if !value.is_finite() {
        return Err(SyncError::NonFinite {
            element: element_id.to_string(),
            parameter,
            value,
        });
    }
    trace!(element = element_id, %parameter, value, "live value");
    Ok(value)
}
