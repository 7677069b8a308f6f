use crate::common::constants::LENGTH_EPSILON;
use crate::domain::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrupoleParams {
    /// Field gradient in T/m; positive focuses positive charges horizontally.
    pub gradient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BendParams {
    /// Total bend angle in rad; the curvature is `angle / length`.
    pub angle: f64,
    #[serde(default)]
    pub field_index: f64,
    #[serde(default)]
    pub entry_angle: f64,
    #[serde(default)]
    pub exit_angle: f64,
    /// Full pole gap in m, used with `fringe_integral` for the vertical edge correction.
    #[serde(default)]
    pub gap: f64,
    #[serde(default)]
    pub fringe_integral: f64,
}

impl BendParams {
    pub fn curvature(&self, length: f64) -> f64 {
        self.angle / length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfGapParams {
    /// E0 T L product in V.
    pub etl: f64,
    /// RF phase relative to the bunch centre, rad.
    pub phase: f64,
    /// RF frequency in Hz.
    pub frequency: f64,
}

impl RfGapParams {
    pub fn validate(&self, id: &str) -> ModelResult<()> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(ModelError::construction(
                "LATTICE.RF_FREQUENCY",
                format!(
                    "RF gap '{id}' requires a positive frequency, got {}",
                    self.frequency
                ),
            ));
        }
        if !(self.etl.is_finite() && self.etl >= 0.0) {
            return Err(ModelError::construction(
                "LATTICE.RF_ETL",
                format!(
                    "RF gap '{id}' requires a non-negative ETL product, got {}",
                    self.etl
                ),
            ));
        }
        if !self.phase.is_finite() {
            return Err(ModelError::construction(
                "LATTICE.RF_PHASE",
                format!("RF gap '{id}' phase must be finite, got {}", self.phase),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinLensParams {
    /// Integrated focusing strength in 1/m; positive focuses horizontally.
    pub integrated_strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectorParams {
    #[serde(default)]
    pub kick_x: f64,
    #[serde(default)]
    pub kick_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ElementKind {
    Drift,
    Quadrupole(QuadrupoleParams),
    Bend(BendParams),
    RfGap(RfGapParams),
    ThinLens(ThinLensParams),
    Corrector(CorrectorParams),
    Marker,
}

impl ElementKind {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Drift => "drift",
            Self::Quadrupole(_) => "quadrupole",
            Self::Bend(_) => "bend",
            Self::RfGap(_) => "rfGap",
            Self::ThinLens(_) => "thinLens",
            Self::Corrector(_) => "corrector",
            Self::Marker => "marker",
        }
    }

    /// Thin kinds act at a single point and are never subdivided.
    pub const fn is_thin(&self) -> bool {
        matches!(
            self,
            Self::RfGap(_) | Self::ThinLens(_) | Self::Corrector(_) | Self::Marker
        )
    }
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Misalignment of an element relative to the design frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlignmentErrors {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl AlignmentErrors {
    pub fn has_rotation(&self) -> bool {
        self.pitch != 0.0 || self.yaw != 0.0 || self.roll != 0.0
    }

    pub fn has_displacement(&self) -> bool {
        self.dx != 0.0 || self.dy != 0.0 || self.dz != 0.0
    }

    pub fn is_zero(&self) -> bool {
        !self.has_rotation() && !self.has_displacement()
    }
}

/// Lattice element: `position` is the longitudinal centre in m.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub position: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub aperture: Option<f64>,
    #[serde(default)]
    pub alignment: AlignmentErrors,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    pub fn new(id: impl Into<String>, position: f64, length: f64, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            position,
            length,
            aperture: None,
            alignment: AlignmentErrors::default(),
            kind,
        }
    }

    pub fn drift(id: impl Into<String>, position: f64, length: f64) -> Self {
        Self::new(id, position, length, ElementKind::Drift)
    }

    pub fn quadrupole(id: impl Into<String>, position: f64, length: f64, gradient: f64) -> Self {
        Self::new(
            id,
            position,
            length,
            ElementKind::Quadrupole(QuadrupoleParams { gradient }),
        )
    }

    pub fn sector_bend(id: impl Into<String>, position: f64, length: f64, angle: f64) -> Self {
        Self::new(
            id,
            position,
            length,
            ElementKind::Bend(BendParams {
                angle,
                field_index: 0.0,
                entry_angle: 0.0,
                exit_angle: 0.0,
                gap: 0.0,
                fringe_integral: 0.0,
            }),
        )
    }

    pub fn rf_gap(id: impl Into<String>, position: f64, etl: f64, phase: f64, frequency: f64) -> Self {
        Self::new(
            id,
            position,
            0.0,
            ElementKind::RfGap(RfGapParams {
                etl,
                phase,
                frequency,
            }),
        )
    }

    pub fn thin_lens(id: impl Into<String>, position: f64, integrated_strength: f64) -> Self {
        Self::new(
            id,
            position,
            0.0,
            ElementKind::ThinLens(ThinLensParams {
                integrated_strength,
            }),
        )
    }

    pub fn corrector(id: impl Into<String>, position: f64, kick_x: f64, kick_y: f64) -> Self {
        Self::new(
            id,
            position,
            0.0,
            ElementKind::Corrector(CorrectorParams { kick_x, kick_y }),
        )
    }

    pub fn marker(id: impl Into<String>, position: f64) -> Self {
        Self::new(id, position, 0.0, ElementKind::Marker)
    }

    pub fn with_aperture(mut self, aperture: f64) -> Self {
        self.aperture = Some(aperture);
        self
    }

    pub fn with_alignment(mut self, alignment: AlignmentErrors) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn entrance(&self) -> f64 {
        self.position - self.length / 2.0
    }

    pub fn exit(&self) -> f64 {
        self.position + self.length / 2.0
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.id.trim().is_empty() {
            return Err(ModelError::construction(
                "LATTICE.ELEMENT_ID",
                format!("{} element at {} has an empty id", self.kind, self.position),
            ));
        }
        if !self.position.is_finite() {
            return Err(ModelError::construction(
                "LATTICE.POSITION",
                format!("element '{}' has non-finite position", self.id),
            ));
        }
        if !(self.length.is_finite() && self.length >= 0.0) {
            return Err(ModelError::construction(
                "LATTICE.LENGTH",
                format!(
                    "element '{}' requires a finite non-negative length, got {}",
                    self.id, self.length
                ),
            ));
        }
        if let Some(aperture) = self.aperture {
            if !(aperture.is_finite() && aperture > 0.0) {
                return Err(ModelError::construction(
                    "LATTICE.APERTURE",
                    format!(
                        "element '{}' aperture must be positive, got {aperture}",
                        self.id
                    ),
                ));
            }
        }

        if self.kind.is_thin() {
            if self.length > LENGTH_EPSILON {
                return Err(ModelError::construction(
                    "LATTICE.THIN_LENGTH",
                    format!(
                        "thin {} '{}' must have zero length, got {}",
                        self.kind, self.id, self.length
                    ),
                ));
            }
        } else if matches!(self.kind, ElementKind::Quadrupole(_) | ElementKind::Bend(_))
            && self.length <= LENGTH_EPSILON
        {
            return Err(ModelError::construction(
                "LATTICE.THICK_LENGTH",
                format!(
                    "{} '{}' requires a positive length",
                    self.kind, self.id
                ),
            ));
        }

        match &self.kind {
            ElementKind::Quadrupole(params) if !params.gradient.is_finite() => {
                Err(ModelError::construction(
                    "LATTICE.QUAD_GRADIENT",
                    format!("quadrupole '{}' gradient must be finite", self.id),
                ))
            }
            ElementKind::Bend(params)
                if !(params.angle.is_finite()
                    && params.field_index.is_finite()
                    && params.entry_angle.is_finite()
                    && params.exit_angle.is_finite()) =>
            {
                Err(ModelError::construction(
                    "LATTICE.BEND_PARAMETERS",
                    format!("bend '{}' has non-finite parameters", self.id),
                ))
            }
            ElementKind::RfGap(params) => params.validate(&self.id),
            _ => Ok(()),
        }
    }
}
