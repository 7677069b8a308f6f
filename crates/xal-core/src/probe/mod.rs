pub mod covariance;
pub mod kinematics;
pub mod twiss;

pub use covariance::CovarianceMatrix;
pub use kinematics::{Kinematics, ParticleSpecies};
pub use twiss::{Twiss, TwissSet};

use crate::domain::ModelResult;
use crate::phase::{PhaseMatrix, PhaseVector};
use serde::{Deserialize, Serialize};

/// What the probe carries besides the cumulative transfer map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum ProbeResponse {
    TransferMap,
    Particle { coordinates: PhaseVector },
    Envelope { covariance: CovarianceMatrix },
}

impl ProbeResponse {
    pub const fn mode_name(&self) -> &'static str {
        match self {
            Self::TransferMap => "transfer-map",
            Self::Particle { .. } => "particle",
            Self::Envelope { .. } => "envelope",
        }
    }

    fn propagate(&self, map: &PhaseMatrix) -> Self {
        match self {
            Self::TransferMap => Self::TransferMap,
            Self::Particle { coordinates } => Self::Particle {
                coordinates: map.apply_to(coordinates),
            },
            Self::Envelope { covariance } => Self::Envelope {
                covariance: covariance.propagate(map),
            },
        }
    }
}

/// Initial condition handed to a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    kinematics: Kinematics,
    response: ProbeResponse,
}

impl Probe {
    pub fn transfer_map(kinematics: Kinematics) -> Self {
        Self {
            kinematics,
            response: ProbeResponse::TransferMap,
        }
    }

    pub fn particle(kinematics: Kinematics, coordinates: PhaseVector) -> Self {
        Self {
            kinematics,
            response: ProbeResponse::Particle { coordinates },
        }
    }

    pub fn envelope(
        kinematics: Kinematics,
        twiss: &TwissSet,
        centroid: PhaseVector,
    ) -> ModelResult<Self> {
        twiss.validate()?;
        Ok(Self {
            kinematics,
            response: ProbeResponse::Envelope {
                covariance: CovarianceMatrix::from_twiss(twiss, centroid),
            },
        })
    }

    pub const fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    pub const fn response(&self) -> &ProbeResponse {
        &self.response
    }

    /// Advances the response through `map` and adopts the exit kinematics.
    pub fn advance(&self, map: &PhaseMatrix, exit_kinematics: Kinematics) -> Self {
        Self {
            kinematics: exit_kinematics,
            response: self.response.propagate(map),
        }
    }
}
