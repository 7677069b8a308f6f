use crate::common::constants::{
    ELECTRON_REST_ENERGY, H_MINUS_REST_ENERGY, PROTON_REST_ENERGY, SPEED_OF_LIGHT,
};
use crate::domain::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ParticleSpecies {
    Proton,
    HMinus,
    Electron,
    Custom { rest_energy: f64, charge: f64 },
}

impl ParticleSpecies {
    pub fn rest_energy(self) -> f64 {
        match self {
            Self::Proton => PROTON_REST_ENERGY,
            Self::HMinus => H_MINUS_REST_ENERGY,
            Self::Electron => ELECTRON_REST_ENERGY,
            Self::Custom { rest_energy, .. } => rest_energy,
        }
    }

    /// Charge in units of the elementary charge.
    pub fn charge(self) -> f64 {
        match self {
            Self::Proton => 1.0,
            Self::HMinus | Self::Electron => -1.0,
            Self::Custom { charge, .. } => charge,
        }
    }
}

/// Design-particle kinematics. Energies in eV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "KinematicsRecord")]
pub struct Kinematics {
    rest_energy: f64,
    charge: f64,
    kinetic_energy: f64,
}

/// Unvalidated wire form of [`Kinematics`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KinematicsRecord {
    rest_energy: f64,
    charge: f64,
    kinetic_energy: f64,
}

impl TryFrom<KinematicsRecord> for Kinematics {
    type Error = ModelError;

    fn try_from(record: KinematicsRecord) -> ModelResult<Self> {
        Self::from_parts(record.rest_energy, record.charge, record.kinetic_energy)
    }
}

impl Kinematics {
    pub fn new(species: ParticleSpecies, kinetic_energy: f64) -> ModelResult<Self> {
        Self::from_parts(species.rest_energy(), species.charge(), kinetic_energy)
    }

    pub fn from_parts(rest_energy: f64, charge: f64, kinetic_energy: f64) -> ModelResult<Self> {
        if !(rest_energy.is_finite() && rest_energy > 0.0) {
            return Err(ModelError::construction(
                "PROBE.REST_ENERGY",
                format!("rest energy must be positive, got {rest_energy}"),
            ));
        }
        if !charge.is_finite() || charge == 0.0 {
            return Err(ModelError::construction(
                "PROBE.CHARGE",
                format!("probe charge must be non-zero, got {charge}"),
            ));
        }
        if !(kinetic_energy.is_finite() && kinetic_energy > 0.0) {
            return Err(ModelError::construction(
                "PROBE.KINETIC_ENERGY",
                format!("kinetic energy must be positive, got {kinetic_energy}"),
            ));
        }

        Ok(Self {
            rest_energy,
            charge,
            kinetic_energy,
        })
    }

    /// Builds the kinematics whose magnetic rigidity is `rigidity` (T m).
    pub fn from_rigidity(rest_energy: f64, charge: f64, rigidity: f64) -> ModelResult<Self> {
        let momentum = rigidity.abs() * SPEED_OF_LIGHT * charge.abs();
        let kinetic_energy = momentum.hypot(rest_energy) - rest_energy;
        Self::from_parts(rest_energy, charge, kinetic_energy)
    }

    pub const fn rest_energy(&self) -> f64 {
        self.rest_energy
    }

    pub const fn charge(&self) -> f64 {
        self.charge
    }

    pub const fn kinetic_energy(&self) -> f64 {
        self.kinetic_energy
    }

    pub fn gamma(&self) -> f64 {
        1.0 + self.kinetic_energy / self.rest_energy
    }

    pub fn beta_gamma(&self) -> f64 {
        let gamma = self.gamma();
        (gamma * gamma - 1.0).sqrt()
    }

    pub fn beta(&self) -> f64 {
        self.beta_gamma() / self.gamma()
    }

    /// Momentum in eV/c.
    pub fn momentum(&self) -> f64 {
        self.rest_energy * self.beta_gamma()
    }

    /// Magnetic rigidity B rho in T m.
    pub fn rigidity(&self) -> f64 {
        self.momentum() / (SPEED_OF_LIGHT * self.charge.abs())
    }

    /// RF wavelength in metres for a frequency in Hz.
    pub fn wavelength(frequency: f64) -> f64 {
        SPEED_OF_LIGHT / frequency
    }

    /// Copy with the kinetic energy shifted by `gain`; NaN propagates.
    pub fn accelerated(&self, gain: f64) -> Self {
        Self {
            kinetic_energy: self.kinetic_energy + gain,
            ..*self
        }
    }
}
