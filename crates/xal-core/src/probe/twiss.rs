use crate::domain::{ModelError, ModelResult, Plane};
use crate::phase::{PlaneBlock, block_determinant, block_multiply};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Courant-Snyder ellipse for one plane. Emittance is the unnormalised rms value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twiss {
    pub beta: f64,
    pub alpha: f64,
    pub emittance: f64,
}

impl Twiss {
    pub const fn new(beta: f64, alpha: f64, emittance: f64) -> Self {
        Self {
            beta,
            alpha,
            emittance,
        }
    }

    pub fn gamma(&self) -> f64 {
        (1.0 + self.alpha * self.alpha) / self.beta
    }

    /// `beta * gamma - alpha^2 - 1`; zero for a valid ellipse.
    pub fn invariant_residual(&self) -> f64 {
        self.beta * self.gamma() - self.alpha * self.alpha - 1.0
    }

    pub fn validate(&self) -> ModelResult<()> {
        if !(self.beta.is_finite() && self.beta > 0.0) {
            return Err(ModelError::construction(
                "TWISS.BETA",
                format!("beta must be positive, got {}", self.beta),
            ));
        }
        if !self.alpha.is_finite() {
            return Err(ModelError::construction(
                "TWISS.ALPHA",
                format!("alpha must be finite, got {}", self.alpha),
            ));
        }
        if !(self.emittance.is_finite() && self.emittance >= 0.0) {
            return Err(ModelError::construction(
                "TWISS.EMITTANCE",
                format!("emittance must be non-negative, got {}", self.emittance),
            ));
        }
        Ok(())
    }

    /// Second-moment block `eps * [[beta, -alpha], [-alpha, gamma]]`.
    pub fn covariance_block(&self) -> PlaneBlock {
        let emittance = self.emittance;
        [
            [emittance * self.beta, -emittance * self.alpha],
            [-emittance * self.alpha, emittance * self.gamma()],
        ]
    }

    /// Recovers the ellipse from a centered second-moment block.
    pub fn from_covariance_block(block: &PlaneBlock) -> Option<Self> {
        let determinant = block_determinant(block);
        if !(determinant.is_finite() && determinant > 0.0) {
            return None;
        }
        let emittance = determinant.sqrt();
        Some(Self::new(
            block[0][0] / emittance,
            -block[0][1] / emittance,
            emittance,
        ))
    }

    /// Propagates the ellipse shape through `m` via `sigma' = M sigma M^T`.
    ///
    /// The emittance follows `det(M)`, so non-unimodular blocks (RF gaps)
    /// damp it.
    pub fn transform(&self, block: &PlaneBlock) -> Self {
        let shape = Self::new(self.beta, self.alpha, 1.0).covariance_block();
        let transposed = [[block[0][0], block[1][0]], [block[0][1], block[1][1]]];
        let propagated = block_multiply(&block_multiply(block, &shape), &transposed);
        let determinant = block_determinant(block).abs();
        Self::new(
            propagated[0][0] / determinant,
            -propagated[0][1] / determinant,
            self.emittance * determinant,
        )
    }

    /// Betatron phase advanced through `block` starting from this ellipse.
    pub fn phase_advance_through(&self, block: &PlaneBlock) -> f64 {
        block[0][1].atan2(self.beta * block[0][0] - self.alpha * block[0][1])
    }

    pub fn envelope_radius(&self) -> f64 {
        (self.beta * self.emittance).sqrt()
    }
}

/// Twiss ellipses for all three planes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwissSet {
    pub x: Twiss,
    pub y: Twiss,
    pub z: Twiss,
}

impl TwissSet {
    pub const fn new(x: Twiss, y: Twiss, z: Twiss) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, plane: Plane) -> &Twiss {
        match plane {
            Plane::X => &self.x,
            Plane::Y => &self.y,
            Plane::Z => &self.z,
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        self.x.validate()?;
        self.y.validate()?;
        self.z.validate()
    }
}

impl Index<Plane> for TwissSet {
    type Output = Twiss;

    fn index(&self, plane: Plane) -> &Self::Output {
        self.get(plane)
    }
}
