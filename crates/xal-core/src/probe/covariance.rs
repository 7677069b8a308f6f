use super::twiss::{Twiss, TwissSet};
use crate::domain::Plane;
use crate::phase::{HOMOGENEOUS_INDEX, PHASE_DIMENSION, PhaseMatrix, PhaseVector, PlaneBlock};
use serde::{Deserialize, Serialize};

/// Homogeneous second-moment matrix `<z z^T>`; the last column holds the centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    moments: PhaseMatrix,
}

impl CovarianceMatrix {
    /// Uncoupled beam with the given ellipses and centroid.
    pub fn from_twiss(twiss: &TwissSet, centroid: PhaseVector) -> Self {
        let mut moments = PhaseMatrix::zero();
        for plane in Plane::ALL {
            let offset = plane.offset();
            let block = twiss[plane].covariance_block();
            for row in 0..2 {
                for col in 0..2 {
                    moments[(offset + row, offset + col)] = block[row][col];
                }
            }
        }

        let mean = centroid.coordinates();
        for row in 0..PHASE_DIMENSION {
            for col in 0..PHASE_DIMENSION {
                moments[(row, col)] += mean[row] * mean[col];
            }
            moments[(row, HOMOGENEOUS_INDEX)] = mean[row];
            moments[(HOMOGENEOUS_INDEX, row)] = mean[row];
        }
        moments[(HOMOGENEOUS_INDEX, HOMOGENEOUS_INDEX)] = 1.0;

        Self { moments }
    }

    pub fn moments(&self) -> &PhaseMatrix {
        &self.moments
    }

    /// `M sigma M^T`.
    pub fn propagate(&self, map: &PhaseMatrix) -> Self {
        Self {
            moments: *map * self.moments * map.transpose(),
        }
    }

    pub fn mean(&self) -> PhaseVector {
        self.moments.translation_part()
    }

    pub fn centered_block(&self, plane: Plane) -> PlaneBlock {
        let offset = plane.offset();
        let mean = self.mean();
        let raw = self.moments.plane_block(plane);
        let mut block = raw;
        for row in 0..2 {
            for col in 0..2 {
                block[row][col] -= mean[offset + row] * mean[offset + col];
            }
        }
        block
    }

    pub fn twiss(&self, plane: Plane) -> Option<Twiss> {
        Twiss::from_covariance_block(&self.centered_block(plane))
    }

    pub fn rms_size(&self, plane: Plane) -> f64 {
        self.centered_block(plane)[0][0].max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::CovarianceMatrix;
    use crate::domain::Plane;
    use crate::phase::{PhaseMatrix, PhaseVector};
    use crate::probe::{Twiss, TwissSet};

    fn sample_twiss() -> TwissSet {
        TwissSet::new(
            Twiss::new(4.0, 1.0, 2.0e-6),
            Twiss::new(9.0, -0.5, 1.0e-6),
            Twiss::new(1.0, 0.0, 5.0e-6),
        )
    }

    #[test]
    fn centroid_and_ellipses_survive_construction() {
        let centroid = PhaseVector::from_coordinates(1.0e-3, -2.0e-4, 0.0, 0.0, 0.0, 1.0e-3);
        let covariance = CovarianceMatrix::from_twiss(&sample_twiss(), centroid);
        assert_eq!(covariance.mean(), centroid);

        let x = covariance.twiss(Plane::X).expect("x twiss");
        assert!((x.beta - 4.0).abs() < 1.0e-8);
        assert!((x.alpha - 1.0).abs() < 1.0e-8);
        assert!((covariance.rms_size(Plane::Y) - (9.0e-6_f64).sqrt()).abs() < 1.0e-12);
    }

    #[test]
    fn translation_moves_centroid_without_changing_ellipse() {
        let covariance = CovarianceMatrix::from_twiss(&sample_twiss(), PhaseVector::ZERO);
        let kick = PhaseMatrix::translation(PhaseVector::from_coordinates(
            0.0, 1.0e-3, 0.0, 0.0, 0.0, 0.0,
        ));
        let kicked = covariance.propagate(&kick);
        assert!((kicked.mean().xp() - 1.0e-3).abs() < 1.0e-18);

        let before = covariance.twiss(Plane::X).expect("before");
        let after = kicked.twiss(Plane::X).expect("after");
        assert!((before.beta - after.beta).abs() < 1.0e-8);
        assert!((before.emittance - after.emittance).abs() < 1.0e-14);
    }
}
