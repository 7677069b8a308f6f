use crate::domain::Plane;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Index, Neg, Sub};

/// Number of phase coordinates, excluding the homogeneous component.
pub const PHASE_DIMENSION: usize = 6;
/// Size of the homogeneous representation.
pub const HOMOGENEOUS_DIMENSION: usize = 7;
/// Index of the homogeneous coordinate.
pub const HOMOGENEOUS_INDEX: usize = 6;

/// Particle (or centroid) offset from the design orbit: (x, x', y, y', z, z').
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseVector {
    coordinates: [f64; PHASE_DIMENSION],
}

impl PhaseVector {
    pub const ZERO: Self = Self {
        coordinates: [0.0; PHASE_DIMENSION],
    };

    pub const fn new(coordinates: [f64; PHASE_DIMENSION]) -> Self {
        Self { coordinates }
    }

    pub const fn from_coordinates(x: f64, xp: f64, y: f64, yp: f64, z: f64, zp: f64) -> Self {
        Self::new([x, xp, y, yp, z, zp])
    }

    pub const fn x(&self) -> f64 {
        self.coordinates[0]
    }

    pub const fn xp(&self) -> f64 {
        self.coordinates[1]
    }

    pub const fn y(&self) -> f64 {
        self.coordinates[2]
    }

    pub const fn yp(&self) -> f64 {
        self.coordinates[3]
    }

    pub const fn z(&self) -> f64 {
        self.coordinates[4]
    }

    pub const fn zp(&self) -> f64 {
        self.coordinates[5]
    }

    pub const fn coordinates(&self) -> &[f64; PHASE_DIMENSION] {
        &self.coordinates
    }

    /// Homogeneous form with the implicit trailing 1.
    pub fn homogeneous(&self) -> [f64; HOMOGENEOUS_DIMENSION] {
        let mut output = [1.0; HOMOGENEOUS_DIMENSION];
        output[..PHASE_DIMENSION].copy_from_slice(&self.coordinates);
        output
    }

    pub fn plane(&self, plane: Plane) -> [f64; 2] {
        let offset = plane.offset();
        [self.coordinates[offset], self.coordinates[offset + 1]]
    }

    pub fn with_plane(mut self, plane: Plane, position: f64, angle: f64) -> Self {
        let offset = plane.offset();
        self.coordinates[offset] = position;
        self.coordinates[offset + 1] = angle;
        self
    }

    pub fn norm(&self) -> f64 {
        self.coordinates.iter().map(|value| value * value).sum::<f64>().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.coordinates.iter().all(|value| value.is_finite())
    }
}

impl From<[f64; PHASE_DIMENSION]> for PhaseVector {
    fn from(coordinates: [f64; PHASE_DIMENSION]) -> Self {
        Self::new(coordinates)
    }
}

impl Index<usize> for PhaseVector {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.coordinates[index]
    }
}

impl Add for PhaseVector {
    type Output = PhaseVector;

    fn add(self, rhs: Self) -> Self::Output {
        let mut coordinates = self.coordinates;
        for (lhs, rhs) in coordinates.iter_mut().zip(rhs.coordinates) {
            *lhs += rhs;
        }
        Self::new(coordinates)
    }
}

impl Sub for PhaseVector {
    type Output = PhaseVector;

    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}

impl Neg for PhaseVector {
    type Output = PhaseVector;

    fn neg(self) -> Self::Output {
        Self::new(self.coordinates.map(|value| -value))
    }
}

#[cfg(test)]
mod tests {
    use super::PhaseVector;
    use crate::domain::Plane;

    #[test]
    fn accessors_follow_coordinate_layout() {
        let vector = PhaseVector::from_coordinates(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(vector.x(), 1.0);
        assert_eq!(vector.yp(), 4.0);
        assert_eq!(vector.zp(), 6.0);
        assert_eq!(vector.plane(Plane::Y), [3.0, 4.0]);
        assert_eq!(vector.homogeneous()[6], 1.0);
    }

    #[test]
    fn arithmetic_is_componentwise() {
        let lhs = PhaseVector::from_coordinates(1.0, 0.0, -1.0, 0.5, 0.0, 0.0);
        let rhs = PhaseVector::ZERO.with_plane(Plane::X, 0.5, 0.25);
        let sum = lhs + rhs;
        assert_eq!(sum.x(), 1.5);
        assert_eq!(sum.xp(), 0.25);
        assert_eq!((sum - rhs), lhs);
        assert!(sum.is_finite());
        assert!(!PhaseVector::from_coordinates(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0).is_finite());
    }
}
