use super::matrix::PhaseMatrix;
use std::ops::Mul;

/// Spatial 3x3 rotation acting on (x, y, z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix {
    elements: [[f64; 3]; 3],
}

impl RotationMatrix {
    pub const fn identity() -> Self {
        Self {
            elements: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn about_x(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            elements: [[1.0, 0.0, 0.0], [0.0, cos, -sin], [0.0, sin, cos]],
        }
    }

    pub fn about_y(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            elements: [[cos, 0.0, sin], [0.0, 1.0, 0.0], [-sin, 0.0, cos]],
        }
    }

    pub fn about_z(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            elements: [[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// `Rz(roll) * Ry(yaw) * Rx(pitch)`.
    pub fn from_pitch_yaw_roll(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self::about_z(roll) * Self::about_y(yaw) * Self::about_x(pitch)
    }

    pub fn transpose(&self) -> Self {
        let mut elements = [[0.0; 3]; 3];
        for (row, values) in self.elements.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                elements[col][row] = *value;
            }
        }
        Self { elements }
    }

    pub fn elements(&self) -> &[[f64; 3]; 3] {
        &self.elements
    }

    /// Lifts the rotation to phase space; positions and angles rotate alike.
    pub fn to_phase_matrix(&self) -> PhaseMatrix {
        let mut matrix = PhaseMatrix::zero();
        for row in 0..3 {
            for col in 0..3 {
                let value = self.elements[row][col];
                matrix[(2 * row, 2 * col)] = value;
                matrix[(2 * row + 1, 2 * col + 1)] = value;
            }
        }
        matrix[(6, 6)] = 1.0;
        matrix
    }
}

impl Mul for RotationMatrix {
    type Output = RotationMatrix;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut elements = [[0.0; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                elements[row][col] = (0..3)
                    .map(|k| self.elements[row][k] * rhs.elements[k][col])
                    .sum();
            }
        }
        Self { elements }
    }
}
