use super::vector::{HOMOGENEOUS_DIMENSION, HOMOGENEOUS_INDEX, PHASE_DIMENSION, PhaseVector};
use crate::domain::Plane;
use crate::numerics::{DenseMatrix, LuError, lu_factorize};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut, Mul};

/// 2x2 per-plane sub-block of a transfer matrix.
pub type PlaneBlock = [[f64; 2]; 2];

/// Homogeneous 7x7 transfer matrix: 6x6 linear block plus translation column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseMatrix {
    elements: [[f64; HOMOGENEOUS_DIMENSION]; HOMOGENEOUS_DIMENSION],
}

impl Default for PhaseMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl PhaseMatrix {
    pub const fn zero() -> Self {
        Self {
            elements: [[0.0; HOMOGENEOUS_DIMENSION]; HOMOGENEOUS_DIMENSION],
        }
    }

    pub const fn identity() -> Self {
        let mut elements = [[0.0; HOMOGENEOUS_DIMENSION]; HOMOGENEOUS_DIMENSION];
        let mut index = 0;
        while index < HOMOGENEOUS_DIMENSION {
            elements[index][index] = 1.0;
            index += 1;
        }
        Self { elements }
    }

    pub const fn from_rows(elements: [[f64; HOMOGENEOUS_DIMENSION]; HOMOGENEOUS_DIMENSION]) -> Self {
        Self { elements }
    }

    /// Affine translation `v -> v + offset`.
    pub fn translation(offset: PhaseVector) -> Self {
        let mut matrix = Self::identity();
        for (row, value) in offset.coordinates().iter().enumerate() {
            matrix.elements[row][HOMOGENEOUS_INDEX] = *value;
        }
        matrix
    }

    /// Translation of the spatial coordinates only.
    pub fn spatial_translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self::translation(PhaseVector::from_coordinates(dx, 0.0, dy, 0.0, dz, 0.0))
    }

    pub fn rows(&self) -> &[[f64; HOMOGENEOUS_DIMENSION]; HOMOGENEOUS_DIMENSION] {
        &self.elements
    }

    pub fn transpose(&self) -> Self {
        let mut output = Self::zero();
        for row in 0..HOMOGENEOUS_DIMENSION {
            for col in 0..HOMOGENEOUS_DIMENSION {
                output.elements[col][row] = self.elements[row][col];
            }
        }
        output
    }

    /// Affine application: the vector's homogeneous component is taken as 1.
    pub fn apply_to(&self, vector: &PhaseVector) -> PhaseVector {
        let homogeneous = vector.homogeneous();
        let mut output = [0.0; PHASE_DIMENSION];
        for (row, value) in output.iter_mut().enumerate() {
            *value = self.elements[row]
                .iter()
                .zip(homogeneous.iter())
                .map(|(lhs, rhs)| lhs * rhs)
                .sum();
        }
        PhaseVector::new(output)
    }

    pub fn inverse(&self) -> Result<Self, LuError> {
        let inverse = lu_factorize(&self.to_dense())?.invert()?;
        Ok(Self::from_dense(&inverse))
    }

    pub fn determinant(&self) -> f64 {
        match lu_factorize(&self.to_dense()) {
            Ok(decomposition) => decomposition.determinant(),
            Err(_) => 0.0,
        }
    }

    /// `R * self * R^-1`.
    pub fn conjugate_trans(&self, transform: &PhaseMatrix) -> Result<Self, LuError> {
        Ok(*transform * *self * transform.inverse()?)
    }

    /// `R * self * R^T`; valid for orthogonal `R` only.
    pub fn conjugate_orthogonal(&self, transform: &PhaseMatrix) -> Self {
        *transform * *self * transform.transpose()
    }

    /// Translation column as a phase vector.
    pub fn translation_part(&self) -> PhaseVector {
        let mut coordinates = [0.0; PHASE_DIMENSION];
        for (row, value) in coordinates.iter_mut().enumerate() {
            *value = self.elements[row][HOMOGENEOUS_INDEX];
        }
        PhaseVector::new(coordinates)
    }

    /// Copy with the translation column cleared.
    pub fn linear_part(&self) -> Self {
        let mut output = *self;
        for row in 0..PHASE_DIMENSION {
            output.elements[row][HOMOGENEOUS_INDEX] = 0.0;
        }
        output
    }

    pub fn plane_block(&self, plane: Plane) -> PlaneBlock {
        let offset = plane.offset();
        [
            [
                self.elements[offset][offset],
                self.elements[offset][offset + 1],
            ],
            [
                self.elements[offset + 1][offset],
                self.elements[offset + 1][offset + 1],
            ],
        ]
    }

    pub fn is_affine(&self, tolerance: f64) -> bool {
        let last = &self.elements[HOMOGENEOUS_INDEX];
        last[..PHASE_DIMENSION].iter().all(|value| value.abs() <= tolerance)
            && (last[HOMOGENEOUS_INDEX] - 1.0).abs() <= tolerance
    }

    /// Checks `M^T J M = J` on the 6x6 linear block.
    pub fn is_symplectic(&self, tolerance: f64) -> bool {
        let form = symplectic_form();
        for row in 0..PHASE_DIMENSION {
            for col in 0..PHASE_DIMENSION {
                let mut value = 0.0;
                for k in 0..PHASE_DIMENSION {
                    for l in 0..PHASE_DIMENSION {
                        value += self.elements[k][row] * form[k][l] * self.elements[l][col];
                    }
                }
                if (value - form[row][col]).abs() > tolerance {
                    return false;
                }
            }
        }
        true
    }

    pub fn max_abs_difference(&self, other: &PhaseMatrix) -> f64 {
        let mut best: f64 = 0.0;
        for row in 0..HOMOGENEOUS_DIMENSION {
            for col in 0..HOMOGENEOUS_DIMENSION {
                best = best.max((self.elements[row][col] - other.elements[row][col]).abs());
            }
        }
        best
    }

    pub fn approx_eq(&self, other: &PhaseMatrix, abs_tol: f64, rel_tol: f64) -> bool {
        (0..HOMOGENEOUS_DIMENSION).all(|row| {
            (0..HOMOGENEOUS_DIMENSION).all(|col| {
                crate::numerics::within_tolerance(
                    self.elements[row][col],
                    other.elements[row][col],
                    abs_tol,
                    rel_tol,
                    1.0e-300,
                )
            })
        })
    }

    pub fn is_finite(&self) -> bool {
        self.elements.iter().flatten().all(|value| value.is_finite())
    }

    pub(crate) fn to_dense(&self) -> DenseMatrix {
        let mut dense = DenseMatrix::zeros(HOMOGENEOUS_DIMENSION, HOMOGENEOUS_DIMENSION);
        for row in 0..HOMOGENEOUS_DIMENSION {
            for col in 0..HOMOGENEOUS_DIMENSION {
                dense[(row, col)] = self.elements[row][col];
            }
        }
        dense
    }

    fn from_dense(dense: &DenseMatrix) -> Self {
        let mut output = Self::zero();
        for row in 0..HOMOGENEOUS_DIMENSION {
            for col in 0..HOMOGENEOUS_DIMENSION {
                output.elements[row][col] = dense[(row, col)];
            }
        }
        output
    }
}

impl Index<(usize, usize)> for PhaseMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.elements[row][col]
    }
}

impl IndexMut<(usize, usize)> for PhaseMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        &mut self.elements[row][col]
    }
}

impl Mul for PhaseMatrix {
    type Output = PhaseMatrix;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut output = Self::zero();
        for row in 0..HOMOGENEOUS_DIMENSION {
            for col in 0..HOMOGENEOUS_DIMENSION {
                let mut sum = 0.0;
                for k in 0..HOMOGENEOUS_DIMENSION {
                    sum += self.elements[row][k] * rhs.elements[k][col];
                }
                output.elements[row][col] = sum;
            }
        }
        output
    }
}

impl Mul<PhaseVector> for PhaseMatrix {
    type Output = PhaseVector;

    fn mul(self, rhs: PhaseVector) -> Self::Output {
        self.apply_to(&rhs)
    }
}

pub fn block_trace(block: &PlaneBlock) -> f64 {
    block[0][0] + block[1][1]
}

pub fn block_determinant(block: &PlaneBlock) -> f64 {
    block[0][0] * block[1][1] - block[0][1] * block[1][0]
}

pub fn block_multiply(lhs: &PlaneBlock, rhs: &PlaneBlock) -> PlaneBlock {
    let mut output = [[0.0; 2]; 2];
    for row in 0..2 {
        for col in 0..2 {
            output[row][col] = lhs[row][0] * rhs[0][col] + lhs[row][1] * rhs[1][col];
        }
    }
    output
}

fn symplectic_form() -> [[f64; PHASE_DIMENSION]; PHASE_DIMENSION] {
    let mut form = [[0.0; PHASE_DIMENSION]; PHASE_DIMENSION];
    for plane in Plane::ALL {
        let offset = plane.offset();
        form[offset][offset + 1] = 1.0;
        form[offset + 1][offset] = -1.0;
    }
    form
}
