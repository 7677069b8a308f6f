pub mod matrix;
pub mod rotation;
pub mod vector;

pub use matrix::{PhaseMatrix, PlaneBlock, block_determinant, block_multiply, block_trace};
pub use rotation::RotationMatrix;
pub use vector::{HOMOGENEOUS_DIMENSION, HOMOGENEOUS_INDEX, PHASE_DIMENSION, PhaseVector};
