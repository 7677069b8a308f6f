//! Physical constants shared by the element transfer-map generators.
//!
//! Energies are in eV, lengths in metres.

pub const PI2: f64 = std::f64::consts::TAU;
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
pub const PROTON_REST_ENERGY: f64 = 938.272_088_16e6;
pub const H_MINUS_REST_ENERGY: f64 = 939.294_308e6;
pub const ELECTRON_REST_ENERGY: f64 = 0.510_998_950_00e6;

/// Lengths below this are treated as zero-length (thin) slices.
pub const LENGTH_EPSILON: f64 = 1.0e-12;
