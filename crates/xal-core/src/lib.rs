//! Transfer-map propagation engine for linear accelerator and ring optics.

pub mod common;
pub mod domain;
pub mod fit;
pub mod lattice;
pub mod maps;
pub mod numerics;
pub mod optics;
pub mod phase;
pub mod probe;
pub mod scenario;
