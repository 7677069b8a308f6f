use crate::phase::{PhaseMatrix, PhaseVector};

/// Thin quadrupole of integrated strength `kL` (1/m).
pub fn thin_lens_map(integrated_strength: f64) -> PhaseMatrix {
    let mut map = PhaseMatrix::identity();
    map[(1, 0)] = -integrated_strength;
    map[(3, 2)] = integrated_strength;
    map
}

/// Steering dipole: a pure angular kick in both transverse planes.
pub fn corrector_map(kick_x: f64, kick_y: f64) -> PhaseMatrix {
    PhaseMatrix::translation(PhaseVector::from_coordinates(
        0.0, kick_x, 0.0, kick_y, 0.0, 0.0,
    ))
}

pub fn marker_map() -> PhaseMatrix {
    PhaseMatrix::identity()
}
