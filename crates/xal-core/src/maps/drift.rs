use crate::phase::PhaseMatrix;

/// Field-free drift of `length` metres for a design particle with Lorentz factor `gamma`.
pub fn drift_map(length: f64, gamma: f64) -> PhaseMatrix {
    let mut map = PhaseMatrix::identity();
    map[(0, 1)] = length;
    map[(2, 3)] = length;
    map[(4, 5)] = length / (gamma * gamma);
    map
}

#[cfg(test)]
mod tests {
    use super::drift_map;
    use crate::phase::{PhaseMatrix, PhaseVector};

    #[test]
    fn drift_moves_positions_by_length_times_angle() {
        let map = drift_map(2.5, 1.2);
        let start = PhaseVector::from_coordinates(1.0e-3, 2.0e-3, -1.0e-3, 4.0e-4, 0.0, 1.0e-3);
        let end = map.apply_to(&start);
        assert!((end.x() - (1.0e-3 + 2.5 * 2.0e-3)).abs() < 1.0e-15);
        assert!((end.y() - (-1.0e-3 + 2.5 * 4.0e-4)).abs() < 1.0e-15);
        assert!((end.z() - 2.5 / 1.44 * 1.0e-3).abs() < 1.0e-15);
        assert_eq!(end.xp(), start.xp());
    }

    #[test]
    fn opposite_drifts_cancel() {
        let forward = drift_map(3.7, 1.05);
        let backward = drift_map(-3.7, 1.05);
        assert!((backward * forward).max_abs_difference(&PhaseMatrix::identity()) < 1.0e-15);
        let inverse = forward.inverse().expect("inverse");
        assert!(inverse.max_abs_difference(&backward) < 1.0e-14);
        assert!(forward.is_symplectic(1.0e-14));
    }
}
