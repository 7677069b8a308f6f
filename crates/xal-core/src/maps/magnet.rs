use crate::common::constants::SPEED_OF_LIGHT;
use crate::lattice::BendParams;
use crate::numerics::BetatronKernel;
use crate::phase::PhaseMatrix;
use crate::probe::Kinematics;

/// Focusing constant `K = q G / p` in 1/m^2; positive focuses horizontally.
pub fn quadrupole_focusing(gradient: f64, kinematics: &Kinematics) -> f64 {
    kinematics.charge() * gradient * SPEED_OF_LIGHT / kinematics.momentum()
}

/// Thick quadrupole body; as `K -> 0` the kernels reduce to a drift.
pub fn quadrupole_map(gradient: f64, length: f64, kinematics: &Kinematics) -> PhaseMatrix {
    let focusing = quadrupole_focusing(gradient, kinematics);
    let horizontal = BetatronKernel::new(focusing, length);
    let vertical = BetatronKernel::new(-focusing, length);
    let gamma = kinematics.gamma();

    let mut map = PhaseMatrix::identity();
    write_plane(&mut map, 0, &horizontal);
    write_plane(&mut map, 2, &vertical);
    map[(4, 5)] = length / (gamma * gamma);
    map
}

/// Sector bend body over `slice_length`; curvature comes from the full element.
pub fn bend_body_map(
    params: &BendParams,
    element_length: f64,
    slice_length: f64,
    kinematics: &Kinematics,
) -> PhaseMatrix {
    let curvature = params.curvature(element_length);
    let curvature_sq = curvature * curvature;
    let horizontal = BetatronKernel::new((1.0 - params.field_index) * curvature_sq, slice_length);
    let vertical = BetatronKernel::new(params.field_index * curvature_sq, slice_length);
    let gamma = kinematics.gamma();

    let dispersion = curvature * horizontal.one_minus_cosine;
    let dispersion_prime = curvature * horizontal.sine;

    let mut map = PhaseMatrix::identity();
    write_plane(&mut map, 0, &horizontal);
    write_plane(&mut map, 2, &vertical);
    map[(0, 5)] = dispersion;
    map[(1, 5)] = dispersion_prime;
    map[(4, 0)] = horizontal.cosine_prime * dispersion - horizontal.cosine * dispersion_prime;
    map[(4, 1)] = horizontal.cosine * dispersion - horizontal.sine * dispersion_prime;
    map[(4, 5)] =
        slice_length / (gamma * gamma) - curvature_sq * horizontal.length_minus_sine;
    map
}

/// Thin pole-face rotation with the vertical fringe-field correction.
pub fn edge_map(curvature: f64, edge_angle: f64, gap: f64, fringe_integral: f64) -> PhaseMatrix {
    let (sin, cos) = edge_angle.sin_cos();
    let fringe = fringe_integral * gap * curvature * (1.0 + sin * sin) / cos;

    let mut map = PhaseMatrix::identity();
    map[(1, 0)] = curvature * edge_angle.tan();
    map[(3, 2)] = -curvature * (edge_angle - fringe).tan();
    map
}

pub fn bend_map(
    params: &BendParams,
    element_length: f64,
    slice_length: f64,
    entry_face: bool,
    exit_face: bool,
    kinematics: &Kinematics,
) -> PhaseMatrix {
    let curvature = params.curvature(element_length);
    let mut map = bend_body_map(params, element_length, slice_length, kinematics);
    if entry_face {
        map = map
            * edge_map(
                curvature,
                params.entry_angle,
                params.gap,
                params.fringe_integral,
            );
    }
    if exit_face {
        map = edge_map(
            curvature,
            params.exit_angle,
            params.gap,
            params.fringe_integral,
        ) * map;
    }
    map
}

fn write_plane(map: &mut PhaseMatrix, offset: usize, kernel: &BetatronKernel) {
    map[(offset, offset)] = kernel.cosine;
    map[(offset, offset + 1)] = kernel.sine;
    map[(offset + 1, offset)] = kernel.cosine_prime;
    map[(offset + 1, offset + 1)] = kernel.cosine;
}

#[cfg(test)]
mod tests {
    use super::{bend_body_map, bend_map, edge_map, quadrupole_focusing, quadrupole_map};
    use crate::common::constants::PROTON_REST_ENERGY;
    use crate::lattice::BendParams;
    use crate::maps::drift::drift_map;
    use crate::probe::{Kinematics, ParticleSpecies};

    fn golden_kinematics() -> Kinematics {
        Kinematics::from_rigidity(PROTON_REST_ENERGY, 1.0, 16.0 / 63.8776).expect("kinematics")
    }

    fn assert_relative(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            ((actual - expected) / expected).abs() < tolerance,
            "actual {actual} expected {expected}"
        );
    }

    #[test]
    fn quadrupole_reproduces_reference_matrix() {
        let kinematics = golden_kinematics();
        assert_relative(quadrupole_focusing(-16.0, &kinematics), -63.8776, 1.0e-9);

        let map = quadrupole_map(-16.0, 0.07, &kinematics);
        assert_relative(map[(0, 0)], 1.160_625, 2.0e-6);
        assert_relative(map[(0, 1)], 0.073_709_3, 2.0e-6);
        assert_relative(map[(1, 0)], 4.708_370, 2.0e-6);
        assert_relative(map[(1, 1)], 1.160_625, 2.0e-6);
        assert_relative(map[(2, 2)], 0.847_539_6, 2.0e-6);
        assert_relative(map[(2, 3)], 0.066_405_1, 2.0e-6);
        assert!(map.is_symplectic(1.0e-12));
    }

    #[test]
    fn weak_quadrupole_converges_to_drift() {
        let kinematics = Kinematics::new(ParticleSpecies::Proton, 1.0e9).expect("kinematics");
        let drift = drift_map(0.5, kinematics.gamma());
        let mut previous = f64::INFINITY;
        for gradient in [1.0e-2, 1.0e-4, 1.0e-6, 1.0e-9, 1.0e-12] {
            let difference = quadrupole_map(gradient, 0.5, &kinematics).max_abs_difference(&drift);
            assert!(difference <= previous);
            previous = difference;
        }
        assert!(previous < 1.0e-12);
        assert_eq!(quadrupole_map(0.0, 0.5, &kinematics), drift);
    }

    #[test]
    fn sliced_quadrupole_composes_to_whole() {
        let kinematics = golden_kinematics();
        let whole = quadrupole_map(12.0, 0.4, &kinematics);
        let half = quadrupole_map(12.0, 0.2, &kinematics);
        assert!((half * half).approx_eq(&whole, 1.0e-14, 1.0e-12));
    }

    fn sample_bend() -> BendParams {
        BendParams {
            angle: 0.2,
            field_index: 0.3,
            entry_angle: 0.05,
            exit_angle: -0.04,
            gap: 0.05,
            fringe_integral: 0.5,
        }
    }

    #[test]
    fn bend_body_is_symplectic_with_dispersion() {
        let kinematics = Kinematics::new(ParticleSpecies::Proton, 1.0e9).expect("kinematics");
        let params = sample_bend();
        let map = bend_body_map(&params, 2.0, 2.0, &kinematics);
        assert!(map.is_symplectic(1.0e-12));
        assert!(map[(0, 5)] > 0.0);
        assert!(map[(4, 0)] < 0.0);

        let full = bend_map(&params, 2.0, 2.0, true, true, &kinematics);
        assert!(full.is_symplectic(1.0e-12));
    }

    #[test]
    fn flat_bend_matches_drift() {
        let kinematics = Kinematics::new(ParticleSpecies::Proton, 1.0e9).expect("kinematics");
        let params = BendParams {
            angle: 0.0,
            ..sample_bend()
        };
        let body = bend_body_map(&params, 1.5, 1.5, &kinematics);
        assert!(body.max_abs_difference(&drift_map(1.5, kinematics.gamma())) < 1.0e-15);
    }

    #[test]
    fn edge_kicks_have_opposite_signs_and_fringe_softens_vertical() {
        let edge = edge_map(0.1, 0.2, 0.0, 0.0);
        assert!((edge[(1, 0)] - 0.1 * 0.2_f64.tan()).abs() < 1.0e-15);
        assert!((edge[(3, 2)] + 0.1 * 0.2_f64.tan()).abs() < 1.0e-15);

        let corrected = edge_map(0.1, 0.2, 0.05, 0.5);
        assert!(corrected[(3, 2)].abs() < edge[(3, 2)].abs());
    }
}
