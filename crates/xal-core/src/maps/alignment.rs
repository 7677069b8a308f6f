use crate::lattice::AlignmentErrors;
use crate::phase::{PhaseMatrix, RotationMatrix};

/// Expresses an element map built in the element frame in the beam frame.
///
/// The rotation `R = Rz(roll) Ry(yaw) Rx(pitch)` is applied first as
/// `R^T M R`, then the displacement as `T(d) M T(-d)`.
pub fn apply_errors(map: &PhaseMatrix, errors: &AlignmentErrors) -> PhaseMatrix {
    let mut aligned = *map;
    if errors.has_rotation() {
        let rotation =
            RotationMatrix::from_pitch_yaw_roll(errors.pitch, errors.yaw, errors.roll)
                .to_phase_matrix();
        aligned = aligned.conjugate_orthogonal(&rotation.transpose());
    }
    if errors.has_displacement() {
        aligned = PhaseMatrix::spatial_translation(errors.dx, errors.dy, errors.dz)
            * aligned
            * PhaseMatrix::spatial_translation(-errors.dx, -errors.dy, -errors.dz);
    }
    aligned
}

#[cfg(test)]
mod tests {
    use super::apply_errors;
    use crate::lattice::AlignmentErrors;
    use crate::maps::thin::thin_lens_map;
    use crate::phase::{PhaseMatrix, PhaseVector};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn zero_errors_leave_map_unchanged() {
        let lens = thin_lens_map(0.3);
        assert_eq!(apply_errors(&lens, &AlignmentErrors::default()), lens);
    }

    #[test]
    fn displaced_lens_produces_dipole_kick() {
        let lens = thin_lens_map(0.5);
        let errors = AlignmentErrors {
            dx: 2.0e-3,
            ..AlignmentErrors::default()
        };
        let displaced = apply_errors(&lens, &errors);
        let kicked = displaced.apply_to(&PhaseVector::ZERO);
        assert!((kicked.xp() - 0.5 * 2.0e-3).abs() < 1.0e-18);
        assert!(kicked.x().abs() < 1.0e-18);
        assert_eq!(displaced.linear_part(), lens.linear_part());
    }

    #[test]
    fn quarter_turn_roll_swaps_focusing_planes() {
        let lens = thin_lens_map(0.5);
        let errors = AlignmentErrors {
            roll: FRAC_PI_2,
            ..AlignmentErrors::default()
        };
        let rolled = apply_errors(&lens, &errors);
        assert!(rolled.max_abs_difference(&thin_lens_map(-0.5)) < 1.0e-15);
    }

    #[test]
    fn skew_roll_couples_planes_and_order_matters() {
        let lens = thin_lens_map(0.5);
        let rotated = AlignmentErrors {
            roll: 0.25 * std::f64::consts::PI,
            ..AlignmentErrors::default()
        };
        let skew = apply_errors(&lens, &rotated);
        assert!(skew[(1, 2)].abs() > 0.1);
        assert!(skew[(1, 0)].abs() < 1.0e-15);
        assert!(skew.is_symplectic(1.0e-14));

        let both = AlignmentErrors {
            dx: 1.0e-3,
            ..rotated
        };
        let rotate_then_shift = apply_errors(&lens, &both);
        let shift = PhaseMatrix::spatial_translation(1.0e-3, 0.0, 0.0);
        let shift_back = PhaseMatrix::spatial_translation(-1.0e-3, 0.0, 0.0);
        assert!(rotate_then_shift.max_abs_difference(&(shift * skew * shift_back)) < 1.0e-18);
    }
}
