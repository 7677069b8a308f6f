pub mod linalg;

pub use linalg::{DenseMatrix, LuDecomposition, LuError, dense_from_rows, lu_factorize, lu_solve};

/// Series expansion threshold on `|K L^2|` for the betatron kernels.
const KERNEL_SERIES_THRESHOLD: f64 = 1.0e-4;

/// Principal trajectories of `u'' + K u = 0` over a length `L`.
///
/// `cosine` and `sine` are the usual C(L), S(L); `one_minus_cosine` is
/// `(1 - C)/K` and `length_minus_sine` is `(L - S)/K`, both finite as K -> 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetatronKernel {
    pub cosine: f64,
    pub sine: f64,
    pub cosine_prime: f64,
    pub one_minus_cosine: f64,
    pub length_minus_sine: f64,
}

impl BetatronKernel {
    pub fn new(focusing: f64, length: f64) -> Self {
        let phase_sq = focusing * length * length;
        if phase_sq.abs() < KERNEL_SERIES_THRESHOLD {
            let l2 = length * length;
            let k = focusing;
            return Self {
                cosine: 1.0 - phase_sq / 2.0 + phase_sq * phase_sq / 24.0,
                sine: length * (1.0 - phase_sq / 6.0 + phase_sq * phase_sq / 120.0),
                cosine_prime: -k * length * (1.0 - phase_sq / 6.0 + phase_sq * phase_sq / 120.0),
                one_minus_cosine: l2 * (0.5 - phase_sq / 24.0 + phase_sq * phase_sq / 720.0),
                length_minus_sine: l2
                    * length
                    * (1.0 / 6.0 - phase_sq / 120.0 + phase_sq * phase_sq / 5040.0),
            };
        }

        let root = focusing.abs().sqrt();
        let phase = root * length;
        let (cosine, sine, cosine_prime) = if focusing > 0.0 {
            (phase.cos(), phase.sin() / root, -root * phase.sin())
        } else {
            (phase.cosh(), phase.sinh() / root, root * phase.sinh())
        };

        Self {
            cosine,
            sine,
            cosine_prime,
            one_minus_cosine: (1.0 - cosine) / focusing,
            length_minus_sine: (length - sine) / focusing,
        }
    }
}

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn stable_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

pub fn relative_difference(lhs: f64, rhs: f64, relative_floor: f64) -> f64 {
    let scale = lhs.abs().max(rhs.abs()).max(relative_floor);
    (lhs - rhs).abs() / scale
}

pub fn within_tolerance(
    lhs: f64,
    rhs: f64,
    abs_tol: f64,
    rel_tol: f64,
    relative_floor: f64,
) -> bool {
    let abs_diff = (lhs - rhs).abs();
    abs_diff <= abs_tol || relative_difference(lhs, rhs, relative_floor) <= rel_tol
}

/// Wraps an angle into `(-pi, pi]`.
pub fn wrap_phase(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::{
        BetatronKernel, relative_difference, stable_mean, stable_sum, within_tolerance, wrap_phase,
    };
    use std::f64::consts::PI;

    #[test]
    fn stable_sum_reduces_order_loss_for_large_and_small_values() {
        let input = [1.0e16, 1.0, -1.0e16];
        assert_eq!(stable_sum(&input), 0.0);
        assert_eq!(stable_mean(&[]), None);
        assert_eq!(stable_mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn relative_difference_uses_relative_floor() {
        let diff = relative_difference(0.0, 1.0e-10, 1.0e-6);
        assert!((diff - 1.0e-4).abs() < 1.0e-12);
    }

    #[test]
    fn within_tolerance_accepts_abs_or_relative_match() {
        assert!(within_tolerance(10.0, 10.001, 1.0e-2, 1.0e-6, 1.0e-12));
        assert!(within_tolerance(1000.0, 1000.2, 1.0e-6, 5.0e-4, 1.0e-12));
        assert!(!within_tolerance(1.0, 1.1, 1.0e-3, 1.0e-3, 1.0e-12));
    }

    #[test]
    fn wrap_phase_maps_into_half_open_interval() {
        assert!((wrap_phase(3.0 * PI) - PI).abs() < 1.0e-12);
        assert!((wrap_phase(-PI) - PI).abs() < 1.0e-12);
        assert!((wrap_phase(0.25) - 0.25).abs() < 1.0e-15);
        assert!((wrap_phase(-2.0 * PI - 0.5) + 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn kernel_matches_closed_form_for_focusing_and_defocusing() {
        let focusing = BetatronKernel::new(4.0, 0.5);
        assert!((focusing.cosine - 1.0_f64.cos()).abs() < 1.0e-14);
        assert!((focusing.sine - 1.0_f64.sin() / 2.0).abs() < 1.0e-14);
        assert!((focusing.cosine_prime + 2.0 * 1.0_f64.sin()).abs() < 1.0e-14);

        let defocusing = BetatronKernel::new(-4.0, 0.5);
        assert!((defocusing.cosine - 1.0_f64.cosh()).abs() < 1.0e-14);
        assert!((defocusing.sine - 1.0_f64.sinh() / 2.0).abs() < 1.0e-14);
        assert!((defocusing.one_minus_cosine - (1.0 - 1.0_f64.cosh()) / -4.0).abs() < 1.0e-14);
    }

    #[test]
    fn kernel_is_continuous_across_the_series_threshold() {
        let length = 0.3;
        let below = BetatronKernel::new(0.99999e-4 / (length * length), length);
        let above = BetatronKernel::new(1.00001e-4 / (length * length), length);

        assert!((below.cosine - above.cosine).abs() < 1.0e-8);
        assert!((below.sine - above.sine).abs() < 1.0e-8);
        assert!((below.one_minus_cosine - above.one_minus_cosine).abs() < 1.0e-10);
        assert!((below.length_minus_sine - above.length_minus_sine).abs() < 1.0e-10);

        let zero = BetatronKernel::new(0.0, length);
        assert_eq!(zero.cosine, 1.0);
        assert_eq!(zero.sine, length);
        assert_eq!(zero.cosine_prime, 0.0);
        assert!((zero.one_minus_cosine - length * length / 2.0).abs() < 1.0e-16);
    }
}
