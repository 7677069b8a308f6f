use super::sinusoid::SinusoidFit;
use crate::domain::{ModelError, ModelResult, Plane};
use crate::optics::RingOptics;
use serde::Serialize;
use tracing::debug;

/// Betatron coordinates reconstructed at one lattice location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetatronCoordinates {
    /// Trajectory state the coordinates belong to.
    pub state_index: usize,
    pub position: f64,
    pub angle: f64,
    /// Betatron phase at the location on the first recorded turn.
    pub phase: f64,
    pub amplitude: f64,
    /// Fractional tune after alias resolution.
    pub tune: f64,
    pub aliased: bool,
}

/// Carries a turn-by-turn fit at a BPM to `(u, u')` elsewhere in the ring.
///
/// With `u_b(n) = A cos(2 pi q n + phi)` at the BPM, a location `t` sees
/// `u_t = A sqrt(beta_t / beta_b) cos(psi_t)` and
/// `u'_t = -A (sin(psi_t) + alpha_t cos(psi_t)) / sqrt(beta_b beta_t)`
/// with `psi_t = phi + mu_t - mu_b`.
#[derive(Debug, Clone, Copy)]
pub struct BetatronMapper<'r, 'a> {
    optics: &'r RingOptics<'a>,
    plane: Plane,
    ring_tune: f64,
}

impl<'r, 'a> BetatronMapper<'r, 'a> {
    pub fn new(optics: &'r RingOptics<'a>, plane: Plane) -> ModelResult<Self> {
        if plane == Plane::Z {
            return Err(ModelError::construction(
                "FIT.PLANE",
                "betatron mapping is defined for the transverse planes only",
            ));
        }
        let ring_tune = optics.fractional_tune(plane)?;
        Ok(Self {
            optics,
            plane,
            ring_tune,
        })
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn ring_tune(&self) -> f64 {
        self.ring_tune
    }

    /// Tune and first-turn phase of the fit, undoing the `1 - q` fold when the
    /// ring tune sits above one half.
    pub fn resolve_alias(&self, fit: &SinusoidFit) -> (f64, f64, bool) {
        let direct = (fit.frequency - self.ring_tune).abs();
        let folded = (1.0 - fit.frequency - self.ring_tune).abs();
        if folded < direct {
            (1.0 - fit.frequency, -fit.phase, true)
        } else {
            (fit.frequency, fit.phase, false)
        }
    }

    pub fn map(
        &self,
        fit: &SinusoidFit,
        bpm_id: &str,
        target_id: &str,
    ) -> ModelResult<BetatronCoordinates> {
        if !(fit.amplitude.is_finite() && fit.phase.is_finite()) {
            return Err(ModelError::fit_non_convergent(
                "FIT.NON_FINITE",
                "fit amplitude and phase must be finite",
            ));
        }
        let trajectory = self.optics.trajectory();
        let bpm = trajectory.require_element(bpm_id)?;
        let target = trajectory.require_element(target_id)?;
        let bpm_twiss = self.optics.twiss_at(bpm, self.plane)?;
        let target_twiss = self.optics.twiss_at(target, self.plane)?;
        let advance =
            self.optics.phase_at(target, self.plane)? - self.optics.phase_at(bpm, self.plane)?;

        let (tune, fitted_phase, aliased) = self.resolve_alias(fit);
        let phase = fitted_phase + advance;
        let (sin, cos) = phase.sin_cos();
        let amplitude = fit.amplitude;
        let position = amplitude * (target_twiss.beta / bpm_twiss.beta).sqrt() * cos;
        let angle = -amplitude * (sin + target_twiss.alpha * cos)
            / (bpm_twiss.beta * target_twiss.beta).sqrt();

        debug!(
            plane = self.plane.as_str(),
            bpm = bpm_id,
            target = target_id,
            tune,
            aliased,
            "betatron coordinates mapped"
        );
        Ok(BetatronCoordinates {
            state_index: target,
            position,
            angle,
            phase,
            amplitude,
            tune,
            aliased,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::BetatronMapper;
    use crate::domain::{ModelErrorKind, Plane};
    use crate::fit::SinusoidFit;
    use crate::lattice::{Element, Lattice};
    use crate::optics::RingOptics;
    use crate::phase::PhaseVector;
    use crate::probe::{Kinematics, ParticleSpecies, Probe};
    use crate::scenario::{Scenario, ScenarioConfig, Trajectory};

    fn ring(focal: f64, cells: usize) -> Trajectory {
        let elements = (0..cells)
            .flat_map(|cell| {
                let start = 2.0 * cell as f64;
                [
                    Element::thin_lens(format!("QF{cell}"), start, 1.0 / focal),
                    Element::marker(format!("BPM{cell}"), start + 1.0),
                    Element::thin_lens(format!("QD{cell}"), start + 1.0, -1.0 / focal),
                ]
            })
            .collect();
        let lattice =
            Lattice::with_length("mapper-ring", elements, 2.0 * cells as f64).expect("lattice");
        let kinematics = Kinematics::new(ParticleSpecies::Proton, 1.0e9).expect("kinematics");
        Scenario::new(lattice, ScenarioConfig::default())
            .expect("scenario")
            .run_to_completion(&Probe::transfer_map(kinematics))
            .expect("run")
    }

    fn exact_fit(frequency: f64, phase: f64, amplitude: f64) -> SinusoidFit {
        SinusoidFit {
            frequency,
            phase,
            slope: 0.0,
            amplitude,
            offset: 0.0,
            frequency_variance: 0.0,
            slope_variance: 0.0,
            offset_variance: 0.0,
            amplitude_variance: 0.0,
            phase_variance: None,
            iterations: 0,
            residual_rms: 0.0,
        }
    }

    #[test]
    fn exact_bpm_motion_maps_back_to_launch_coordinates() {
        let trajectory = ring(2.0, 1);
        let optics = RingOptics::new(&trajectory);
        let mapper = BetatronMapper::new(&optics, Plane::X).expect("mapper");

        let launch = PhaseVector::new([1.0e-3, 2.0e-4, 0.0, 0.0, 0.0, 0.0]);
        let bpm = trajectory
            .transfer_map_between_elements("start", "BPM0")
            .expect("map to bpm")
            * launch;
        let twiss = optics.twiss_at_element("BPM0", Plane::X).expect("bpm twiss");
        let invariant = twiss.gamma() * bpm[0] * bpm[0]
            + 2.0 * twiss.alpha * bpm[0] * bpm[1]
            + twiss.beta * bpm[1] * bpm[1];
        let amplitude = (invariant * twiss.beta).sqrt();
        let phase = (-(twiss.alpha * bpm[0] + twiss.beta * bpm[1])).atan2(bpm[0]);

        let fit = exact_fit(mapper.ring_tune(), phase, amplitude);
        let mapped = mapper.map(&fit, "BPM0", "start").expect("mapped");
        assert!(!mapped.aliased);
        assert!((mapped.position - 1.0e-3).abs() < 1.0e-14);
        assert!((mapped.angle - 2.0e-4).abs() < 1.0e-14);

        let same = mapper.map(&fit, "BPM0", "BPM0").expect("identity");
        assert!((same.position - bpm[0]).abs() < 1.0e-14);
        assert!((same.angle - bpm[1]).abs() < 1.0e-14);
    }

    #[test]
    fn folded_tune_is_unfolded_with_negated_phase() {
        let trajectory = ring(0.6, 2);
        let optics = RingOptics::new(&trajectory);
        let mapper = BetatronMapper::new(&optics, Plane::X).expect("mapper");
        assert!(mapper.ring_tune() > 0.5);

        let folded = exact_fit(1.0 - mapper.ring_tune(), -0.3, 1.0e-3);
        let (tune, phase, aliased) = mapper.resolve_alias(&folded);
        assert!(aliased);
        assert!((tune - mapper.ring_tune()).abs() < 1.0e-12);
        assert!((phase - 0.3).abs() < 1.0e-15);

        let direct = exact_fit(mapper.ring_tune(), 0.3, 1.0e-3);
        let from_folded = mapper.map(&folded, "BPM1", "QF0").expect("folded");
        let from_direct = mapper.map(&direct, "BPM1", "QF0").expect("direct");
        assert!((from_folded.position - from_direct.position).abs() < 1.0e-14);
        assert!((from_folded.angle - from_direct.angle).abs() < 1.0e-14);
    }

    #[test]
    fn longitudinal_plane_is_rejected() {
        let trajectory = ring(2.0, 1);
        let optics = RingOptics::new(&trajectory);
        let error = BetatronMapper::new(&optics, Plane::Z).expect_err("z plane");
        assert_eq!(error.kind(), ModelErrorKind::Construction);
        assert_eq!(error.placeholder(), "FIT.PLANE");
    }
}
