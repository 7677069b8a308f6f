use crate::lattice::RfGapParams;
use crate::phase::PhaseMatrix;
use crate::probe::Kinematics;
use std::f64::consts::PI;

/// Kinetic energy gain `q ETL cos(phase)` in eV.
pub fn rf_gap_energy_gain(params: &RfGapParams, kinematics: &Kinematics) -> f64 {
    kinematics.charge() * params.etl * params.phase.cos()
}

/// Thin RF gap focusing and momentum damping between entry and exit kinematics.
///
/// The transverse and longitudinal kicks act on the normalized momenta
/// `beta gamma x'` and `beta gamma z'`, evaluated at mid-gap.
pub fn rf_gap_map(params: &RfGapParams, kinematics: &Kinematics) -> PhaseMatrix {
    let exit = kinematics.accelerated(rf_gap_energy_gain(params, kinematics));
    let entry_beta_gamma = kinematics.beta_gamma();
    let exit_beta_gamma = exit.beta_gamma();

    let mid_gamma = 0.5 * (kinematics.gamma() + exit.gamma());
    let mid_beta_sq = 1.0 - 1.0 / (mid_gamma * mid_gamma);
    let wavelength = Kinematics::wavelength(params.frequency);

    let transverse = -PI * kinematics.charge() * params.etl * params.phase.sin()
        / (kinematics.rest_energy() * mid_beta_sq * mid_gamma * mid_gamma * wavelength);
    let longitudinal = -2.0 * mid_gamma * mid_gamma * transverse;
    let damping = entry_beta_gamma / exit_beta_gamma;

    let mut map = PhaseMatrix::identity();
    for (offset, kick) in [(0, transverse), (2, transverse), (4, longitudinal)] {
        map[(offset + 1, offset)] = kick / exit_beta_gamma;
        map[(offset + 1, offset + 1)] = damping;
    }
    map
}

#[cfg(test)]
mod tests {
    use super::{rf_gap_energy_gain, rf_gap_map};
    use crate::lattice::RfGapParams;
    use crate::phase::PhaseMatrix;
    use crate::probe::{Kinematics, ParticleSpecies};

    fn kinematics() -> Kinematics {
        Kinematics::new(ParticleSpecies::HMinus, 2.5e6).expect("kinematics")
    }

    #[test]
    fn zero_field_gap_is_identity() {
        let params = RfGapParams {
            etl: 0.0,
            phase: -0.5,
            frequency: 402.5e6,
        };
        assert_eq!(rf_gap_energy_gain(&params, &kinematics()), 0.0);
        assert!(rf_gap_map(&params, &kinematics()).max_abs_difference(&PhaseMatrix::identity()) < 1.0e-15);
    }

    #[test]
    fn bunching_phase_focuses_longitudinally_and_defocuses_transversely() {
        let proton = Kinematics::new(ParticleSpecies::Proton, 2.5e6).expect("kinematics");
        let params = RfGapParams {
            etl: 1.0e5,
            phase: -30.0_f64.to_radians(),
            frequency: 402.5e6,
        };
        let gain = rf_gap_energy_gain(&params, &proton);
        assert!((gain - 1.0e5 * 30.0_f64.to_radians().cos()).abs() < 1.0e-9);

        let map = rf_gap_map(&params, &proton);
        assert!(map[(1, 0)] > 0.0);
        assert!(map[(3, 2)] > 0.0);
        assert!(map[(5, 4)] < 0.0);
        let damping = map[(1, 1)];
        assert!(damping < 1.0);
        let exit = proton.accelerated(gain);
        assert!((damping - proton.beta_gamma() / exit.beta_gamma()).abs() < 1.0e-15);
        assert!((map.determinant() - damping.powi(3)).abs() < 1.0e-12);
    }

    #[test]
    fn negative_charge_reverses_gain() {
        let params = RfGapParams {
            etl: 1.0e5,
            phase: 0.0,
            frequency: 402.5e6,
        };
        assert!(rf_gap_energy_gain(&params, &kinematics()) < 0.0);
    }
}
