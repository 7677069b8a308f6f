use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use xal_core::domain::Plane;
use xal_core::lattice::Element;
use xal_core::maps::{ElementMapApi, Slice, drift_map, quadrupole_map};
use xal_core::phase::{PhaseMatrix, PhaseVector, block_determinant, block_multiply};
use xal_core::probe::{Kinematics, ParticleSpecies, Twiss};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/transfer_map_cases.json")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferMapFixtures {
    map_cases: Vec<MapCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapCase {
    id: String,
    element: Element,
    probe: ProbeCase,
    expected: Vec<ExpectedEntry>,
    rel_tol: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeCase {
    rest_energy: f64,
    charge: f64,
    rigidity: Option<f64>,
    kinetic_energy: Option<f64>,
}

impl ProbeCase {
    fn kinematics(&self) -> Kinematics {
        match (self.rigidity, self.kinetic_energy) {
            (Some(rigidity), _) => Kinematics::from_rigidity(self.rest_energy, self.charge, rigidity),
            (None, Some(kinetic_energy)) => {
                Kinematics::from_parts(self.rest_energy, self.charge, kinetic_energy)
            }
            (None, None) => panic!("probe case needs a rigidity or kinetic energy"),
        }
        .expect("fixture kinematics should be valid")
    }
}

#[derive(Debug, Deserialize)]
struct ExpectedEntry {
    row: usize,
    col: usize,
    value: f64,
}

fn load_fixtures() -> TransferMapFixtures {
    let source = fs::read_to_string(fixture_path()).expect("fixture file should be readable");
    serde_json::from_str(&source).expect("fixture JSON should parse")
}

fn kinematics() -> Kinematics {
    Kinematics::new(ParticleSpecies::Proton, 1.0e9).expect("kinematics")
}

#[test]
fn element_maps_match_reference_entries() {
    let fixtures = load_fixtures();
    assert!(!fixtures.map_cases.is_empty());

    for case in &fixtures.map_cases {
        case.element
            .validate()
            .unwrap_or_else(|error| panic!("{}: invalid element: {error}", case.id));
        let map = case
            .element
            .transfer_map(&Slice::whole(&case.element), &case.probe.kinematics());
        for entry in &case.expected {
            let actual = map[(entry.row, entry.col)];
            let relative = ((actual - entry.value) / entry.value).abs();
            assert!(
                relative <= case.rel_tol,
                "{}: M{}{} = {actual}, expected {}",
                case.id,
                entry.row,
                entry.col,
                entry.value
            );
        }
        assert!(map.is_affine(1.0e-15), "{}: homogeneous row broken", case.id);
    }
}

#[test]
fn composition_is_associative() {
    let kin = kinematics();
    let a = quadrupole_map(4.0, 0.3, &kin);
    let b = drift_map(1.2, kin.gamma());
    let c = quadrupole_map(-3.5, 0.25, &kin)
        * PhaseMatrix::translation(PhaseVector::from_coordinates(
            1.0e-3, -2.0e-4, 5.0e-4, 0.0, 0.0, 1.0e-3,
        ));

    let left = (a * b) * c;
    let right = a * (b * c);
    assert!(left.approx_eq(&right, 1.0e-15, 1.0e-10));
}

#[test]
fn drift_then_reverse_drift_is_identity() {
    let gamma = kinematics().gamma();
    let forward = drift_map(3.7, gamma);
    let round_trip = drift_map(-3.7, gamma) * forward;
    assert!(round_trip.approx_eq(&PhaseMatrix::identity(), 1.0e-15, 0.0));

    let inverse = forward.inverse().expect("drift is invertible");
    assert!((inverse * forward).approx_eq(&PhaseMatrix::identity(), 1.0e-12, 0.0));

    let start = PhaseVector::from_coordinates(2.0e-3, -1.0e-3, 0.0, 3.0e-4, 0.0, 0.0);
    let end = forward * start;
    assert!((end.x() - (2.0e-3 + 3.7 * -1.0e-3)).abs() < 1.0e-15);
}

#[test]
fn unimodular_blocks_preserve_the_twiss_invariant() {
    let kin = kinematics();
    let cell = (quadrupole_map(6.0, 0.4, &kin) * drift_map(2.0, kin.gamma())).plane_block(Plane::X);
    assert!((block_determinant(&cell) - 1.0).abs() < 1.0e-12);
    let transposed = [[cell[0][0], cell[1][0]], [cell[0][1], cell[1][1]]];

    let mut twiss = Twiss::new(4.0, -1.3, 1.0e-6);
    let mut sigma = twiss.covariance_block();
    for _ in 0..50 {
        sigma = block_multiply(&block_multiply(&cell, &sigma), &transposed);
        twiss = twiss.transform(&cell);
        let emittance = twiss.emittance;
        let (beta, alpha, gamma) = (
            sigma[0][0] / emittance,
            -sigma[0][1] / emittance,
            sigma[1][1] / emittance,
        );
        // beta * gamma - alpha^2 = 1 on the propagated moments
        assert!((beta * gamma - alpha * alpha - 1.0).abs() < 1.0e-9);
        assert!((beta / twiss.beta - 1.0).abs() < 1.0e-9);
        assert!((alpha - twiss.alpha).abs() < 1.0e-9);
    }
    assert!((twiss.emittance / 1.0e-6 - 1.0).abs() < 1.0e-10);
}
