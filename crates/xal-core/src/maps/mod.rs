pub mod alignment;
pub mod drift;
pub mod magnet;
pub mod rf_gap;
pub mod thin;

pub use alignment::apply_errors;
pub use drift::drift_map;
pub use magnet::{bend_body_map, bend_map, edge_map, quadrupole_focusing, quadrupole_map};
pub use rf_gap::{rf_gap_energy_gain, rf_gap_map};
pub use thin::{corrector_map, marker_map, thin_lens_map};

use crate::lattice::{Element, ElementKind};
use crate::phase::PhaseMatrix;
use crate::probe::Kinematics;

/// Portion of an element traversed in one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    pub length: f64,
    pub entry_face: bool,
    pub exit_face: bool,
}

impl Slice {
    pub fn whole(element: &Element) -> Self {
        Self {
            length: element.length,
            entry_face: true,
            exit_face: true,
        }
    }

    /// Lazily splits `element` into `count` equal slices, faces attached to the ends.
    pub fn split(element: &Element, count: usize) -> impl ExactSizeIterator<Item = Self> {
        let count = count.max(1);
        let length = element.length / count as f64;
        (0..count).map(move |index| Self {
            length,
            entry_face: index == 0,
            exit_face: index + 1 == count,
        })
    }
}

/// Map and exit kinematics of one propagation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementStep {
    pub map: PhaseMatrix,
    pub exit_kinematics: Kinematics,
}

pub trait ElementMapApi {
    fn transfer_map(&self, slice: &Slice, kinematics: &Kinematics) -> PhaseMatrix;

    fn energy_gain(&self, kinematics: &Kinematics) -> f64;

    fn step(&self, slice: &Slice, kinematics: &Kinematics) -> ElementStep {
        ElementStep {
            map: self.transfer_map(slice, kinematics),
            exit_kinematics: kinematics.accelerated(self.energy_gain(kinematics)),
        }
    }
}

impl ElementMapApi for Element {
    fn transfer_map(&self, slice: &Slice, kinematics: &Kinematics) -> PhaseMatrix {
        compute_transfer_map(self, slice, kinematics)
    }

    fn energy_gain(&self, kinematics: &Kinematics) -> f64 {
        match &self.kind {
            ElementKind::RfGap(params) => rf_gap_energy_gain(params, kinematics),
            _ => 0.0,
        }
    }
}

/// Transfer map of `slice` of `element`, alignment errors included.
pub fn compute_transfer_map(element: &Element, slice: &Slice, kinematics: &Kinematics) -> PhaseMatrix {
    let map = match &element.kind {
        ElementKind::Drift => drift_map(slice.length, kinematics.gamma()),
        ElementKind::Quadrupole(params) => quadrupole_map(params.gradient, slice.length, kinematics),
        ElementKind::Bend(params) => bend_map(
            params,
            element.length,
            slice.length,
            slice.entry_face,
            slice.exit_face,
            kinematics,
        ),
        ElementKind::RfGap(params) => rf_gap_map(params, kinematics),
        ElementKind::ThinLens(params) => thin_lens_map(params.integrated_strength),
        ElementKind::Corrector(params) => corrector_map(params.kick_x, params.kick_y),
        ElementKind::Marker => marker_map(),
    };

    if element.alignment.is_zero() {
        map
    } else {
        apply_errors(&map, &element.alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::{ElementMapApi, Slice, compute_transfer_map};
    use crate::lattice::{AlignmentErrors, Element};
    use crate::phase::PhaseMatrix;
    use crate::probe::{Kinematics, ParticleSpecies};

    fn kinematics() -> Kinematics {
        Kinematics::new(ParticleSpecies::Proton, 1.0e9).expect("kinematics")
    }

    #[test]
    fn split_slices_compose_to_whole_element() {
        let mut bend = Element::sector_bend("DH", 1.0, 2.0, 0.3);
        if let crate::lattice::ElementKind::Bend(params) = &mut bend.kind {
            params.entry_angle = 0.1;
            params.exit_angle = 0.05;
        }
        let whole = compute_transfer_map(&bend, &Slice::whole(&bend), &kinematics());
        let slices: Vec<Slice> = Slice::split(&bend, 4).collect();
        assert_eq!(Slice::split(&bend, 4).len(), 4);
        assert_eq!(slices[1], Slice::split(&bend, 4).nth(1).expect("second slice"));
        assert!(slices[0].entry_face && !slices[0].exit_face);
        assert!(slices[3].exit_face && !slices[3].entry_face);

        let composed = slices.iter().fold(PhaseMatrix::identity(), |acc, slice| {
            compute_transfer_map(&bend, slice, &kinematics()) * acc
        });
        assert!(composed.approx_eq(&whole, 1.0e-13, 1.0e-10));
    }

    #[test]
    fn misaligned_elements_carry_their_errors() {
        let quad = Element::quadrupole("Q", 0.5, 0.2, 5.0).with_alignment(AlignmentErrors {
            dy: 1.0e-3,
            ..AlignmentErrors::default()
        });
        let map = quad.transfer_map(&Slice::whole(&quad), &kinematics());
        assert!(map.translation_part().y().abs() > 0.0);
        assert!(map.translation_part().x().abs() < 1.0e-18);
    }

    #[test]
    fn only_rf_gaps_change_energy() {
        let gap = Element::rf_gap("RG", 0.0, 1.0e6, 0.0, 402.5e6);
        let step = gap.step(&Slice::whole(&gap), &kinematics());
        assert!((step.exit_kinematics.kinetic_energy() - 1.001e9).abs() < 1.0e-3);

        let marker = Element::marker("M", 0.0);
        assert_eq!(marker.energy_gain(&kinematics()), 0.0);
        assert_eq!(
            marker.transfer_map(&Slice::whole(&marker), &kinematics()),
            PhaseMatrix::identity()
        );
    }
}
