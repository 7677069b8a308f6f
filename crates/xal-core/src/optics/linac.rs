use super::propagate_ellipse;
use crate::domain::{ModelResult, Plane};
use crate::probe::TwissSet;
use crate::scenario::Trajectory;
use serde::Serialize;

/// Beam ellipses at one recorded state of a single-pass trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinacPoint {
    pub element_id: String,
    pub position: f64,
    pub kinetic_energy: f64,
    pub twiss: TwissSet,
    /// Betatron phase accumulated from the start, per plane (x, y, z).
    pub phase: [f64; 3],
}

/// Envelope optics of a single pass from an initial set of ellipses.
#[derive(Debug, Clone, Copy)]
pub struct LinacOptics<'a> {
    trajectory: &'a Trajectory,
    initial: TwissSet,
}

impl<'a> LinacOptics<'a> {
    pub fn new(trajectory: &'a Trajectory, initial: TwissSet) -> ModelResult<Self> {
        initial.validate()?;
        Ok(Self {
            trajectory,
            initial,
        })
    }

    pub fn initial(&self) -> &TwissSet {
        &self.initial
    }

    /// Propagates `sigma = M sigma M^T` per plane through every recorded step.
    pub fn lattice_functions(&self) -> Vec<LinacPoint> {
        let states = self.trajectory.states();
        let [x, y, z] = Plane::ALL.map(|plane| {
            propagate_ellipse(states, *self.initial.get(plane), plane)
        });

        states
            .iter()
            .enumerate()
            .map(|(index, state)| LinacPoint {
                element_id: state.element_id.clone(),
                position: state.position,
                kinetic_energy: state.kinetic_energy(),
                twiss: TwissSet::new(x[index].0, y[index].0, z[index].0),
                phase: [x[index].1, y[index].1, z[index].1],
            })
            .collect()
    }

    pub fn final_twiss(&self) -> TwissSet {
        self.lattice_functions()
            .last()
            .map_or(self.initial, |point| point.twiss)
    }

    pub fn twiss_at_element(&self, element_id: &str) -> ModelResult<TwissSet> {
        let index = self.trajectory.require_element(element_id)?;
        Ok(self.lattice_functions()[index].twiss)
    }

    /// Total betatron phase advance over the pass for `plane`.
    pub fn phase_advance(&self, plane: Plane) -> f64 {
        self.lattice_functions()
            .last()
            .map_or(0.0, |point| point.phase[plane.index()])
    }
}
