use crate::common::constants::LENGTH_EPSILON;
use crate::domain::{ModelError, ModelResult};
use crate::phase::PhaseMatrix;
use crate::probe::{Kinematics, Probe, ProbeResponse};
use serde::Serialize;

/// Identifier of the state recorded before the first element.
pub const START_STATE_ID: &str = "start";

/// Snapshot of the probe after one propagation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryState {
    pub element_id: String,
    /// Index into the lattice element list; `None` for the start state.
    pub element_index: Option<usize>,
    pub slice_index: usize,
    pub slice_count: usize,
    /// Longitudinal position at the end of the step, m.
    pub position: f64,
    pub kinematics: Kinematics,
    /// Map of the step since the previously recorded state.
    pub step_map: PhaseMatrix,
    pub cumulative_map: PhaseMatrix,
    pub response: ProbeResponse,
}

impl TrajectoryState {
    pub(crate) fn start(probe: &Probe) -> Self {
        Self {
            element_id: START_STATE_ID.to_string(),
            element_index: None,
            slice_index: 0,
            slice_count: 1,
            position: 0.0,
            kinematics: *probe.kinematics(),
            step_map: PhaseMatrix::identity(),
            cumulative_map: PhaseMatrix::identity(),
            response: *probe.response(),
        }
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.kinematics.kinetic_energy()
    }

    /// True for the state recorded at an element exit (or the start state).
    pub fn is_element_exit(&self) -> bool {
        self.slice_index + 1 == self.slice_count
    }
}

/// Ordered record of a completed scenario run. Never mutated after the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    lattice_id: String,
    length: f64,
    states: Vec<TrajectoryState>,
}

impl Trajectory {
    pub(crate) fn new(lattice_id: String, length: f64, states: Vec<TrajectoryState>) -> Self {
        Self {
            lattice_id,
            length,
            states,
        }
    }

    pub fn lattice_id(&self) -> &str {
        &self.lattice_id
    }

    /// Lattice length (ring circumference), m.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn states(&self) -> &[TrajectoryState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, index: usize) -> Option<&TrajectoryState> {
        self.states.get(index)
    }

    pub fn initial_state(&self) -> Option<&TrajectoryState> {
        self.states.first()
    }

    pub fn final_state(&self) -> Option<&TrajectoryState> {
        self.states.last()
    }

    /// Cumulative map of the whole run; the one-turn map for a ring.
    pub fn final_map(&self) -> PhaseMatrix {
        self.final_state()
            .map_or_else(PhaseMatrix::identity, |state| state.cumulative_map)
    }

    /// States recorded at element exits, in order, starting with the start state.
    pub fn element_states(&self) -> impl Iterator<Item = (usize, &TrajectoryState)> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_element_exit())
    }

    pub fn index_of_element(&self, element_id: &str) -> Option<usize> {
        self.states
            .iter()
            .rposition(|state| state.element_id == element_id)
    }

    /// Exit state of the element with `element_id`.
    pub fn state_for_element(&self, element_id: &str) -> Option<&TrajectoryState> {
        self.index_of_element(element_id)
            .and_then(|index| self.states.get(index))
    }

    /// Last state recorded at or before `position`.
    pub fn state_at_position(&self, position: f64) -> Option<&TrajectoryState> {
        let limit = position + LENGTH_EPSILON;
        let end = self.states.partition_point(|state| state.position <= limit);
        end.checked_sub(1).and_then(|index| self.states.get(index))
    }

    /// Map carrying the state at `from` to the state at `to`: `M_to * M_from^-1`.
    pub fn transfer_map_between(&self, from: usize, to: usize) -> ModelResult<PhaseMatrix> {
        let (Some(start), Some(end)) = (self.states.get(from), self.states.get(to)) else {
            return Err(ModelError::construction(
                "TRAJECTORY.INDEX",
                format!(
                    "state indices {from}..{to} outside trajectory of {} states",
                    self.states.len()
                ),
            ));
        };
        let inverse = start.cumulative_map.inverse().map_err(|error| {
            ModelError::singular_solve(
                "TRAJECTORY.INVERSE",
                format!("cumulative map at '{}' is not invertible: {error}", start.element_id),
            )
        })?;
        Ok(end.cumulative_map * inverse)
    }

    pub fn transfer_map_between_elements(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> ModelResult<PhaseMatrix> {
        let from = self.require_element(from_id)?;
        let to = self.require_element(to_id)?;
        self.transfer_map_between(from, to)
    }

    pub(crate) fn require_element(&self, element_id: &str) -> ModelResult<usize> {
        self.index_of_element(element_id).ok_or_else(|| {
            ModelError::construction(
                "TRAJECTORY.ELEMENT",
                format!(
                    "element '{element_id}' not found in trajectory for '{}'",
                    self.lattice_id
                ),
            )
        })
    }
}
