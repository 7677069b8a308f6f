pub mod linac;
pub mod ring;

pub use linac::{LinacOptics, LinacPoint};
pub use ring::{RingOptics, RingPoint, RingSummary, Stability};

use crate::common::constants::PI2;
use crate::domain::Plane;
use crate::probe::Twiss;
use crate::scenario::TrajectoryState;

/// Ellipse and accumulated betatron phase after each recorded state.
///
/// The first entry belongs to `states[0]` and carries `initial` with zero phase.
pub(crate) fn propagate_ellipse(
    states: &[TrajectoryState],
    initial: Twiss,
    plane: Plane,
) -> Vec<(Twiss, f64)> {
    let mut history = Vec::with_capacity(states.len());
    let mut twiss = initial;
    let mut phase = 0.0;
    history.push((twiss, phase));

    for state in states.iter().skip(1) {
        let block = state.step_map.plane_block(plane);
        let mut increment = twiss.phase_advance_through(&block);
        if increment < 0.0 {
            increment += PI2;
        }
        phase += increment;
        twiss = twiss.transform(&block);
        history.push((twiss, phase));
    }
    history
}
