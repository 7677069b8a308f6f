pub mod cancel;
pub mod config;
pub mod trajectory;

pub use cancel::CancellationToken;
pub use config::{ConfigError, DEFAULT_STABILITY_TOLERANCE, ScenarioConfig, load_scenario_config};
pub use trajectory::{START_STATE_ID, Trajectory, TrajectoryState};

use crate::domain::{ModelError, ModelResult};
use crate::lattice::{Element, Lattice, ParameterSource, resync};
use crate::maps::{ElementMapApi, Slice};
use crate::phase::PhaseMatrix;
use crate::probe::{Probe, ProbeResponse};
use tracing::{debug, info, warn};

/// A lattice bound to run options, ready to propagate probes.
///
/// The design lattice is kept so the scenario can be resynchronized against
/// fresh live values without rebuilding it.
#[derive(Debug, Clone)]
pub struct Scenario {
    design: Lattice,
    resolved: Lattice,
    config: ScenarioConfig,
}

impl Scenario {
    pub fn new(lattice: Lattice, config: ScenarioConfig) -> ModelResult<Self> {
        config.validate()?;
        for element in lattice.elements() {
            element_slice_count(&config, element)?;
        }
        Ok(Self {
            resolved: lattice.clone(),
            design: lattice,
            config,
        })
    }

    /// Builds the scenario and resolves parameters for `config.sync_mode`.
    pub fn synchronized(
        lattice: Lattice,
        config: ScenarioConfig,
        source: Option<&dyn ParameterSource>,
    ) -> ModelResult<Self> {
        let mut scenario = Self::new(lattice, config)?;
        scenario.resync(source)?;
        Ok(scenario)
    }

    pub fn resync(&mut self, source: Option<&dyn ParameterSource>) -> ModelResult<()> {
        self.resolved = resync(&self.design, self.config.sync_mode, source)?;
        Ok(())
    }

    pub fn lattice(&self) -> &Lattice {
        &self.resolved
    }

    pub fn design_lattice(&self) -> &Lattice {
        &self.design
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn run_to_completion(&self, probe: &Probe) -> ModelResult<Trajectory> {
        self.run(probe, &CancellationToken::new())
    }

    /// Propagates `probe` through every element in one forward pass.
    pub fn run(&self, probe: &Probe, cancel: &CancellationToken) -> ModelResult<Trajectory> {
        let lattice = &self.resolved;
        info!(
            lattice = lattice.id(),
            elements = lattice.len(),
            mode = probe.response().mode_name(),
            sync = %self.config.sync_mode,
            "scenario run started"
        );

        let mut states = vec![TrajectoryState::start(probe)];
        let mut current = *probe;
        let mut cumulative = PhaseMatrix::identity();

        for (index, element) in lattice.elements().iter().enumerate() {
            if cancel.is_cancelled() {
                info!(lattice = lattice.id(), element = %element.id, "scenario run cancelled");
                return Err(ModelError::cancelled(
                    "RUN.CANCELLED",
                    format!(
                        "run over '{}' cancelled before element '{}' ({index} of {})",
                        lattice.id(),
                        element.id,
                        lattice.len()
                    ),
                ));
            }

            let slice_count = element_slice_count(&self.config, element)?;
            let mut position = element.entrance();
            let mut pending = PhaseMatrix::identity();

            for (slice_index, slice) in Slice::split(element, slice_count).enumerate() {
                let step = element.step(&slice, current.kinematics());
                cumulative = step.map * cumulative;
                pending = step.map * pending;
                position += slice.length;
                current = current.advance(&step.map, step.exit_kinematics);

                if self.config.record_slices || slice_index + 1 == slice_count {
                    states.push(TrajectoryState {
                        element_id: element.id.clone(),
                        element_index: Some(index),
                        slice_index,
                        slice_count,
                        position,
                        kinematics: *current.kinematics(),
                        step_map: pending,
                        cumulative_map: cumulative,
                        response: *current.response(),
                    });
                    pending = PhaseMatrix::identity();
                }
            }

            check_aperture(element, current.response());
            debug!(
                element = %element.id,
                kind = element.kind.type_name(),
                slices = slice_count,
                position,
                energy = current.kinematics().kinetic_energy(),
                "element traversed"
            );
        }

        info!(
            lattice = lattice.id(),
            states = states.len(),
            energy = current.kinematics().kinetic_energy(),
            "scenario run finished"
        );
        Ok(Trajectory::new(
            lattice.id().to_string(),
            lattice.length(),
            states,
        ))
    }
}

fn element_slice_count(config: &ScenarioConfig, element: &Element) -> ModelResult<usize> {
    if element.kind.is_thin() {
        return Ok(1);
    }
    config.slice_count(element.length).map_err(|error| {
        ModelError::construction(
            error.placeholder(),
            format!("element '{}': {}", element.id, error.message()),
        )
    })
}

fn check_aperture(element: &Element, response: &ProbeResponse) {
    let (Some(aperture), ProbeResponse::Particle { coordinates }) = (element.aperture, response)
    else {
        return;
    };
    if coordinates.x().abs() > aperture || coordinates.y().abs() > aperture {
        warn!(
            element = %element.id,
            aperture,
            x = coordinates.x(),
            y = coordinates.y(),
            "particle outside element aperture"
        );
    }
}
