use super::CliError;
use super::helpers::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use xal_core::domain::{ModelError, Plane};
use xal_core::fit::{
    BetatronCoordinates, BetatronMapper, SinusoidFit, SinusoidFitConfig, fit_damped_sinusoid,
};
use xal_core::lattice::SynchronizationMode;
use xal_core::optics::{LinacOptics, LinacPoint, RingOptics, RingSummary};
use xal_core::phase::PhaseMatrix;
use xal_core::probe::ProbeResponse;

#[derive(clap::Args)]
pub(super) struct ScenarioInputs {
    /// Lattice description (JSON)
    #[arg(long)]
    lattice: PathBuf,

    /// Probe description (JSON): species, kinetic energy, response mode
    #[arg(long)]
    probe: PathBuf,

    /// Scenario options (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Live parameter snapshot (JSON) used by the rfDesign and live sync modes
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct PropagateArgs {
    #[command(flatten)]
    inputs: ScenarioInputs,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct RingArgs {
    #[command(flatten)]
    inputs: ScenarioInputs,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(super) enum TransversePlane {
    X,
    Y,
}

impl From<TransversePlane> for Plane {
    fn from(plane: TransversePlane) -> Self {
        match plane {
            TransversePlane::X => Plane::X,
            TransversePlane::Y => Plane::Y,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct FitArgs {
    /// Turn-by-turn readings (JSON array of numbers)
    #[arg(long)]
    signal: PathBuf,

    /// Fit options (JSON)
    #[arg(long)]
    fit_config: Option<PathBuf>,

    /// Ring lattice used to map the fit back to another location
    #[arg(long)]
    lattice: Option<PathBuf>,

    /// Probe description (JSON) for the ring run
    #[arg(long, requires = "lattice")]
    probe: Option<PathBuf>,

    /// Scenario options (JSON) for the ring run
    #[arg(long, requires = "lattice")]
    config: Option<PathBuf>,

    /// Live parameter snapshot (JSON) for the ring run
    #[arg(long, requires = "lattice")]
    snapshot: Option<PathBuf>,

    /// Element id of the BPM that recorded the signal
    #[arg(long, requires = "lattice")]
    bpm: Option<String>,

    /// Element id to reconstruct the betatron coordinates at
    #[arg(long, requires = "lattice")]
    target: Option<String>,

    /// Plane the BPM signal belongs to
    #[arg(long, value_enum, default_value = "x")]
    plane: TransversePlane,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateReport<'a> {
    element_id: &'a str,
    position: f64,
    slice_index: usize,
    kinetic_energy: f64,
    response: &'a ProbeResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PropagationReport<'a> {
    lattice: &'a str,
    sync_mode: SynchronizationMode,
    length: f64,
    final_map: PhaseMatrix,
    states: Vec<StateReport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optics: Option<Vec<LinacPoint>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RingReport<'a> {
    lattice: &'a str,
    sync_mode: SynchronizationMode,
    #[serde(flatten)]
    summary: RingSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FitReport {
    fit: SinusoidFit,
    #[serde(skip_serializing_if = "Option::is_none")]
    mapped: Option<BetatronCoordinates>,
}

pub(super) fn run_propagate_command(args: PropagateArgs) -> Result<i32, CliError> {
    let inputs = &args.inputs;
    let scenario = build_scenario(
        &inputs.lattice,
        inputs.config.as_deref(),
        inputs.snapshot.as_deref(),
    )?;
    let probe_file = load_probe(&inputs.probe)?;
    let trajectory = scenario.run_to_completion(&probe_file.probe()?)?;

    let optics = probe_file
        .initial_twiss()
        .map(|twiss| LinacOptics::new(&trajectory, twiss))
        .transpose()?
        .map(|optics| optics.lattice_functions());

    let report = PropagationReport {
        lattice: trajectory.lattice_id(),
        sync_mode: scenario.config().sync_mode,
        length: trajectory.length(),
        final_map: trajectory.final_map(),
        states: trajectory
            .states()
            .iter()
            .map(|state| StateReport {
                element_id: &state.element_id,
                position: state.position,
                slice_index: state.slice_index,
                kinetic_energy: state.kinetic_energy(),
                response: &state.response,
            })
            .collect(),
        optics,
    };
    write_report(&report, args.output.as_ref())?;
    info!(states = trajectory.len(), "propagation report written");
    Ok(0)
}

pub(super) fn run_ring_command(args: RingArgs) -> Result<i32, CliError> {
    let inputs = &args.inputs;
    let scenario = build_scenario(
        &inputs.lattice,
        inputs.config.as_deref(),
        inputs.snapshot.as_deref(),
    )?;
    let probe = load_probe(&inputs.probe)?.probe()?;
    let trajectory = scenario.run_to_completion(&probe)?;
    let ring = RingOptics::with_tolerance(&trajectory, scenario.config().stability_tolerance);

    let report = RingReport {
        lattice: trajectory.lattice_id(),
        sync_mode: scenario.config().sync_mode,
        summary: ring.summary()?,
    };
    write_report(&report, args.output.as_ref())?;
    // Non-stable planes fail the command after the report is written.
    if !report.summary.is_stable() {
        for plane in Plane::TRANSVERSE {
            ring.phase_advance(plane)?;
        }
    }
    Ok(0)
}

pub(super) fn run_fit_command(args: FitArgs) -> Result<i32, CliError> {
    let signal: Vec<f64> = read_json(&args.signal, "signal")?;
    let config = match args.fit_config.as_deref() {
        Some(path) => read_json(path, "fit config")?,
        None => SinusoidFitConfig::default(),
    };
    let fit = fit_damped_sinusoid(&signal, &config).map_err(ModelError::from)?;
    info!(
        frequency = fit.frequency,
        iterations = fit.iterations,
        "sinusoid fitted"
    );

    let mapped = match (&args.lattice, &args.probe, &args.bpm, &args.target) {
        (Some(lattice), Some(probe), Some(bpm), Some(target)) => {
            let scenario =
                build_scenario(lattice, args.config.as_deref(), args.snapshot.as_deref())?;
            let probe = load_probe(probe)?.probe()?;
            let trajectory = scenario.run_to_completion(&probe)?;
            let ring =
                RingOptics::with_tolerance(&trajectory, scenario.config().stability_tolerance);
            let mapper = BetatronMapper::new(&ring, args.plane.into())?;
            Some(mapper.map(&fit, bpm, target)?)
        }
        (None, ..) => None,
        _ => {
            return Err(CliError::Usage(
                "--lattice needs --probe, --bpm and --target".to_string(),
            ));
        }
    };

    write_report(&FitReport { fit, mapped }, args.output.as_ref())?;
    Ok(0)
}
