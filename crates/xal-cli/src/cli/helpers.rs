use super::CliError;
use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use xal_core::domain::ModelError;
use xal_core::lattice::{Lattice, LatticeSpec, ParameterSource, SnapshotParameters};
use xal_core::phase::PhaseVector;
use xal_core::probe::{Kinematics, ParticleSpecies, Probe, TwissSet};
use xal_core::scenario::{Scenario, ScenarioConfig, load_scenario_config};

/// Logs go to stderr so stdout stays a clean JSON report.
pub(super) fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

pub(super) fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, CliError> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} '{}'", path.display()))?;
    let value = serde_json::from_str(&source)
        .with_context(|| format!("failed to parse {what} '{}'", path.display()))?;
    Ok(value)
}

pub(super) fn load_lattice(path: &Path) -> Result<Lattice, CliError> {
    let spec: LatticeSpec = read_json(path, "lattice")?;
    Ok(Lattice::from_spec(spec)?)
}

pub(super) fn load_config(path: Option<&Path>) -> Result<ScenarioConfig, CliError> {
    match path {
        Some(path) => Ok(load_scenario_config(path).map_err(ModelError::from)?),
        None => Ok(ScenarioConfig::default()),
    }
}

pub(super) fn load_snapshot(path: Option<&Path>) -> Result<Option<SnapshotParameters>, CliError> {
    path.map(|path| read_json(path, "parameter snapshot"))
        .transpose()
}

/// Probe description read from JSON.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProbeFile {
    pub(super) species: ParticleSpecies,
    pub(super) kinetic_energy: f64,
    #[serde(default)]
    pub(super) response: ProbeRequest,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub(super) enum ProbeRequest {
    #[default]
    TransferMap,
    Particle {
        coordinates: [f64; 6],
    },
    Envelope {
        twiss: TwissSet,
        #[serde(default)]
        centroid: [f64; 6],
    },
}

impl ProbeFile {
    pub(super) fn kinematics(&self) -> Result<Kinematics, CliError> {
        Ok(Kinematics::new(self.species, self.kinetic_energy)?)
    }

    pub(super) fn probe(&self) -> Result<Probe, CliError> {
        let kinematics = self.kinematics()?;
        let probe = match &self.response {
            ProbeRequest::TransferMap => Probe::transfer_map(kinematics),
            ProbeRequest::Particle { coordinates } => {
                Probe::particle(kinematics, PhaseVector::new(*coordinates))
            }
            ProbeRequest::Envelope { twiss, centroid } => {
                Probe::envelope(kinematics, twiss, PhaseVector::new(*centroid))?
            }
        };
        Ok(probe)
    }

    pub(super) fn initial_twiss(&self) -> Option<TwissSet> {
        match &self.response {
            ProbeRequest::Envelope { twiss, .. } => Some(*twiss),
            _ => None,
        }
    }
}

pub(super) fn load_probe(path: &Path) -> Result<ProbeFile, CliError> {
    read_json(path, "probe")
}

/// Lattice, run options and live parameters assembled into a ready scenario.
pub(super) fn build_scenario(
    lattice: &Path,
    config: Option<&Path>,
    snapshot: Option<&Path>,
) -> Result<Scenario, CliError> {
    let lattice = load_lattice(lattice)?;
    let config = load_config(config)?;
    let snapshot = load_snapshot(snapshot)?;
    let source = snapshot
        .as_ref()
        .map(|snapshot| snapshot as &dyn ParameterSource);
    Ok(Scenario::synchronized(lattice, config, source)?)
}

pub(super) fn write_report<T: Serialize>(report: &T, output: Option<&PathBuf>) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(report).context("failed to serialize JSON report")?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create report directory '{}'", parent.display())
                })?;
            }
            fs::write(path, rendered + "\n")
                .with_context(|| format!("failed to write report '{}'", path.display()))?;
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
