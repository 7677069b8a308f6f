mod commands;
mod helpers;

use clap::Parser;
use xal_core::domain::ModelError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let model_error = error.as_model_error();
            eprintln!("{}", model_error.diagnostic_line());
            model_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "xal-optics", version, about = "Transfer-map beam optics engine")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Propagate a probe through a lattice and report every recorded state
    Propagate(commands::PropagateArgs),
    /// Treat the lattice as a ring: tunes, periodic Twiss, closed orbit, dispersion
    Ring(commands::RingArgs),
    /// Fit a damped sinusoid to turn-by-turn BPM data
    Fit(commands::FitArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Propagate(args) => commands::run_propagate_command(args),
        CliCommand::Ring(args) => commands::run_ring_command(args),
        CliCommand::Fit(args) => commands::run_fit_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(#[from] ModelError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_model_error(&self) -> ModelError {
        match self {
            Self::Usage(message) => ModelError::construction("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ModelError::construction("IO.CLI", format!("{error:#}")),
        }
    }
}
