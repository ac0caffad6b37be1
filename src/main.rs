//! fsmdsim - FSMD simulator
//!
//! Runs an FSMD description for a number of cycles, optionally driven by a
//! stimulus file, and prints the trace.

mod config;
mod report;

use clap::Parser;
use colored::Colorize;
use config::{ConfigError, OutputFormat, SimConfig};
use fsmdsim_core::{load_description, load_stimulus, CoreError, EndStateCheck, FiringMode, Simulator};
use report::{JsonRenderer, Renderer, TextRenderer};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fsmdsim")]
#[command(about = "Cycle-by-cycle simulator for finite-state machines with datapath")]
#[command(version)]
struct Cli {
    /// Number of cycles to simulate (zero or less runs none)
    #[arg(allow_negative_numbers = true)]
    iterations: i64,

    /// FSMD description file (JSON, YAML or XML)
    description: PathBuf,

    /// Stimulus file (JSON, YAML or XML)
    stimulus: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "FSMDSIM_CONFIG")]
    config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Stop at the first matching transition of each cycle
    #[arg(long)]
    first_match: bool,

    /// When to compare against the end state: pre_transition or post_cycle
    #[arg(long)]
    end_check: Option<EndStateCheck>,

    /// Defer unresolved references to the simulation instead of rejecting them
    #[arg(long)]
    lenient: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Omit the description summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Core(e) => e.error_code(),
            AppError::Io(_) => "IO_ERROR",
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} [{}] {}", "error:".red().bold(), e.code(), e);
            ExitCode::FAILURE
        }
    }
}

/// Applies command-line flags on top of the loaded configuration.
fn configure(cli: &Cli) -> Result<SimConfig, ConfigError> {
    let mut config = SimConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if cli.first_match {
        config.simulation.firing = FiringMode::FirstMatch;
    }
    if let Some(check) = cli.end_check {
        config.simulation.end_check = check;
    }
    if cli.lenient {
        config.simulation.strict = false;
    }
    if cli.no_color {
        config.output.color = false;
    }
    if cli.quiet {
        config.output.summary = false;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = configure(&cli)?;
    if !config.output.color {
        colored::control::set_override(false);
    }
    tracing::debug!("Simulation options: {:?}", config.sim_options());

    let definition = load_description(&cli.description, config.load_options())?;
    let stimulus = cli.stimulus.as_ref().map(load_stimulus).transpose()?;

    let stdout = io::stdout().lock();
    let mut renderer: Box<dyn Renderer> = match config.output.format {
        OutputFormat::Text => {
            if !is_terminal() {
                colored::control::set_override(false);
            }
            Box::new(TextRenderer::new(io::BufWriter::new(stdout)))
        }
        OutputFormat::Json => Box::new(JsonRenderer::new(io::BufWriter::new(stdout))),
    };

    if config.output.summary {
        renderer.description(&definition)?;
    }

    let mut sim = Simulator::new(&definition, stimulus.as_ref(), cli.iterations)?
        .with_options(config.sim_options());
    renderer.start(&sim.initial_snapshot())?;

    let mut output_error = None;
    let outcome = sim.run(&mut |snapshot: &fsmdsim_core::Snapshot| {
        if output_error.is_none() {
            output_error = renderer.cycle(snapshot).err();
        }
    });
    if let Some(e) = output_error {
        return Err(e.into());
    }

    renderer.finish(outcome.as_ref().copied())?;
    drop(renderer);
    io::stdout().flush()?;

    outcome.map(|_| ()).map_err(AppError::from)
}

fn is_terminal() -> bool {
    use std::io::IsTerminal;
    io::stdout().is_terminal()
}
