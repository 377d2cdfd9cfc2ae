use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use swarmsim_app::{ExperimentConfig, load_swarm_config, run_experiment_with};
use swarmsim_core::IndexKind;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "swarmsim",
    version,
    about = "Run a flocking swarm and report emergent behaviour"
)]
struct Cli {
    /// Number of randomly placed agents.
    #[arg(long, env = "SWARMSIM_AGENTS", default_value_t = 100)]
    agents: usize,
    /// Generations to simulate.
    #[arg(long, env = "SWARMSIM_TICKS", default_value_t = 500)]
    ticks: u64,
    /// Emit a report every N generations.
    #[arg(long, env = "SWARMSIM_REPORT_EVERY", default_value_t = 50)]
    report_every: u64,
    /// RNG seed for reproducible placement.
    #[arg(long, env = "SWARMSIM_SEED")]
    seed: Option<u64>,
    /// Arena width; overrides the config file.
    #[arg(long)]
    width: Option<f32>,
    /// Arena height; overrides the config file.
    #[arg(long)]
    height: Option<f32>,
    /// JSON file holding a full or partial swarm configuration.
    #[arg(long, env = "SWARMSIM_CONFIG")]
    config: Option<PathBuf>,
    /// Use a uniform grid neighbor index with this cell size.
    #[arg(long)]
    grid_cell: Option<f32>,
    /// Print one JSON object per report instead of a text table.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn experiment(&self) -> Result<ExperimentConfig> {
        let mut swarm = match &self.config {
            Some(path) => load_swarm_config(path)?,
            None => Default::default(),
        };
        if let Some(width) = self.width {
            swarm.width = width;
        }
        if let Some(height) = self.height {
            swarm.height = height;
        }
        if self.seed.is_some() {
            swarm.rng_seed = self.seed;
        }
        if let Some(cell_size) = self.grid_cell {
            swarm.neighbor_index = IndexKind::UniformGrid { cell_size };
        }
        Ok(ExperimentConfig {
            swarm,
            agents: self.agents,
            ticks: self.ticks,
            report_every: self.report_every,
            initial_agents: Vec::new(),
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let experiment = cli.experiment()?;
    info!(
        agents = experiment.agents,
        ticks = experiment.ticks,
        seed = ?experiment.swarm.rng_seed,
        "Starting swarm experiment"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = run_experiment_with(&experiment, |row| {
        if cli.json {
            let line = serde_json::to_string(row).context("failed to encode report row")?;
            writeln!(out, "{line}")?;
        } else {
            writeln!(out, "{}", row.summary_line())?;
        }
        Ok(())
    })?;
    out.flush()?;

    if !cli.json {
        println!(
            "finished at generation {} with {} emergent report(s)",
            summary.final_generation.0,
            summary.emergent_generations.len()
        );
    }
    Ok(())
}
