//! Experiment driver shared by the `swarmsim` binary and its tests.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use swarmsim_core::{
    AgentConfig, EmergencePattern, Generation, SwarmConfig, SwarmEngine, SwarmMetrics,
};
use tracing::{debug, info};

/// Everything needed to reproduce one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    pub swarm: SwarmConfig,
    /// Randomly placed agents added after `initial_agents`.
    pub agents: usize,
    pub ticks: u64,
    /// Emit a report row every this many generations.
    pub report_every: u64,
    /// Explicit placements seeded before the random population.
    pub initial_agents: Vec<AgentConfig>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            swarm: SwarmConfig::default(),
            agents: 100,
            ticks: 500,
            report_every: 50,
            initial_agents: Vec::new(),
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.report_every == 0 {
            bail!("report_every must be at least 1");
        }
        self.swarm.validate().context("swarm configuration rejected")?;
        Ok(())
    }
}

/// One sampled point of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRow {
    pub generation: Generation,
    pub metrics: SwarmMetrics,
    pub patterns: Vec<EmergencePattern>,
    pub self_organization_level: f32,
}

impl ReportRow {
    fn sample(engine: &mut SwarmEngine) -> Self {
        let metrics = engine.get_swarm_metrics();
        let (patterns, self_organization_level) = engine
            .latest_report()
            .map(|report| {
                (
                    report.patterns_detected.iter().copied().collect::<Vec<_>>(),
                    report.self_organization_level,
                )
            })
            .unwrap_or_default();
        Self {
            generation: engine.generation(),
            metrics,
            patterns,
            self_organization_level,
        }
    }

    /// Single human-readable line.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let patterns = if self.patterns.is_empty() {
            "-".to_string()
        } else {
            self.patterns
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "gen {:>6} agents {:>5} speed {:>6.3} align {:>5.3} cohesion {:>5.3} sep {:>5.3} cluster {:>5.3} ci {:>5.3} patterns {}",
            self.generation.0,
            self.metrics.agent_count,
            self.metrics.average_speed,
            self.metrics.average_alignment,
            self.metrics.average_cohesion,
            self.metrics.separation_score,
            self.metrics.clustering_coefficient,
            self.metrics.collective_intelligence_index,
            patterns
        )
    }
}

/// Outcome of [`run_experiment`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentSummary {
    pub rows: Vec<ReportRow>,
    pub final_generation: Generation,
    pub final_metrics: SwarmMetrics,
    /// Generations at which at least one pattern was reported.
    pub emergent_generations: Vec<Generation>,
}

/// Parse a full or partial `SwarmConfig` from a JSON file.
pub fn load_swarm_config(path: &Path) -> Result<SwarmConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: SwarmConfig = serde_json::from_str(&data)
        .with_context(|| format!("config file {} did not contain valid JSON", path.display()))?;
    config
        .validate()
        .with_context(|| format!("config file {} rejected", path.display()))?;
    Ok(config)
}

/// Build the engine and seed it with explicit then random agents.
pub fn build_engine(config: &ExperimentConfig) -> Result<SwarmEngine> {
    config.validate()?;
    let mut engine =
        SwarmEngine::new(config.swarm.clone()).context("failed to construct swarm engine")?;
    for (slot, agent) in config.initial_agents.iter().enumerate() {
        engine
            .add_agent(*agent)
            .with_context(|| format!("initial agent {slot} rejected"))?;
    }
    for _ in 0..config.agents {
        engine.add_random_agent();
    }
    debug!(agents = engine.agent_count(), "swarm seeded");
    Ok(engine)
}

/// Run an experiment, handing each report row to `on_report` as it is produced.
pub fn run_experiment_with<F>(
    config: &ExperimentConfig,
    mut on_report: F,
) -> Result<ExperimentSummary>
where
    F: FnMut(&ReportRow) -> Result<()>,
{
    let mut engine = build_engine(config)?;
    info!(
        agents = engine.agent_count(),
        ticks = config.ticks,
        report_every = config.report_every,
        "experiment starting"
    );

    let mut rows = Vec::new();
    let mut record = |engine: &mut SwarmEngine| -> Result<()> {
        let row = ReportRow::sample(engine);
        on_report(&row)?;
        rows.push(row);
        Ok(())
    };

    record(&mut engine)?;
    for tick in 1..=config.ticks {
        engine.update_swarm();
        if tick % config.report_every == 0 || tick == config.ticks {
            record(&mut engine)?;
        }
    }

    let final_metrics = rows.last().map(|row| row.metrics).unwrap_or_default();
    let emergent_generations = rows
        .iter()
        .filter(|row| !row.patterns.is_empty())
        .map(|row| row.generation)
        .collect();
    let summary = ExperimentSummary {
        final_generation: engine.generation(),
        final_metrics,
        emergent_generations,
        rows,
    };
    info!(
        generation = summary.final_generation.0,
        collective_intelligence = summary.final_metrics.collective_intelligence_index,
        emergent_reports = summary.emergent_generations.len(),
        "experiment finished"
    );
    Ok(summary)
}

/// Run an experiment to completion and collect every report row.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentSummary> {
    run_experiment_with(config, |_| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_experiment_is_valid() {
        assert!(ExperimentConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_report_interval_is_rejected() {
        let config = ExperimentConfig {
            report_every: 0,
            ..ExperimentConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("report_every"));
    }

    #[test]
    fn rows_follow_report_interval_and_final_tick() {
        let config = ExperimentConfig {
            swarm: SwarmConfig {
                rng_seed: Some(21),
                ..SwarmConfig::default()
            },
            agents: 20,
            ticks: 12,
            report_every: 5,
            initial_agents: Vec::new(),
        };
        let summary = run_experiment(&config).expect("run");
        let generations: Vec<u64> = summary.rows.iter().map(|r| r.generation.0).collect();
        assert_eq!(generations, vec![0, 5, 10, 12]);
        assert_eq!(summary.final_generation, Generation(12));
        assert_eq!(summary.final_metrics.agent_count, 20);
    }

    #[test]
    fn summary_line_lists_patterns() {
        let row = ReportRow {
            generation: Generation(7),
            metrics: SwarmMetrics::default(),
            patterns: vec![EmergencePattern::Flocking, EmergencePattern::Wave],
            self_organization_level: 0.5,
        };
        let line = row.summary_line();
        assert!(line.starts_with("gen      7"));
        assert!(line.ends_with("patterns flocking,wave"));
    }
}
