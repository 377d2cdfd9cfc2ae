//! The swarm engine: owns the agents and exposes the simulation operations.

use std::collections::VecDeque;
use std::fmt;

use rand::{Rng, rngs::SmallRng};
use rayon::prelude::*;
use swarmsim_index::NeighborhoodIndex;
use tracing::{debug, trace, warn};

use crate::agent::{
    AgentArena, AgentConfig, AgentData, AgentId, Generation, SteeringParams, SwarmAgent,
};
use crate::config::{SwarmConfig, SwarmError};
use crate::emergence::{self, EmergenceReport};
use crate::forces::{Frame, Integrated, SteeringForces, integrate, wrap_coordinate};
use crate::metrics::{self, MotionStats, SwarmMetrics};
use crate::vector::Vector2D;

/// Result of one metrics pass over the current agents.
#[derive(Debug, Clone, Copy)]
struct Evaluation {
    stats: MotionStats,
    collective_intelligence: f32,
}

/// Flocking simulation over a toroidal arena.
pub struct SwarmEngine {
    config: SwarmConfig,
    generation: Generation,
    rng: SmallRng,
    agents: AgentArena,
    index: Box<dyn NeighborhoodIndex>,
    history: VecDeque<EmergenceReport>,
}

impl fmt::Debug for SwarmEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwarmEngine")
            .field("config", &self.config)
            .field("generation", &self.generation)
            .field("agent_count", &self.agents.len())
            .field("index", &self.index.name())
            .finish()
    }
}

impl SwarmEngine {
    /// Instantiate an engine, seeding its RNG from the configuration.
    pub fn new(config: SwarmConfig) -> Result<Self, SwarmError> {
        config.validate()?;
        let rng = config.seeded_rng();
        Self::with_rng(config, rng)
    }

    /// Instantiate an engine that draws default placements from `rng`.
    pub fn with_rng(config: SwarmConfig, rng: SmallRng) -> Result<Self, SwarmError> {
        config.validate()?;
        let index = config.neighbor_index.build()?;
        debug!(
            width = config.width,
            height = config.height,
            index = index.name(),
            "swarm engine initialised"
        );
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            generation: Generation::zero(),
            rng,
            agents: AgentArena::new(),
            index,
            history: VecDeque::with_capacity(history_capacity.min(1_024)),
        })
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Arena `(width, height)`.
    #[must_use]
    pub fn bounds(&self) -> (f32, f32) {
        (self.config.width, self.config.height)
    }

    /// Arena midpoint, the reference for fitness and rotation.
    #[must_use]
    pub fn center(&self) -> Vector2D {
        Vector2D::new(self.config.width / 2.0, self.config.height / 2.0)
    }

    /// Ticks since construction or the last clear.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Number of live agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Iterate over retained emergence reports, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &EmergenceReport> {
        self.history.iter()
    }

    /// Most recent emergence report, if any.
    #[must_use]
    pub fn latest_report(&self) -> Option<&EmergenceReport> {
        self.history.back()
    }

    /// Add an agent, filling unset fields from the defaults and the engine RNG.
    pub fn add_agent(&mut self, overrides: AgentConfig) -> Result<AgentId, SwarmError> {
        let defaults = self.config.agent_defaults;
        let params = SteeringParams {
            max_force: overrides.max_force.unwrap_or(defaults.max_force),
            max_speed: overrides.max_speed.unwrap_or(defaults.max_speed),
            perception_radius: overrides
                .perception_radius
                .unwrap_or(defaults.perception_radius),
            separation_radius: overrides
                .separation_radius
                .unwrap_or(defaults.separation_radius),
        };
        if let Some(msg) = params.invalid_field() {
            return Err(SwarmError::InvalidAgent(msg));
        }
        let position = match overrides.position {
            Some(p) if !p.is_finite() => {
                return Err(SwarmError::InvalidAgent("position must be finite"));
            }
            Some(p) => Vector2D::new(
                wrap_coordinate(p.x, self.config.width),
                wrap_coordinate(p.y, self.config.height),
            ),
            None => self.random_position(),
        };
        let velocity = match overrides.velocity {
            Some(v) if !v.is_finite() => {
                return Err(SwarmError::InvalidAgent("velocity must be finite"));
            }
            Some(v) => v,
            None => self.random_velocity(),
        };
        let id = self.agents.insert(AgentData {
            position,
            velocity,
            params,
            role: overrides.role.unwrap_or(defaults.role),
        });
        trace!(?id, x = position.x, y = position.y, "agent added");
        Ok(id)
    }

    /// Add an agent with every field defaulted or randomised.
    pub fn add_random_agent(&mut self) -> AgentId {
        let defaults = self.config.agent_defaults;
        let position = self.random_position();
        let velocity = self.random_velocity();
        self.agents.insert(AgentData {
            position,
            velocity,
            params: defaults.params(),
            role: defaults.role,
        })
    }

    fn random_position(&mut self) -> Vector2D {
        let x = self.rng.random_range(0.0..self.config.width);
        let y = self.rng.random_range(0.0..self.config.height);
        Vector2D::new(x, y)
    }

    fn random_velocity(&mut self) -> Vector2D {
        let range = self.config.agent_defaults.initial_speed_range;
        let vx = self.rng.random_range(-range..=range);
        let vy = self.rng.random_range(-range..=range);
        Vector2D::new(vx, vy)
    }

    /// Remove a single agent, returning its final state.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<SwarmAgent> {
        let removed = self.agents.remove(id);
        if removed.is_some() {
            trace!(?id, "agent removed");
        }
        removed
    }

    /// Owned copy of one agent.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<SwarmAgent> {
        self.agents.snapshot(id)
    }

    /// Owned copies of all agents; mutating them does not affect the engine.
    #[must_use]
    pub fn get_agents(&self) -> Vec<SwarmAgent> {
        self.agents.snapshot_all()
    }

    /// Drop every agent and reset the clock and report history.
    pub fn clear_agents(&mut self) {
        debug!(
            agents = self.agents.len(),
            generation = self.generation.0,
            "clearing swarm"
        );
        self.agents.clear();
        self.history.clear();
        self.generation = Generation::zero();
    }

    fn rebuild_index(&mut self) {
        let positions: Vec<(f32, f32)> = self
            .agents
            .columns()
            .positions()
            .iter()
            .map(|p| p.as_tuple())
            .collect();
        if let Err(err) = self.index.rebuild(&positions) {
            warn!(
                %err,
                index = self.index.name(),
                "neighbor index rebuild failed; treating agents as isolated"
            );
            self.index.rebuild(&[]).ok();
        }
    }

    /// Advance every agent by one tick against the same pre-tick snapshot.
    pub fn update_swarm(&mut self) {
        if !self.agents.is_empty() {
            self.rebuild_index();
            let weights = self.config.weights;
            let bounds = self.bounds();
            let columns = self.agents.columns();
            let frame = Frame {
                positions: columns.positions(),
                velocities: columns.velocities(),
                params: columns.params(),
                index: self.index.as_ref(),
            };
            let results: Vec<Integrated> = (0..frame.len())
                .into_par_iter()
                .map(|idx| {
                    let acceleration =
                        SteeringForces::evaluate(&frame, idx).acceleration(&weights);
                    integrate(
                        frame.positions[idx],
                        frame.velocities[idx],
                        acceleration,
                        frame.params[idx].max_speed,
                        bounds,
                    )
                })
                .collect();

            let columns = self.agents.columns_mut();
            {
                let accelerations = columns.accelerations_mut();
                for (idx, result) in results.iter().enumerate() {
                    accelerations[idx] = result.acceleration;
                }
            }
            {
                let velocities = columns.velocities_mut();
                for (idx, result) in results.iter().enumerate() {
                    velocities[idx] = result.velocity;
                }
            }
            {
                let positions = columns.positions_mut();
                for (idx, result) in results.iter().enumerate() {
                    positions[idx] = result.position;
                }
            }
        }
        self.generation = self.generation.next();
        trace!(
            generation = self.generation.0,
            agents = self.agents.len(),
            "swarm advanced"
        );
    }

    /// Single metrics pass; also refreshes each agent's fitness.
    fn evaluate(&mut self) -> Evaluation {
        self.rebuild_index();
        let diagonal = self.config.diagonal();
        let center = self.center();
        let cluster_min_size = self.config.thresholds.cluster_min_size;
        let columns = self.agents.columns();
        let frame = Frame {
            positions: columns.positions(),
            velocities: columns.velocities(),
            params: columns.params(),
            index: self.index.as_ref(),
        };
        let stats = MotionStats::compute(&frame, diagonal, cluster_min_size);
        let fitness = metrics::fitness_scores(&frame, center, diagonal);
        let collective_intelligence = metrics::collective_intelligence(&stats, &fitness);
        self.agents
            .columns_mut()
            .fitness_mut()
            .copy_from_slice(&fitness);
        Evaluation {
            stats,
            collective_intelligence,
        }
    }

    fn record_report(&mut self, evaluation: &Evaluation) -> EmergenceReport {
        let thresholds = self.config.thresholds;
        let columns = self.agents.columns();
        let patterns = emergence::detect_patterns(
            &evaluation.stats,
            columns.positions(),
            columns.velocities(),
            self.center(),
            &thresholds,
        );
        let report = EmergenceReport::new(
            self.generation,
            patterns,
            evaluation.collective_intelligence,
            emergence::self_organization_level(
                self.generation,
                evaluation.stats.clustering_coefficient,
                thresholds.maturity_generations,
            ),
        );
        if report.has_emergence {
            debug!(
                generation = self.generation.0,
                patterns = %report.pattern_names(),
                collective_intelligence = report.collective_intelligence,
                "emergence detected"
            );
        }
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(report.clone());
        report
    }

    /// Classify current motion patterns and append the report to history.
    pub fn detect_emergence(&mut self) -> EmergenceReport {
        let evaluation = self.evaluate();
        self.record_report(&evaluation)
    }

    /// Group performance relative to the best individual, in `[0, 2]`.
    pub fn calculate_collective_intelligence(&mut self) -> f32 {
        self.evaluate().collective_intelligence
    }

    /// Fresh metrics snapshot; runs emergence detection as part of the pass.
    pub fn get_swarm_metrics(&mut self) -> SwarmMetrics {
        let evaluation = self.evaluate();
        let report = self.record_report(&evaluation);
        let stats = evaluation.stats;
        SwarmMetrics {
            agent_count: stats.agent_count,
            average_speed: stats.average_speed,
            average_cohesion: stats.average_cohesion,
            average_alignment: stats.average_alignment,
            separation_score: stats.separation_score,
            clustering_coefficient: stats.clustering_coefficient,
            emergence_detected: report.has_emergence,
            collective_intelligence_index: evaluation.collective_intelligence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRole;
    use crate::emergence::EmergencePattern;
    use rand::SeedableRng;
    use swarmsim_index::IndexKind;

    fn seeded(seed: u64) -> SwarmConfig {
        SwarmConfig {
            rng_seed: Some(seed),
            ..SwarmConfig::default()
        }
    }

    #[test]
    fn engine_initialises_from_config() {
        let engine = SwarmEngine::new(seeded(1)).expect("engine");
        assert_eq!(engine.agent_count(), 0);
        assert_eq!(engine.generation(), Generation(0));
        assert_eq!(engine.bounds(), (800.0, 600.0));
        assert_eq!(engine.center(), Vector2D::new(400.0, 300.0));
        assert_eq!(engine.history().count(), 0);
        assert_eq!(engine.config().rng_seed, Some(1));
    }

    #[test]
    fn invalid_grid_is_rejected_at_construction() {
        let config = SwarmConfig {
            neighbor_index: IndexKind::UniformGrid { cell_size: 0.0 },
            ..SwarmConfig::default()
        };
        assert!(matches!(
            SwarmEngine::new(config),
            Err(SwarmError::Index(_))
        ));
    }

    #[test]
    fn random_agents_use_defaults_within_bounds() {
        let mut engine = SwarmEngine::new(seeded(7)).expect("engine");
        for _ in 0..50 {
            engine.add_random_agent();
        }
        for agent in engine.get_agents() {
            assert!((0.0..800.0).contains(&agent.position.x));
            assert!((0.0..600.0).contains(&agent.position.y));
            assert!(agent.velocity.x.abs() <= 2.0 && agent.velocity.y.abs() <= 2.0);
            assert_eq!(agent.max_force, 0.1);
            assert_eq!(agent.max_speed, 4.0);
            assert_eq!(agent.perception_radius, 50.0);
            assert_eq!(agent.separation_radius, 25.0);
            assert_eq!(agent.role, AgentRole::Follower);
            assert_eq!(agent.fitness, 0.0);
            assert_eq!(agent.acceleration, Vector2D::ZERO);
        }
    }

    #[test]
    fn add_agent_honours_overrides_and_wraps_position() {
        let mut engine = SwarmEngine::new(seeded(3)).expect("engine");
        let id = engine
            .add_agent(
                AgentConfig::at(Vector2D::new(-10.0, 610.0), Vector2D::new(1.0, 1.0))
                    .with_role(AgentRole::Scout)
                    .with_max_speed(6.0)
                    .with_perception_radius(80.0)
                    .with_separation_radius(10.0),
            )
            .expect("agent");
        let agent = engine.agent(id).expect("snapshot");
        assert_eq!(agent.position, Vector2D::new(790.0, 10.0));
        assert_eq!(agent.role, AgentRole::Scout);
        assert_eq!(agent.max_speed, 6.0);
        assert_eq!(agent.max_force, 0.1);
        assert_eq!(agent.perception_radius, 80.0);
        assert_eq!(agent.separation_radius, 10.0);
    }

    #[test]
    fn huge_initial_velocity_is_clamped_to_max_speed() {
        let mut engine = SwarmEngine::new(seeded(19)).expect("engine");
        let id = engine
            .add_agent(AgentConfig::at(
                Vector2D::new(100.0, 100.0),
                Vector2D::new(1e20, 1e20),
            ))
            .expect("agent");
        let metrics = engine.get_swarm_metrics();
        assert!(metrics.average_speed.is_finite());

        engine.update_swarm();
        let agent = engine.agent(id).expect("agent");
        assert!((agent.velocity.magnitude() - 4.0).abs() < 1e-4);
        assert!((agent.velocity.x - agent.velocity.y).abs() < 1e-5);
        assert!(agent.velocity.x > 0.0);
        let moved = agent.position - Vector2D::new(100.0, 100.0);
        assert!((moved.magnitude() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn add_agent_rejects_malformed_limits() {
        let mut engine = SwarmEngine::new(seeded(3)).expect("engine");
        let err = engine
            .add_agent(AgentConfig::default().with_max_speed(0.0))
            .unwrap_err();
        assert_eq!(
            err,
            SwarmError::InvalidAgent("max_speed must be positive and finite")
        );
        let err = engine
            .add_agent(AgentConfig::at(
                Vector2D::new(f32::NAN, 1.0),
                Vector2D::ZERO,
            ))
            .unwrap_err();
        assert_eq!(err, SwarmError::InvalidAgent("position must be finite"));
        assert_eq!(engine.agent_count(), 0);
    }

    #[test]
    fn remove_agent_drops_single_agent() {
        let mut engine = SwarmEngine::new(seeded(5)).expect("engine");
        let a = engine.add_random_agent();
        let b = engine.add_random_agent();
        let removed = engine.remove_agent(a).expect("removed");
        assert_eq!(removed.id, a);
        assert_eq!(engine.agent_count(), 1);
        assert!(engine.agent(b).is_some());
        assert!(engine.remove_agent(a).is_none());
        engine.update_swarm();
        assert_eq!(engine.generation(), Generation(1));
    }

    #[test]
    fn update_on_empty_swarm_still_advances_generation() {
        let mut engine = SwarmEngine::new(seeded(2)).expect("engine");
        engine.update_swarm();
        engine.update_swarm();
        assert_eq!(engine.generation(), Generation(2));
    }

    #[test]
    fn evaluation_refreshes_fitness() {
        let mut engine = SwarmEngine::new(seeded(11)).expect("engine");
        let id = engine
            .add_agent(AgentConfig::at(
                Vector2D::new(400.0, 300.0),
                Vector2D::new(4.0, 0.0),
            ))
            .expect("agent");
        assert_eq!(engine.agent(id).expect("agent").fitness, 0.0);
        let ci = engine.calculate_collective_intelligence();
        // A lone agent has no neighbors, so group performance is zero.
        assert_eq!(ci, 0.0);
        let fitness = engine.agent(id).expect("agent").fitness;
        assert!((fitness - 1.0).abs() < 1e-6);
    }

    #[test]
    fn history_respects_capacity() {
        let config = SwarmConfig {
            history_capacity: 3,
            ..seeded(13)
        };
        let mut engine = SwarmEngine::new(config).expect("engine");
        for _ in 0..5 {
            engine.update_swarm();
            engine.detect_emergence();
        }
        let generations: Vec<u64> = engine.history().map(|r| r.generation.0).collect();
        assert_eq!(generations, vec![3, 4, 5]);
        assert_eq!(engine.latest_report().map(|r| r.generation), Some(Generation(5)));
    }

    #[test]
    fn tight_uniform_drift_reports_flocking_clustering_and_wave() {
        let mut engine = SwarmEngine::new(seeded(17)).expect("engine");
        let center = engine.center();
        let offsets = [-15.0, -5.0, 5.0, 15.0];
        for dx in offsets {
            for dy in offsets {
                engine
                    .add_agent(AgentConfig::at(
                        center + Vector2D::new(dx, dy),
                        Vector2D::new(1.0, 0.0),
                    ))
                    .expect("agent");
            }
        }
        let report = engine.detect_emergence();
        assert!(report.has_emergence);
        assert!(report.has(EmergencePattern::Flocking));
        assert!(report.has(EmergencePattern::Clustering));
        assert!(report.has(EmergencePattern::Wave));
        assert!(!report.has(EmergencePattern::Vortex));
        assert!((0.0..=2.0).contains(&report.collective_intelligence));

        let metrics = engine.get_swarm_metrics();
        assert_eq!(metrics.agent_count, 16);
        assert!(metrics.emergence_detected);
        assert_eq!(metrics.clustering_coefficient, 1.0);
        assert!((metrics.average_alignment - 1.0).abs() < 1e-5);
        assert_eq!(engine.history().count(), 2);
    }

    #[test]
    fn injected_rng_controls_placement() {
        let config = SwarmConfig::default();
        let mut a =
            SwarmEngine::with_rng(config.clone(), SmallRng::seed_from_u64(99)).expect("a");
        let mut b = SwarmEngine::with_rng(config, SmallRng::seed_from_u64(99)).expect("b");
        for _ in 0..10 {
            a.add_random_agent();
            b.add_random_agent();
        }
        assert_eq!(a.get_agents(), b.get_agents());
    }
}
