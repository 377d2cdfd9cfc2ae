//! Static configuration for a swarm engine.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use swarmsim_index::{IndexError, IndexKind};
use thiserror::Error;

use crate::agent::{AgentRole, SteeringParams};

/// Errors raised at the configuration boundary.
#[derive(Debug, Error, PartialEq)]
pub enum SwarmError {
    /// Indicates an invalid engine configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A caller-supplied agent override cannot be simulated.
    #[error("invalid agent: {0}")]
    InvalidAgent(&'static str),
    /// The neighbor index rejected its configuration.
    #[error("neighbor index: {0}")]
    Index(#[from] IndexError),
}

/// Relative weights used when summing steering forces into acceleration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleWeights {
    pub separation: f32,
    pub alignment: f32,
    pub cohesion: f32,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            separation: 1.5,
            alignment: 1.0,
            cohesion: 1.0,
        }
    }
}

/// Values used for any field an `AgentConfig` leaves unset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentDefaults {
    pub max_force: f32,
    pub max_speed: f32,
    pub perception_radius: f32,
    pub separation_radius: f32,
    pub role: AgentRole,
    /// Random initial velocity components are drawn from `[-range, range]`.
    pub initial_speed_range: f32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        let params = SteeringParams::default();
        Self {
            max_force: params.max_force,
            max_speed: params.max_speed,
            perception_radius: params.perception_radius,
            separation_radius: params.separation_radius,
            role: AgentRole::Follower,
            initial_speed_range: 2.0,
        }
    }
}

impl AgentDefaults {
    #[must_use]
    pub fn params(&self) -> SteeringParams {
        SteeringParams {
            max_force: self.max_force,
            max_speed: self.max_speed,
            perception_radius: self.perception_radius,
            separation_radius: self.separation_radius,
        }
    }
}

/// Cut-offs applied by the emergence detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmergenceThresholds {
    /// Minimum average alignment for flocking.
    pub flocking_alignment: f32,
    /// Minimum average cohesion for flocking.
    pub flocking_cohesion: f32,
    /// Minimum clustering coefficient for clustering.
    pub clustering: f32,
    /// Minimum rotational imbalance `|cw - ccw| / n` for a vortex.
    pub vortex: f32,
    /// Maximum summed quadrant velocity difference for a wave.
    pub wave_max_difference: f32,
    /// Populations below this size skip the wave test.
    pub wave_min_agents: usize,
    /// Components larger than this count toward the clustering coefficient.
    pub cluster_min_size: usize,
    /// Generations needed for the maturity term to saturate.
    pub maturity_generations: u64,
}

impl Default for EmergenceThresholds {
    fn default() -> Self {
        Self {
            flocking_alignment: 0.8,
            flocking_cohesion: 0.7,
            clustering: 0.6,
            vortex: 0.6,
            wave_max_difference: 1.0,
            wave_min_agents: 10,
            cluster_min_size: 3,
            maturity_generations: 100,
        }
    }
}

/// Static configuration for a swarm engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwarmConfig {
    /// Arena width in world units.
    pub width: f32,
    /// Arena height in world units.
    pub height: f32,
    /// Optional RNG seed for reproducible agent placement.
    pub rng_seed: Option<u64>,
    /// Maximum number of emergence reports retained in-memory.
    pub history_capacity: usize,
    /// Neighbor query strategy.
    pub neighbor_index: IndexKind,
    pub weights: RuleWeights,
    pub agent_defaults: AgentDefaults,
    pub thresholds: EmergenceThresholds,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            rng_seed: None,
            history_capacity: 1_024,
            neighbor_index: IndexKind::BruteForce,
            weights: RuleWeights::default(),
            agent_defaults: AgentDefaults::default(),
            thresholds: EmergenceThresholds::default(),
        }
    }
}

impl SwarmConfig {
    /// Convenience constructor for an arena of the given size with default tuning.
    #[must_use]
    pub fn with_bounds(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Rejects values the engine cannot simulate.
    pub fn validate(&self) -> Result<(), SwarmError> {
        if !self.width.is_finite()
            || !self.height.is_finite()
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(SwarmError::InvalidConfig(
                "arena dimensions must be positive and finite",
            ));
        }
        if self.history_capacity == 0 {
            return Err(SwarmError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        let w = self.weights;
        if [w.separation, w.alignment, w.cohesion]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(SwarmError::InvalidConfig(
                "rule weights must be non-negative and finite",
            ));
        }
        if let Some(msg) = self.agent_defaults.params().invalid_field() {
            return Err(SwarmError::InvalidConfig(msg));
        }
        let range = self.agent_defaults.initial_speed_range;
        if !range.is_finite() || range < 0.0 {
            return Err(SwarmError::InvalidConfig(
                "initial_speed_range must be non-negative and finite",
            ));
        }
        if self.thresholds.maturity_generations == 0 {
            return Err(SwarmError::InvalidConfig(
                "maturity_generations must be non-zero",
            ));
        }
        Ok(())
    }

    /// Length of the arena diagonal, the largest possible separation.
    #[must_use]
    pub fn diagonal(&self) -> f32 {
        (self.width * self.width + self.height * self.height).sqrt()
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}
