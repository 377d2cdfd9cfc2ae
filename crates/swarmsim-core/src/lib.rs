//! Core types and the flocking engine for the swarmsim workspace.
//!
//! Agents live on a toroidal arena and steer by separation, alignment and
//! cohesion. Each tick reads a frozen snapshot of every agent, so the outcome
//! does not depend on the order agents are stored in. On demand the engine
//! folds the swarm into [`SwarmMetrics`], classifies collective motion into
//! [`EmergencePattern`]s and scores group performance against the best
//! individual.

mod agent;
mod config;
mod emergence;
mod engine;
mod forces;
mod metrics;
mod vector;

pub use agent::{AgentConfig, AgentId, AgentRole, Generation, SteeringParams, SwarmAgent};
pub use config::{AgentDefaults, EmergenceThresholds, RuleWeights, SwarmConfig, SwarmError};
pub use emergence::{
    EmergencePattern, EmergenceReport, detect_patterns, is_vortex, is_wave,
    self_organization_level,
};
pub use engine::SwarmEngine;
pub use forces::{
    Frame, Integrated, NeighborSums, SteeringForces, alignment, cohesion, integrate, separation,
    steer, wrap_coordinate,
};
pub use metrics::{
    MAX_COLLECTIVE_INTELLIGENCE, MotionStats, SwarmMetrics, agent_fitness,
    collective_intelligence, fitness_scores,
};
pub use swarmsim_index::{IndexError, IndexKind};
pub use vector::Vector2D;
