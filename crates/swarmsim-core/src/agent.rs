//! Agent records and the dense store backing the swarm.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::vector::Vector2D;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Simulation clock: number of ticks since the last reset.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Generation(pub u64);

impl Generation {
    /// Returns the next sequential generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Behavioural role tag.
///
/// Reserved: roles are stored and reported but no steering rule reads them yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Leader,
    #[default]
    Follower,
    Scout,
}

/// Per-agent limits consulted by the steering rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SteeringParams {
    pub max_force: f32,
    pub max_speed: f32,
    /// Radius used by alignment and cohesion.
    pub perception_radius: f32,
    /// Radius used by separation.
    pub separation_radius: f32,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            max_force: 0.1,
            max_speed: 4.0,
            perception_radius: 50.0,
            separation_radius: 25.0,
        }
    }
}

impl SteeringParams {
    /// Checks every limit is finite and strictly positive.
    pub(crate) fn invalid_field(&self) -> Option<&'static str> {
        let fields = [
            (self.max_force, "max_force must be positive and finite"),
            (self.max_speed, "max_speed must be positive and finite"),
            (
                self.perception_radius,
                "perception_radius must be positive and finite",
            ),
            (
                self.separation_radius,
                "separation_radius must be positive and finite",
            ),
        ];
        fields
            .into_iter()
            .find(|(value, _)| !value.is_finite() || *value <= 0.0)
            .map(|(_, msg)| msg)
    }
}

/// Owned copy of one agent, as handed to callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SwarmAgent {
    pub id: AgentId,
    pub position: Vector2D,
    pub velocity: Vector2D,
    /// Acceleration applied during the most recent tick.
    pub acceleration: Vector2D,
    pub max_force: f32,
    pub max_speed: f32,
    pub perception_radius: f32,
    pub separation_radius: f32,
    pub role: AgentRole,
    pub fitness: f32,
}

impl SwarmAgent {
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

/// Optional overrides accepted by `SwarmEngine::add_agent`.
///
/// Unset fields fall back to the engine's `AgentDefaults`, with position and
/// velocity drawn from the engine RNG.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub position: Option<Vector2D>,
    pub velocity: Option<Vector2D>,
    pub max_force: Option<f32>,
    pub max_speed: Option<f32>,
    pub perception_radius: Option<f32>,
    pub separation_radius: Option<f32>,
    pub role: Option<AgentRole>,
}

impl AgentConfig {
    /// Config pinning both position and velocity, leaving limits at their defaults.
    #[must_use]
    pub fn at(position: Vector2D, velocity: Vector2D) -> Self {
        Self {
            position: Some(position),
            velocity: Some(velocity),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn with_separation_radius(mut self, radius: f32) -> Self {
        self.separation_radius = Some(radius);
        self
    }

    #[must_use]
    pub fn with_perception_radius(mut self, radius: f32) -> Self {
        self.perception_radius = Some(radius);
        self
    }

    #[must_use]
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = Some(max_speed);
        self
    }

    #[must_use]
    pub fn with_max_force(mut self, max_force: f32) -> Self {
        self.max_force = Some(max_force);
        self
    }
}

/// Scalar fields for a single agent used when inserting into the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AgentData {
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub params: SteeringParams,
    pub role: AgentRole,
}

/// Collection of per-agent columns for hot-path iteration.
#[derive(Debug, Default)]
pub struct AgentColumns {
    positions: Vec<Vector2D>,
    velocities: Vec<Vector2D>,
    accelerations: Vec<Vector2D>,
    params: Vec<SteeringParams>,
    roles: Vec<AgentRole>,
    fitness: Vec<f32>,
}

impl AgentColumns {
    /// Number of active rows in the columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.velocities.clear();
        self.accelerations.clear();
        self.params.clear();
        self.roles.clear();
        self.fitness.clear();
    }

    fn push(&mut self, agent: AgentData) {
        self.positions.push(agent.position);
        self.velocities.push(agent.velocity);
        self.accelerations.push(Vector2D::ZERO);
        self.params.push(agent.params);
        self.roles.push(agent.role);
        self.fitness.push(0.0);
        self.debug_assert_coherent();
    }

    fn swap_remove(&mut self, index: usize) -> (AgentData, Vector2D, f32) {
        let data = AgentData {
            position: self.positions.swap_remove(index),
            velocity: self.velocities.swap_remove(index),
            params: self.params.swap_remove(index),
            role: self.roles.swap_remove(index),
        };
        let acceleration = self.accelerations.swap_remove(index);
        let fitness = self.fitness.swap_remove(index);
        self.debug_assert_coherent();
        (data, acceleration, fitness)
    }

    #[must_use]
    pub fn positions(&self) -> &[Vector2D] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Vector2D] {
        &mut self.positions
    }

    #[must_use]
    pub fn velocities(&self) -> &[Vector2D] {
        &self.velocities
    }

    pub fn velocities_mut(&mut self) -> &mut [Vector2D] {
        &mut self.velocities
    }

    pub fn accelerations_mut(&mut self) -> &mut [Vector2D] {
        &mut self.accelerations
    }

    #[must_use]
    pub fn params(&self) -> &[SteeringParams] {
        &self.params
    }

    pub fn fitness_mut(&mut self) -> &mut [f32] {
        &mut self.fitness
    }

    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.positions.len(), self.velocities.len());
        debug_assert_eq!(self.positions.len(), self.accelerations.len());
        debug_assert_eq!(self.positions.len(), self.params.len());
        debug_assert_eq!(self.positions.len(), self.roles.len());
        debug_assert_eq!(self.positions.len(), self.fitness.len());
    }
}

/// Dense agent storage addressed by generational handles.
#[derive(Debug)]
pub struct AgentArena {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    columns: AgentColumns,
}

impl Default for AgentArena {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            columns: AgentColumns::default(),
        }
    }

    /// Number of active agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Borrow the underlying column storage.
    #[must_use]
    pub fn columns(&self) -> &AgentColumns {
        &self.columns
    }

    /// Mutable access to the column storage.
    pub fn columns_mut(&mut self) -> &mut AgentColumns {
        &mut self.columns
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    pub(crate) fn insert(&mut self, agent: AgentData) -> AgentId {
        let index = self.columns.len();
        self.columns.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id`, returning its final state if it was present.
    pub fn remove(&mut self, id: AgentId) -> Option<SwarmAgent> {
        let index = self.slots.remove(id)?;
        let (data, acceleration, fitness) = self.columns.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);
        if index < self.handles.len() {
            let moved = self.handles[index];
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }
        Some(SwarmAgent {
            id,
            position: data.position,
            velocity: data.velocity,
            acceleration,
            max_force: data.params.max_force,
            max_speed: data.params.max_speed,
            perception_radius: data.params.perception_radius,
            separation_radius: data.params.separation_radius,
            role: data.role,
            fitness,
        })
    }

    /// Produce an owned copy of the row at dense `index`.
    #[must_use]
    pub fn snapshot_at(&self, index: usize) -> SwarmAgent {
        let c = &self.columns;
        let params = c.params[index];
        SwarmAgent {
            id: self.handles[index],
            position: c.positions[index],
            velocity: c.velocities[index],
            acceleration: c.accelerations[index],
            max_force: params.max_force,
            max_speed: params.max_speed,
            perception_radius: params.perception_radius,
            separation_radius: params.separation_radius,
            role: c.roles[index],
            fitness: c.fitness[index],
        }
    }

    #[must_use]
    pub fn snapshot(&self, id: AgentId) -> Option<SwarmAgent> {
        self.index_of(id).map(|index| self.snapshot_at(index))
    }

    /// Owned copies of every agent in dense order.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<SwarmAgent> {
        (0..self.len()).map(|index| self.snapshot_at(index)).collect()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.columns.clear();
    }
}
