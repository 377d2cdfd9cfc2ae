//! Steering rules and the per-agent integration step.
//!
//! All three rules share the "desired minus current" shape: a neighbor-derived
//! desired direction is rescaled to `max_speed`, the current velocity is
//! subtracted, and the result is clamped to `max_force`. Rules only ever read the
//! frozen pre-tick [`Frame`], so evaluation order across agents is irrelevant.

use swarmsim_index::NeighborhoodIndex;

use crate::agent::SteeringParams;
use crate::config::RuleWeights;
use crate::vector::Vector2D;

/// Read-only view of the swarm taken before any agent is updated.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub positions: &'a [Vector2D],
    pub velocities: &'a [Vector2D],
    pub params: &'a [SteeringParams],
    pub index: &'a dyn NeighborhoodIndex,
}

impl Frame<'_> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Neighbor aggregates consumed by the three rules.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeighborSums {
    /// Sum of `diff / |diff| / d` over separation neighbors.
    pub away: Vector2D,
    /// Separation neighbors at non-zero distance.
    pub away_count: usize,
    /// Sum of neighbor velocities within the perception radius.
    pub velocity: Vector2D,
    /// Sum of neighbor positions within the perception radius.
    pub position: Vector2D,
    /// Neighbors within the perception radius.
    pub perceived: usize,
}

impl NeighborSums {
    /// Scan the neighbors of agent `idx` once, covering both radii.
    #[must_use]
    pub fn gather(frame: &Frame<'_>, idx: usize) -> Self {
        let params = frame.params[idx];
        let origin = frame.positions[idx];
        let perception_sq = params.perception_radius * params.perception_radius;
        let separation_sq = params.separation_radius * params.separation_radius;
        let query_sq = perception_sq.max(separation_sq);

        let mut sums = Self::default();
        frame
            .index
            .neighbors_within(idx, query_sq, &mut |other_idx, dist_sq| {
                let dist_sq = dist_sq.into_inner();
                let other = frame.positions[other_idx];
                if dist_sq > 0.0 && dist_sq < separation_sq {
                    let dist = dist_sq.sqrt();
                    sums.away += (origin - other).normalize() / dist;
                    sums.away_count += 1;
                }
                if dist_sq < perception_sq {
                    sums.velocity += frame.velocities[other_idx];
                    sums.position += other;
                    sums.perceived += 1;
                }
            });
        sums
    }
}

/// Turn a desired direction into a bounded steering force.
#[must_use]
pub fn steer(desired: Vector2D, velocity: Vector2D, params: &SteeringParams) -> Vector2D {
    (desired.with_magnitude(params.max_speed) - velocity).limit(params.max_force)
}

/// Push away from crowding neighbors, weighted by inverse distance.
#[must_use]
pub fn separation(velocity: Vector2D, params: &SteeringParams, sums: &NeighborSums) -> Vector2D {
    if sums.away_count == 0 {
        return Vector2D::ZERO;
    }
    steer(sums.away / sums.away_count as f32, velocity, params)
}

/// Match the mean heading of perceived neighbors.
#[must_use]
pub fn alignment(velocity: Vector2D, params: &SteeringParams, sums: &NeighborSums) -> Vector2D {
    if sums.perceived == 0 {
        return Vector2D::ZERO;
    }
    steer(sums.velocity / sums.perceived as f32, velocity, params)
}

/// Head toward the centroid of perceived neighbors.
#[must_use]
pub fn cohesion(
    position: Vector2D,
    velocity: Vector2D,
    params: &SteeringParams,
    sums: &NeighborSums,
) -> Vector2D {
    if sums.perceived == 0 {
        return Vector2D::ZERO;
    }
    let centroid = sums.position / sums.perceived as f32;
    steer(centroid - position, velocity, params)
}

/// Unweighted rule outputs for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringForces {
    pub separation: Vector2D,
    pub alignment: Vector2D,
    pub cohesion: Vector2D,
}

impl SteeringForces {
    /// Evaluate all three rules for agent `idx` against the frame.
    #[must_use]
    pub fn evaluate(frame: &Frame<'_>, idx: usize) -> Self {
        let sums = NeighborSums::gather(frame, idx);
        let params = &frame.params[idx];
        let position = frame.positions[idx];
        let velocity = frame.velocities[idx];
        Self {
            separation: separation(velocity, params, &sums),
            alignment: alignment(velocity, params, &sums),
            cohesion: cohesion(position, velocity, params, &sums),
        }
    }

    /// Weighted sum applied as this tick's acceleration.
    #[must_use]
    pub fn acceleration(&self, weights: &RuleWeights) -> Vector2D {
        self.separation * weights.separation
            + self.alignment * weights.alignment
            + self.cohesion * weights.cohesion
    }
}

/// Kinematic state produced by one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrated {
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub acceleration: Vector2D,
}

/// Wrap `value` onto `[0, extent)`, handling negative inputs.
#[must_use]
pub fn wrap_coordinate(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 {
        return 0.0;
    }
    let mut v = value % extent;
    if v < 0.0 {
        v += extent;
    }
    // `v + extent` can round up to exactly `extent` for tiny negative remainders.
    if v >= extent { 0.0 } else { v }
}

/// Apply acceleration, clamp speed, advance and wrap position.
#[must_use]
pub fn integrate(
    position: Vector2D,
    velocity: Vector2D,
    acceleration: Vector2D,
    max_speed: f32,
    bounds: (f32, f32),
) -> Integrated {
    let velocity = (velocity + acceleration).limit(max_speed);
    let moved = position + velocity;
    Integrated {
        position: Vector2D::new(
            wrap_coordinate(moved.x, bounds.0),
            wrap_coordinate(moved.y, bounds.1),
        ),
        velocity,
        acceleration,
    }
}
