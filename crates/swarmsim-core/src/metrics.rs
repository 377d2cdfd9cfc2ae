//! Aggregate statistics computed from a frozen swarm frame.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::forces::Frame;
use crate::vector::Vector2D;

/// Ceiling applied to the collective-intelligence ratio.
pub const MAX_COLLECTIVE_INTELLIGENCE: f32 = 2.0;

/// Snapshot of swarm-level statistics returned to callers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SwarmMetrics {
    pub agent_count: usize,
    pub average_speed: f32,
    pub average_cohesion: f32,
    pub average_alignment: f32,
    pub separation_score: f32,
    pub clustering_coefficient: f32,
    pub emergence_detected: bool,
    pub collective_intelligence_index: f32,
}

/// Motion statistics shared by metrics, emergence and collective intelligence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionStats {
    pub agent_count: usize,
    pub average_speed: f32,
    pub average_cohesion: f32,
    pub average_alignment: f32,
    pub separation_score: f32,
    pub clustering_coefficient: f32,
}

#[derive(Debug, Default)]
struct AgentSample {
    speed: f32,
    cohesion: Option<f32>,
    alignment: Option<f32>,
    crowded: usize,
    links: Vec<usize>,
}

fn sample_agent(frame: &Frame<'_>, idx: usize, diagonal: f32) -> AgentSample {
    let params = frame.params[idx];
    let origin = frame.positions[idx];
    let velocity = frame.velocities[idx];
    let perception_sq = params.perception_radius * params.perception_radius;
    let separation_sq = params.separation_radius * params.separation_radius;

    let mut sample = AgentSample {
        speed: velocity.magnitude(),
        ..AgentSample::default()
    };
    let mut position_sum = Vector2D::ZERO;
    let mut velocity_sum = Vector2D::ZERO;
    frame.index.neighbors_within(
        idx,
        perception_sq.max(separation_sq),
        &mut |other_idx, dist_sq| {
            let dist_sq = dist_sq.into_inner();
            if dist_sq < separation_sq {
                sample.crowded += 1;
            }
            if dist_sq < perception_sq {
                position_sum += frame.positions[other_idx];
                velocity_sum += frame.velocities[other_idx];
                sample.links.push(other_idx);
            }
        },
    );

    let count = sample.links.len();
    if count > 0 {
        let centroid = position_sum / count as f32;
        let closeness = if diagonal > 0.0 {
            1.0 - origin.distance(centroid) / diagonal
        } else {
            0.0
        };
        sample.cohesion = Some(closeness.clamp(0.0, 1.0));
        let mean_velocity = velocity_sum / count as f32;
        sample.alignment = Some(velocity.cosine_similarity(mean_velocity).max(0.0));
    }
    sample
}

fn mean_of(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0_f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Fraction of agents belonging to connected components larger than `min_size`.
fn clustering_coefficient(links: &[Vec<usize>], min_size: usize) -> f32 {
    let n = links.len();
    if n == 0 {
        return 0.0;
    }
    let mut parent: Vec<usize> = (0..n).collect();
    for (idx, neighbors) in links.iter().enumerate() {
        for &other in neighbors {
            union(&mut parent, idx, other);
        }
    }
    let mut sizes = vec![0usize; n];
    for idx in 0..n {
        let root = find(&mut parent, idx);
        sizes[root] += 1;
    }
    let clustered: usize = sizes.iter().filter(|&&size| size > min_size).sum();
    clustered as f32 / n as f32
}

impl MotionStats {
    /// Scan every agent's perception neighborhood once and fold the results.
    #[must_use]
    pub fn compute(frame: &Frame<'_>, diagonal: f32, cluster_min_size: usize) -> Self {
        let n = frame.len();
        if n == 0 {
            return Self::default();
        }
        let samples: Vec<AgentSample> = (0..n)
            .into_par_iter()
            .map(|idx| sample_agent(frame, idx, diagonal))
            .collect();

        let average_speed = mean_of(samples.iter().map(|s| s.speed));
        let average_cohesion = mean_of(samples.iter().filter_map(|s| s.cohesion));
        let average_alignment = mean_of(samples.iter().filter_map(|s| s.alignment));
        let separation_score = mean_of(
            samples
                .iter()
                .map(|s| 1.0 - s.crowded as f32 / n as f32),
        );
        let links: Vec<Vec<usize>> = samples.into_iter().map(|s| s.links).collect();

        Self {
            agent_count: n,
            average_speed,
            average_cohesion,
            average_alignment,
            separation_score,
            clustering_coefficient: clustering_coefficient(&links, cluster_min_size),
        }
    }

    /// Mean of cohesion and alignment, the group half of the intelligence ratio.
    #[must_use]
    pub fn group_performance(&self) -> f32 {
        (self.average_cohesion + self.average_alignment) / 2.0
    }
}

/// Individual score: closeness to the arena center averaged with relative speed.
#[must_use]
pub fn agent_fitness(
    position: Vector2D,
    velocity: Vector2D,
    max_speed: f32,
    center: Vector2D,
    diagonal: f32,
) -> f32 {
    let half_diagonal = diagonal / 2.0;
    let center_score = if half_diagonal > 0.0 {
        (1.0 - position.distance(center) / half_diagonal).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let speed_score = if max_speed > 0.0 {
        (velocity.magnitude() / max_speed).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (center_score + speed_score) / 2.0
}

/// Fitness for every agent in frame order.
#[must_use]
pub fn fitness_scores(frame: &Frame<'_>, center: Vector2D, diagonal: f32) -> Vec<f32> {
    (0..frame.len())
        .map(|idx| {
            agent_fitness(
                frame.positions[idx],
                frame.velocities[idx],
                frame.params[idx].max_speed,
                center,
                diagonal,
            )
        })
        .collect()
}

/// Group performance over best individual fitness, bounded to `[0, 2]`.
#[must_use]
pub fn collective_intelligence(stats: &MotionStats, fitness: &[f32]) -> f32 {
    let best = fitness
        .iter()
        .copied()
        .map(OrderedFloat)
        .max()
        .map_or(0.0, OrderedFloat::into_inner);
    if best <= 0.0 || !best.is_finite() {
        return 0.0;
    }
    let ratio = stats.group_performance() / best;
    if ratio.is_finite() {
        ratio.clamp(0.0, MAX_COLLECTIVE_INTELLIGENCE)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::SteeringParams;
    use swarmsim_index::{BruteForceIndex, NeighborhoodIndex};

    fn stats_for(positions: &[Vector2D], velocities: &[Vector2D]) -> MotionStats {
        let params = vec![SteeringParams::default(); positions.len()];
        let mut index = BruteForceIndex::new();
        let tuples: Vec<(f32, f32)> = positions.iter().map(|p| p.as_tuple()).collect();
        index.rebuild(&tuples).expect("rebuild");
        let frame = Frame {
            positions,
            velocities,
            params: &params,
            index: &index,
        };
        MotionStats::compute(&frame, 1_000.0, 3)
    }

    #[test]
    fn empty_frame_is_neutral() {
        let stats = stats_for(&[], &[]);
        assert_eq!(stats, MotionStats::default());
        assert_eq!(collective_intelligence(&stats, &[]), 0.0);
    }

    #[test]
    fn isolated_agents_are_excluded_from_neighbor_averages() {
        let positions = [Vector2D::new(0.0, 0.0), Vector2D::new(500.0, 500.0)];
        let velocities = [Vector2D::new(3.0, 4.0), Vector2D::ZERO];
        let stats = stats_for(&positions, &velocities);
        assert_eq!(stats.agent_count, 2);
        assert!((stats.average_speed - 2.5).abs() < 1e-6);
        assert_eq!(stats.average_cohesion, 0.0);
        assert_eq!(stats.average_alignment, 0.0);
        assert_eq!(stats.separation_score, 1.0);
        assert_eq!(stats.clustering_coefficient, 0.0);
    }

    #[test]
    fn opposed_headings_clamp_alignment_to_zero() {
        let positions = [Vector2D::new(0.0, 0.0), Vector2D::new(10.0, 0.0)];
        let velocities = [Vector2D::new(1.0, 0.0), Vector2D::new(-1.0, 0.0)];
        let stats = stats_for(&positions, &velocities);
        assert_eq!(stats.average_alignment, 0.0);
        // Both agents crowd each other: 1 - 1/2 each.
        assert!((stats.separation_score - 0.5).abs() < 1e-6);
        assert!((stats.average_cohesion - 0.99).abs() < 1e-4);
    }

    #[test]
    fn clustering_counts_only_large_components() {
        // Chain of four agents 40 apart (connected) plus a separate pair.
        let positions = [
            Vector2D::new(0.0, 0.0),
            Vector2D::new(40.0, 0.0),
            Vector2D::new(80.0, 0.0),
            Vector2D::new(120.0, 0.0),
            Vector2D::new(600.0, 600.0),
            Vector2D::new(610.0, 600.0),
        ];
        let velocities = [Vector2D::ZERO; 6];
        let stats = stats_for(&positions, &velocities);
        assert!((stats.clustering_coefficient - 4.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn union_find_merges_transitively() {
        let links = vec![vec![1], vec![2], vec![3], vec![], vec![]];
        assert!((clustering_coefficient(&links, 3) - 0.8).abs() < 1e-6);
        assert_eq!(clustering_coefficient(&links, 4), 0.0);
    }

    #[test]
    fn fitness_rewards_center_and_speed() {
        let center = Vector2D::new(50.0, 50.0);
        let diagonal = 100.0;
        let at_center_fast = agent_fitness(center, Vector2D::new(4.0, 0.0), 4.0, center, diagonal);
        assert!((at_center_fast - 1.0).abs() < 1e-6);
        let far_still = agent_fitness(
            Vector2D::new(0.0, 0.0),
            Vector2D::ZERO,
            4.0,
            center,
            diagonal,
        );
        assert!(far_still < 0.3);
    }

    #[test]
    fn collective_intelligence_is_capped() {
        let stats = MotionStats {
            agent_count: 3,
            average_cohesion: 1.0,
            average_alignment: 1.0,
            ..MotionStats::default()
        };
        assert_eq!(collective_intelligence(&stats, &[0.1, 0.2]), 2.0);
        assert!((collective_intelligence(&stats, &[0.8]) - 1.25).abs() < 1e-6);
        assert_eq!(collective_intelligence(&stats, &[0.0, 0.0]), 0.0);
    }
}
