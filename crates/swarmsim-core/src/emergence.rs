//! Heuristic classification of collective motion patterns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::agent::Generation;
use crate::config::EmergenceThresholds;
use crate::metrics::MotionStats;
use crate::vector::Vector2D;

/// Collective patterns the detector can report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EmergencePattern {
    Flocking,
    Clustering,
    Vortex,
    Wave,
}

impl EmergencePattern {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flocking => "flocking",
            Self::Clustering => "clustering",
            Self::Vortex => "vortex",
            Self::Wave => "wave",
        }
    }
}

/// Outcome of one emergence evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergenceReport {
    /// Generation the swarm was at when the report was produced.
    pub generation: Generation,
    pub has_emergence: bool,
    pub patterns_detected: BTreeSet<EmergencePattern>,
    pub collective_intelligence: f32,
    pub self_organization_level: f32,
}

impl EmergenceReport {
    #[must_use]
    pub fn new(
        generation: Generation,
        patterns_detected: BTreeSet<EmergencePattern>,
        collective_intelligence: f32,
        self_organization_level: f32,
    ) -> Self {
        Self {
            generation,
            has_emergence: !patterns_detected.is_empty(),
            patterns_detected,
            collective_intelligence,
            self_organization_level,
        }
    }

    #[must_use]
    pub fn has(&self, pattern: EmergencePattern) -> bool {
        self.patterns_detected.contains(&pattern)
    }

    /// Comma separated pattern names, for log lines.
    #[must_use]
    pub fn pattern_names(&self) -> String {
        self.patterns_detected
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// True when far more agents circle the center one way than the other.
#[must_use]
pub fn is_vortex(
    positions: &[Vector2D],
    velocities: &[Vector2D],
    center: Vector2D,
    threshold: f32,
) -> bool {
    if positions.is_empty() {
        return false;
    }
    let (mut clockwise, mut counter_clockwise) = (0usize, 0usize);
    for (position, velocity) in positions.iter().zip(velocities) {
        let turn = (*position - center).cross(*velocity);
        if turn > 0.0 {
            counter_clockwise += 1;
        } else if turn < 0.0 {
            clockwise += 1;
        }
    }
    let imbalance = clockwise.abs_diff(counter_clockwise) as f32 / positions.len() as f32;
    imbalance > threshold
}

/// Quadrant index around `center`: 0 = top-left, 1 = top-right, 2 = bottom-left, 3 = bottom-right.
fn quadrant_of(position: Vector2D, center: Vector2D) -> usize {
    let right = usize::from(position.x >= center.x);
    let lower = usize::from(position.y >= center.y);
    lower * 2 + right
}

/// Adjacent pairs first, then the two diagonals.
const QUADRANT_PAIRS: [(usize, usize); 6] = [(0, 1), (2, 3), (0, 2), (1, 3), (0, 3), (1, 2)];

/// True when every quadrant moves with nearly the same mean velocity.
///
/// Requires `min_agents` agents and at least one agent in each quadrant.
#[must_use]
pub fn is_wave(
    positions: &[Vector2D],
    velocities: &[Vector2D],
    center: Vector2D,
    thresholds: &EmergenceThresholds,
) -> bool {
    if positions.len() < thresholds.wave_min_agents {
        return false;
    }
    let mut sums = [Vector2D::ZERO; 4];
    let mut counts = [0usize; 4];
    for (position, velocity) in positions.iter().zip(velocities) {
        let q = quadrant_of(*position, center);
        sums[q] += *velocity;
        counts[q] += 1;
    }
    if counts.contains(&0) {
        return false;
    }
    let means: Vec<Vector2D> = sums
        .iter()
        .zip(counts)
        .map(|(sum, count)| *sum / count as f32)
        .collect();
    let difference: f32 = QUADRANT_PAIRS
        .iter()
        .map(|&(a, b)| {
            let delta = means[a] - means[b];
            delta.x.abs() + delta.y.abs()
        })
        .sum();
    difference < thresholds.wave_max_difference
}

/// Evaluate each pattern independently.
#[must_use]
pub fn detect_patterns(
    stats: &MotionStats,
    positions: &[Vector2D],
    velocities: &[Vector2D],
    center: Vector2D,
    thresholds: &EmergenceThresholds,
) -> BTreeSet<EmergencePattern> {
    let mut patterns = BTreeSet::new();
    if stats.average_alignment > thresholds.flocking_alignment
        && stats.average_cohesion > thresholds.flocking_cohesion
    {
        patterns.insert(EmergencePattern::Flocking);
    }
    if stats.clustering_coefficient > thresholds.clustering {
        patterns.insert(EmergencePattern::Clustering);
    }
    if is_vortex(positions, velocities, center, thresholds.vortex) {
        patterns.insert(EmergencePattern::Vortex);
    }
    if is_wave(positions, velocities, center, thresholds) {
        patterns.insert(EmergencePattern::Wave);
    }
    patterns
}

/// Mean of maturity (ramping to 1 over `maturity_generations`), full autonomy, and clustering.
#[must_use]
pub fn self_organization_level(
    generation: Generation,
    clustering_coefficient: f32,
    maturity_generations: u64,
) -> f32 {
    let maturity = if maturity_generations == 0 {
        1.0
    } else {
        (generation.0 as f32 / maturity_generations as f32).min(1.0)
    };
    let autonomy = 1.0;
    (maturity + autonomy + clustering_coefficient) / 3.0
}
