//! Spatial indexing abstractions for agent neighborhood queries.
//!
//! Every index answers the same question: which other agents lie strictly inside a
//! radius around agent `i`? Distances are plain Euclidean distances in arena space.
//! Implementations differ only in how many candidate pairs they inspect.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A position handed to `rebuild` was NaN or infinite.
    #[error("non-finite position at index {0}")]
    NonFinitePosition(usize),
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Rebuild internal structures from agent positions.
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError>;

    /// Visit neighbors of `agent_idx` strictly within the provided squared radius.
    ///
    /// The agent itself is never visited. Coincident agents are visited with a
    /// squared distance of zero.
    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );

    /// Collect neighbor indices into a vector, in visit order.
    fn collect_neighbors(&self, agent_idx: usize, radius_sq: f32) -> Vec<usize> {
        let mut out = Vec::new();
        self.neighbors_within(agent_idx, radius_sq, &mut |idx, _| out.push(idx));
        out
    }
}

fn validate_positions(positions: &[(f32, f32)]) -> Result<(), IndexError> {
    match positions
        .iter()
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        Some(idx) => Err(IndexError::NonFinitePosition(idx)),
        None => Ok(()),
    }
}

#[inline]
fn distance_sq(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Naive pairwise scan: O(n) per query, O(n²) per tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BruteForceIndex {
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
}

impl BruteForceIndex {
    /// Create an empty brute-force index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NeighborhoodIndex for BruteForceIndex {
    fn name(&self) -> &'static str {
        "brute_force"
    }

    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        validate_positions(positions)?;
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&origin) = self.positions.get(agent_idx) else {
            return;
        };
        for (other_idx, &pos) in self.positions.iter().enumerate() {
            if other_idx == agent_idx {
                continue;
            }
            let dist_sq = distance_sq(origin, pos);
            if dist_sq < radius_sq {
                visitor(other_idx, OrderedFloat(dist_sq));
            }
        }
    }
}

type CellKey = (i32, i32);

/// Uniform grid bucketing agents into square cells.
///
/// Queries only inspect cells overlapping the query disc, so density rather than
/// population size drives the cost. Buckets are kept in a `BTreeMap` to make visit
/// order a pure function of the positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    /// Edge length of each grid cell used for bucketing agents.
    pub cell_size: f32,
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
    #[serde(skip)]
    cells: Vec<CellKey>,
    #[serde(skip)]
    buckets: BTreeMap<CellKey, Vec<usize>>,
}

impl UniformGridIndex {
    /// Create a new uniform grid with the provided cell size.
    pub fn new(cell_size: f32) -> Result<Self, IndexError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(IndexError::InvalidConfig(
                "cell_size must be positive and finite",
            ));
        }
        Ok(Self {
            cell_size,
            positions: Vec::new(),
            cells: Vec::new(),
            buckets: BTreeMap::new(),
        })
    }

    fn cell_of(&self, pos: (f32, f32)) -> CellKey {
        (
            (pos.0 / self.cell_size).floor() as i32,
            (pos.1 / self.cell_size).floor() as i32,
        )
    }

    /// Number of occupied cells after the last rebuild.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.buckets.len()
    }

    fn visit_bucket(
        &self,
        bucket: &[usize],
        agent_idx: usize,
        origin: (f32, f32),
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        for &other_idx in bucket {
            if other_idx == agent_idx {
                continue;
            }
            let dist_sq = distance_sq(origin, self.positions[other_idx]);
            if dist_sq < radius_sq {
                visitor(other_idx, OrderedFloat(dist_sq));
            }
        }
    }
}

impl Default for UniformGridIndex {
    fn default() -> Self {
        Self {
            cell_size: 50.0,
            positions: Vec::new(),
            cells: Vec::new(),
            buckets: BTreeMap::new(),
        }
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn name(&self) -> &'static str {
        "uniform_grid"
    }

    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(IndexError::InvalidConfig(
                "cell_size must be positive and finite",
            ));
        }
        validate_positions(positions)?;
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.buckets.clear();
        self.cells.clear();
        self.cells.reserve(positions.len());
        for (idx, &pos) in positions.iter().enumerate() {
            let key = self.cell_of(pos);
            self.cells.push(key);
            self.buckets.entry(key).or_default().push(idx);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let (Some(&origin), Some(&(cx, cy))) =
            (self.positions.get(agent_idx), self.cells.get(agent_idx))
        else {
            return;
        };
        if radius_sq <= 0.0 {
            return;
        }
        let span_f = (radius_sq.sqrt() / self.cell_size).ceil();
        let window = (2.0 * span_f + 1.0) * (2.0 * span_f + 1.0);

        // Wide radii touch more cells than are occupied; walk the occupied ones instead.
        if !window.is_finite() || window >= self.buckets.len() as f32 {
            for bucket in self.buckets.values() {
                self.visit_bucket(bucket, agent_idx, origin, radius_sq, visitor);
            }
            return;
        }

        let span = span_f as i32;
        for gx in cx.saturating_sub(span)..=cx.saturating_add(span) {
            for gy in cy.saturating_sub(span)..=cy.saturating_add(span) {
                if let Some(bucket) = self.buckets.get(&(gx, gy)) {
                    self.visit_bucket(bucket, agent_idx, origin, radius_sq, visitor);
                }
            }
        }
    }
}

/// Serializable selector for the neighbor query strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexKind {
    /// Pairwise scan over every agent.
    #[default]
    BruteForce,
    /// Uniform grid with the given cell edge length.
    UniformGrid { cell_size: f32 },
}

impl IndexKind {
    /// Instantiate the selected strategy.
    pub fn build(self) -> Result<Box<dyn NeighborhoodIndex>, IndexError> {
        match self {
            Self::BruteForce => Ok(Box::new(BruteForceIndex::new())),
            Self::UniformGrid { cell_size } => Ok(Box::new(UniformGridIndex::new(cell_size)?)),
        }
    }
}
