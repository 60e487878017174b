//! One iteration of the force model.
//!
//! Three forces act on every node: repulsion between all pairs (mass
//! scaled, inverse square), attraction along edges (linear springs), and
//! a weak gravity toward the centroid that keeps disconnected components
//! from drifting apart. Forces are computed against an immutable snapshot
//! of the previous iteration and integrated simultaneously.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::graph::model::{Graph, Vec2};
use crate::graph::quadtree::Quadtree;
use crate::graph::schedule::Tuning;

/// Fixed constants of the force model. The time-varying parts
/// (repulsion strength, integration speed, size adjustment) arrive per
/// iteration as a [`Tuning`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Spring constant for edge attraction.
    pub attraction: f64,
    /// Pull toward the centroid, per unit of mass and distance.
    pub gravity: f64,
    /// Distance floor preventing division blow-up for near-coincident
    /// nodes.
    pub epsilon: f64,
    /// Absolute per-iteration displacement cap.
    pub max_displacement: f64,
    /// Visual node radius, subtracted from pair distances when the
    /// schedule turns size adjustment on.
    pub node_radius: f64,
    /// Divide each spring by the lower endpoint degree so hubs aren't
    /// over-pulled by many neighbors.
    pub hub_dampening: bool,
    /// Integration time step.
    pub time_step: f64,
    /// Barnes-Hut accuracy (cell size / distance).
    pub theta: f64,
    /// Node count at which repulsion switches to the quadtree. Size-
    /// adjusted iterations always use the exact loop: radius subtraction
    /// has no meaning against a cluster's center of mass.
    pub barnes_hut_threshold: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            attraction: 0.01,
            gravity: 0.001,
            epsilon: 1e-4,
            max_displacement: 10.0,
            node_radius: 10.0,
            hub_dampening: true,
            time_step: 1.0,
            theta: 1.2,
            barnes_hut_threshold: 512,
        }
    }
}

pub struct ForceSimulator {
    config: SimulatorConfig,
}

impl ForceSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Advances every node by one iteration under `tuning`.
    ///
    /// All forces read the position snapshot taken on entry; no node sees
    /// a neighbor's updated position within the same iteration. A
    /// non-finite result is an invariant violation and fails the run.
    pub fn step(&self, graph: &mut Graph, tuning: &Tuning) -> Result<(), LayoutError> {
        if graph.is_empty() {
            return Ok(());
        }

        let positions: Vec<Vec2> = graph.nodes().iter().map(|n| n.position).collect();
        let masses: Vec<f64> = graph.nodes().iter().map(|n| n.mass()).collect();
        let mut forces = vec![Vec2::ZERO; positions.len()];

        self.apply_repulsion(&positions, &masses, tuning, &mut forces);
        self.apply_attraction(graph, &positions, &mut forces);
        self.apply_gravity(&positions, &masses, &mut forces);

        let cfg = &self.config;
        let scale = tuning.speed * cfg.time_step;
        for (i, node) in graph.nodes_mut().iter_mut().enumerate() {
            let mut displacement = forces[i] * scale;
            let len = displacement.length();
            if len > cfg.max_displacement {
                displacement = displacement * (cfg.max_displacement / len);
            }
            let next = positions[i] + displacement;
            if !next.is_finite() {
                return Err(LayoutError::SimulationFault(format!(
                    "non-finite position for node {}",
                    node.id
                )));
            }
            node.position = next;
        }
        Ok(())
    }

    fn apply_repulsion(
        &self,
        positions: &[Vec2],
        masses: &[f64],
        tuning: &Tuning,
        forces: &mut [Vec2],
    ) {
        let cfg = &self.config;

        if !tuning.adjust_sizes && positions.len() >= cfg.barnes_hut_threshold {
            let bodies: Vec<(Vec2, f64)> = positions
                .iter()
                .copied()
                .zip(masses.iter().copied())
                .collect();
            let tree = Quadtree::build(&bodies, cfg.theta);
            for (i, &p) in positions.iter().enumerate() {
                forces[i] += tree.repulsion_at(p, tuning.repulsion_strength * masses[i], cfg.epsilon);
            }
            return;
        }

        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let delta = positions[i] - positions[j];
                let len = delta.length();
                if len == 0.0 {
                    // Exactly coincident: no direction to push along.
                    continue;
                }
                let mut distance = len;
                if tuning.adjust_sizes {
                    // Sized bodies: repulsion acts on the gap between
                    // visual footprints, not between centers.
                    distance -= 2.0 * cfg.node_radius;
                }
                let distance = distance.max(cfg.epsilon);
                let magnitude =
                    tuning.repulsion_strength * masses[i] * masses[j] / (distance * distance);
                let push = delta * (magnitude / len);
                forces[i] += push;
                forces[j] -= push;
            }
        }
    }

    fn apply_attraction(&self, graph: &Graph, positions: &[Vec2], forces: &mut [Vec2]) {
        let cfg = &self.config;
        for &(s, t) in graph.edges() {
            let delta = positions[t] - positions[s];
            let len = delta.length();
            if len == 0.0 {
                // Self-loops and coincident endpoints: zero-length spring.
                continue;
            }
            let mut magnitude = cfg.attraction * len;
            if cfg.hub_dampening {
                let lower = graph.nodes()[s].degree().min(graph.nodes()[t].degree()).max(1);
                magnitude /= f64::from(lower);
            }
            let pull = delta * (magnitude / len);
            forces[s] += pull;
            forces[t] -= pull;
        }
    }

    fn apply_gravity(&self, positions: &[Vec2], masses: &[f64], forces: &mut [Vec2]) {
        let gravity = self.config.gravity;
        let centroid = positions.iter().fold(Vec2::ZERO, |acc, &p| acc + p) / positions.len() as f64;
        for (i, &p) in positions.iter().enumerate() {
            // |centroid - p| times the unit direction is just the delta.
            forces[i] += (centroid - p) * (gravity * masses[i]);
        }
    }
}
