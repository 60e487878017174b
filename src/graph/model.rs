//! Graph data model: the node/edge set and live positions for one run.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

use rand::Rng;

use crate::error::LayoutError;

/// Opaque caller-supplied node identifier.
pub type NodeId = String;

/// Final coordinates, one entry per node in the input graph. Sorted so
/// serialization is canonical.
pub type LayoutResult = BTreeMap<NodeId, [f64; 2]>;

/// Half-extent of the seeding region per sqrt(node), world units.
const SEED_SPACING: f64 = 50.0;

/// Minimal 2D vector. Positions and forces are f64 end to end.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

/// A node with its live position.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub position: Vec2,
    degree: u32,
    /// Positioned by a preset; random seeding leaves it alone.
    pinned: bool,
}

impl Node {
    /// Degree-derived mass. Isolated nodes weigh exactly 1; a self-loop
    /// counts 2 toward its endpoint.
    pub fn mass(&self) -> f64 {
        1.0 + f64::from(self.degree)
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }
}

/// Node set keyed by id plus an undirected edge list.
///
/// Nodes live in a `Vec` in insertion order with a side index by id, so
/// nothing iterates in hash order and fixed-seed runs reproduce exactly.
/// Edges are resolved to node indices at construction; the invariant that
/// both endpoints exist is enforced there and never rechecked.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<(usize, usize)>,
    index: HashMap<NodeId, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Edges as index pairs into [`Graph::nodes`].
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.index.get(id).map(|&i| self.nodes[i].position)
    }

    /// Fails with `DuplicateNode` when the id is already present.
    pub fn add_node(&mut self, id: impl Into<NodeId>) -> Result<(), LayoutError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(LayoutError::DuplicateNode(id));
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(Node {
            id,
            position: Vec2::ZERO,
            degree: 0,
            pinned: false,
        });
        Ok(())
    }

    /// Adds an undirected edge; directed input collapses to the same
    /// spring. Fails with `InvalidReference` if either endpoint is absent.
    ///
    /// Self-loops are kept but exert no attraction (zero-length spring);
    /// parallel edges each pull on their own.
    pub fn add_edge(&mut self, source: &str, target: &str) -> Result<(), LayoutError> {
        let missing = |id: &str| LayoutError::InvalidReference {
            from: source.to_owned(),
            to: target.to_owned(),
            missing: id.to_owned(),
        };
        let s = *self.index.get(source).ok_or_else(|| missing(source))?;
        let t = *self.index.get(target).ok_or_else(|| missing(target))?;
        self.nodes[s].degree += 1;
        self.nodes[t].degree += 1;
        self.edges.push((s, t));
        Ok(())
    }

    /// Pins a node to a caller-supplied coordinate hint plus sub-unit
    /// jitter, so presets placed on the exact same spot still repel.
    /// Fails with `UnknownPreset` if the id is absent; callers treat that
    /// as a warning, not a rejection.
    pub fn apply_preset<R: Rng>(
        &mut self,
        id: &str,
        x: f64,
        y: f64,
        rng: &mut R,
    ) -> Result<(), LayoutError> {
        let i = *self
            .index
            .get(id)
            .ok_or_else(|| LayoutError::UnknownPreset(id.to_owned()))?;
        let node = &mut self.nodes[i];
        node.position = Vec2::new(x + rng.gen::<f64>(), y + rng.gen::<f64>());
        node.pinned = true;
        Ok(())
    }

    /// Seeds every node without a preset uniformly inside a square whose
    /// half-extent grows with node count. An all-zero start would leave
    /// early repulsion with no direction to push along.
    pub fn seed_positions<R: Rng>(&mut self, rng: &mut R) {
        let extent = SEED_SPACING * (self.nodes.len() as f64).sqrt();
        for node in &mut self.nodes {
            if !node.pinned {
                node.position = Vec2::new(
                    rng.gen_range(-extent..extent),
                    rng.gen_range(-extent..extent),
                );
            }
        }
    }

    /// Current positions as a [`LayoutResult`].
    pub fn snapshot(&self) -> LayoutResult {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), [n.position.x, n.position.y]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        assert!(matches!(
            g.add_node("a"),
            Err(LayoutError::DuplicateNode(id)) if id == "a"
        ));
    }

    #[test]
    fn edge_to_unknown_node_rejected() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        let err = g.add_edge("a", "nope").unwrap_err();
        assert!(matches!(
            err,
            LayoutError::InvalidReference { missing, .. } if missing == "nope"
        ));
        assert!(g.edges().is_empty());
    }

    #[test]
    fn mass_tracks_degree() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        g.add_node("b").unwrap();
        g.add_node("c").unwrap();
        g.add_edge("a", "b").unwrap();
        g.add_edge("a", "c").unwrap();
        assert_eq!(g.nodes()[0].mass(), 3.0);
        assert_eq!(g.nodes()[1].mass(), 2.0);
        // Isolated node keeps the minimum mass.
        g.add_node("d").unwrap();
        assert_eq!(g.nodes()[3].mass(), 1.0);
    }

    #[test]
    fn self_loop_counts_twice() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        g.add_edge("a", "a").unwrap();
        assert_eq!(g.nodes()[0].degree(), 2);
        assert_eq!(g.nodes()[0].mass(), 3.0);
    }

    #[test]
    fn unknown_preset_is_reported() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        let err = g.apply_preset("missing", 1.0, 2.0, &mut rng()).unwrap_err();
        assert!(matches!(err, LayoutError::UnknownPreset(id) if id == "missing"));
    }

    #[test]
    fn preset_jitter_is_sub_unit() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        g.apply_preset("a", 100.0, 200.0, &mut rng()).unwrap();
        let p = g.position("a").unwrap();
        assert!(p.x >= 100.0 && p.x < 101.0);
        assert!(p.y >= 200.0 && p.y < 201.0);
    }

    #[test]
    fn seeding_skips_pinned_nodes() {
        let mut g = Graph::new();
        g.add_node("pinned").unwrap();
        g.add_node("free").unwrap();
        let mut r = rng();
        g.apply_preset("pinned", 1000.0, 1000.0, &mut r).unwrap();
        g.seed_positions(&mut r);

        let pinned = g.position("pinned").unwrap();
        assert!(pinned.x >= 1000.0 && pinned.x < 1001.0);

        let extent = SEED_SPACING * 2.0_f64.sqrt();
        let free = g.position("free").unwrap();
        assert!(free.x.abs() <= extent && free.y.abs() <= extent);
    }

    #[test]
    fn snapshot_covers_every_node() {
        let mut g = Graph::new();
        g.add_node("b").unwrap();
        g.add_node("a").unwrap();
        let snap = g.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.contains_key("a") && snap.contains_key("b"));
    }
}
