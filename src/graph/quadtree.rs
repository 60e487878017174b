//! Barnes-Hut quadtree for approximate repulsion.
//!
//! Far-away groups of bodies are folded into a single center of mass, so
//! one repulsion pass costs O(n log n) instead of visiting every pair.
//! Exactness is tunable through `theta`; `theta = 0` degenerates to the
//! exact pairwise sum.

use super::model::Vec2;

/// Coincident bodies stop splitting past this depth.
const MAX_DEPTH: u32 = 48;

/// A cell: empty, a single body, or four sub-cells with aggregate mass.
#[derive(Debug, Default)]
enum Cell {
    #[default]
    Empty,
    Body {
        position: Vec2,
        mass: f64,
    },
    Cluster {
        center_of_mass: Vec2,
        total_mass: f64,
        /// NW, NE, SW, SE.
        children: Box<[Cell; 4]>,
    },
}

/// Square region covered by one cell.
#[derive(Debug, Clone, Copy)]
struct Region {
    min: Vec2,
    max: Vec2,
}

impl Region {
    fn center(&self) -> Vec2 {
        Vec2::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }

    fn size(&self) -> f64 {
        (self.max.x - self.min.x).max(self.max.y - self.min.y)
    }

    /// 0 = NW, 1 = NE, 2 = SW, 3 = SE.
    fn quadrant(&self, p: Vec2) -> usize {
        let c = self.center();
        match (p.y >= c.y, p.x >= c.x) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }

    fn child(&self, quadrant: usize) -> Region {
        let c = self.center();
        match quadrant {
            0 => Region { min: self.min, max: c },
            1 => Region {
                min: Vec2::new(c.x, self.min.y),
                max: Vec2::new(self.max.x, c.y),
            },
            2 => Region {
                min: Vec2::new(self.min.x, c.y),
                max: Vec2::new(c.x, self.max.y),
            },
            3 => Region { min: c, max: self.max },
            _ => unreachable!(),
        }
    }
}

pub struct Quadtree {
    root: Cell,
    region: Region,
    /// Cell size / distance threshold below which a cluster is summarized.
    theta: f64,
}

impl Quadtree {
    /// Builds the tree over `(position, mass)` bodies in slice order, which
    /// keeps the whole evaluation deterministic.
    pub fn build(bodies: &[(Vec2, f64)], theta: f64) -> Self {
        if bodies.is_empty() {
            return Self {
                root: Cell::Empty,
                region: Region {
                    min: Vec2::ZERO,
                    max: Vec2::ZERO,
                },
                theta,
            };
        }

        let mut min = bodies[0].0;
        let mut max = bodies[0].0;
        for &(p, _) in bodies {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        // Pad, then square up: quadrant splitting assumes a square region.
        min.x -= 1.0;
        min.y -= 1.0;
        max.x += 1.0;
        max.y += 1.0;
        let side = (max.x - min.x).max(max.y - min.y);
        max = Vec2::new(min.x + side, min.y + side);

        let region = Region { min, max };
        let mut root = Cell::Empty;
        for &(p, mass) in bodies {
            root = Self::insert(root, p, mass, region, 0);
        }

        Self { root, region, theta }
    }

    fn insert(cell: Cell, position: Vec2, mass: f64, region: Region, depth: u32) -> Cell {
        if depth > MAX_DEPTH {
            // Coincident points would split forever; drop the straggler.
            return cell;
        }

        match cell {
            Cell::Empty => Cell::Body { position, mass },

            Cell::Body {
                position: existing,
                mass: existing_mass,
            } => {
                let mut children: Box<[Cell; 4]> = Default::default();

                let q = region.quadrant(existing);
                children[q] = Self::insert(
                    std::mem::take(&mut children[q]),
                    existing,
                    existing_mass,
                    region.child(q),
                    depth + 1,
                );
                let q = region.quadrant(position);
                children[q] = Self::insert(
                    std::mem::take(&mut children[q]),
                    position,
                    mass,
                    region.child(q),
                    depth + 1,
                );

                let total_mass = existing_mass + mass;
                Cell::Cluster {
                    center_of_mass: (existing * existing_mass + position * mass) / total_mass,
                    total_mass,
                    children,
                }
            }

            Cell::Cluster {
                center_of_mass,
                total_mass,
                mut children,
            } => {
                let q = region.quadrant(position);
                children[q] = Self::insert(
                    std::mem::take(&mut children[q]),
                    position,
                    mass,
                    region.child(q),
                    depth + 1,
                );

                let new_total = total_mass + mass;
                Cell::Cluster {
                    center_of_mass: (center_of_mass * total_mass + position * mass) / new_total,
                    total_mass: new_total,
                    children,
                }
            }
        }
    }

    /// Net repulsion on a body at `position`. `strength` is the repulsion
    /// constant already multiplied by the body's own mass; `epsilon` floors
    /// the distance in the magnitude. The body itself contributes nothing
    /// (zero-length deltas are skipped).
    pub fn repulsion_at(&self, position: Vec2, strength: f64, epsilon: f64) -> Vec2 {
        self.accumulate(&self.root, position, strength, epsilon, self.region)
    }

    fn accumulate(
        &self,
        cell: &Cell,
        position: Vec2,
        strength: f64,
        epsilon: f64,
        region: Region,
    ) -> Vec2 {
        match cell {
            Cell::Empty => Vec2::ZERO,

            Cell::Body {
                position: body,
                mass,
            } => {
                let delta = position - *body;
                let len = delta.length();
                if len == 0.0 {
                    return Vec2::ZERO;
                }
                let distance = len.max(epsilon);
                let magnitude = strength * mass / (distance * distance);
                delta * (magnitude / len)
            }

            Cell::Cluster {
                center_of_mass,
                total_mass,
                children,
            } => {
                let delta = position - *center_of_mass;
                let len = delta.length();

                if len > 0.0 && region.size() / len < self.theta {
                    let distance = len.max(epsilon);
                    let magnitude = strength * total_mass / (distance * distance);
                    return delta * (magnitude / len);
                }

                let mut force = Vec2::ZERO;
                for (q, child) in children.iter().enumerate() {
                    force += self.accumulate(child, position, strength, epsilon, region.child(q));
                }
                force
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-4;

    #[test]
    fn force_points_away_from_the_other_body() {
        let bodies = vec![(Vec2::new(0.0, 0.0), 1.0), (Vec2::new(100.0, 0.0), 1.0)];
        let tree = Quadtree::build(&bodies, 1.0);

        let force = tree.repulsion_at(Vec2::new(0.0, 0.0), 1000.0, EPS);
        assert!(force.x < 0.0, "expected push left, got {force:?}");
        assert!(force.y.abs() < 1e-9);
    }

    #[test]
    fn zero_theta_matches_the_exact_pair_sum() {
        let bodies = vec![
            (Vec2::new(-40.0, 12.0), 1.0),
            (Vec2::new(3.0, -25.0), 2.0),
            (Vec2::new(18.0, 44.0), 3.0),
            (Vec2::new(71.0, -8.0), 1.0),
            (Vec2::new(-5.0, 60.0), 4.0),
        ];
        let tree = Quadtree::build(&bodies, 0.0);
        let strength = 500.0;

        for &(p, _) in &bodies {
            let mut exact = Vec2::ZERO;
            for &(other, mass) in &bodies {
                let delta = p - other;
                let len = delta.length();
                if len == 0.0 {
                    continue;
                }
                let d = len.max(EPS);
                exact += delta * (strength * mass / (d * d) / len);
            }
            let approx = tree.repulsion_at(p, strength, EPS);
            assert!((approx.x - exact.x).abs() < 1e-9);
            assert!((approx.y - exact.y).abs() < 1e-9);
        }
    }

    #[test]
    fn coincident_bodies_do_not_recurse_forever() {
        let bodies = vec![(Vec2::new(5.0, 5.0), 1.0); 8];
        let tree = Quadtree::build(&bodies, 1.0);
        // Query from a body's own position: self and its coincident twins
        // are all zero-length deltas.
        assert_eq!(tree.repulsion_at(Vec2::new(5.0, 5.0), 100.0, EPS), Vec2::ZERO);
    }

    #[test]
    fn empty_tree_exerts_nothing() {
        let tree = Quadtree::build(&[], 1.0);
        assert_eq!(tree.repulsion_at(Vec2::new(1.0, 2.0), 100.0, EPS), Vec2::ZERO);
    }
}
