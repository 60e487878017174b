//! Drives the simulator against a fixed budget.
//!
//! Termination is purely budget-bounded; there is no energy or
//! displacement convergence check. The contract is "run for this long",
//! and a cancelled run still answers with the best layout computed so
//! far.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::LayoutError;
use crate::graph::model::{Graph, LayoutResult};
use crate::graph::schedule::ParameterSchedule;
use crate::graph::simulator::{ForceSimulator, SimulatorConfig};

/// Lifecycle of one layout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// How long a run may iterate.
///
/// `WallClock` is the service contract ("run for N minutes");
/// `Iterations` pins the exact amount of work, which is what reproducible
/// runs and tests want. The schedule sees elapsed fraction either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    WallClock(Duration),
    Iterations(u32),
}

impl Default for Budget {
    /// Four minutes; callers override per run.
    fn default() -> Self {
        Budget::WallClock(Duration::from_secs(240))
    }
}

/// Cooperative cancellation flag. Checked between iterations only,
/// never mid-iteration, and with no forced preemption.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct LayoutRunner {
    simulator: ForceSimulator,
    schedule: ParameterSchedule,
    state: RunState,
    iterations: u64,
}

impl LayoutRunner {
    pub fn new(config: SimulatorConfig, schedule: ParameterSchedule) -> Self {
        Self {
            simulator: ForceSimulator::new(config),
            schedule,
            state: RunState::Idle,
            iterations: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Iterations actually executed by the last run.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Seeds any node the presets left unpositioned, then iterates until
    /// the budget is exhausted or `cancel` fires. Either way the current
    /// positions are snapshotted into the result: cancellation means
    /// best-effort partial output, not failure.
    pub fn run<R: Rng>(
        &mut self,
        graph: &mut Graph,
        budget: Budget,
        cancel: &CancelToken,
        rng: &mut R,
    ) -> Result<LayoutResult, LayoutError> {
        debug_assert!(matches!(self.state, RunState::Idle), "runner reused");
        self.state = RunState::Running;
        graph.seed_positions(rng);

        if graph.is_empty() {
            // Nothing to iterate on; don't sit out the budget.
            self.state = RunState::Completed;
            return Ok(LayoutResult::new());
        }

        let started = Instant::now();
        loop {
            let fraction = match budget {
                Budget::WallClock(total) => {
                    if total.is_zero() {
                        1.0
                    } else {
                        started.elapsed().as_secs_f64() / total.as_secs_f64()
                    }
                }
                Budget::Iterations(n) => {
                    if n == 0 {
                        1.0
                    } else {
                        self.iterations as f64 / f64::from(n)
                    }
                }
            };

            if fraction >= 1.0 {
                self.state = RunState::Completed;
                break;
            }
            if cancel.is_cancelled() {
                self.state = RunState::Cancelled;
                break;
            }

            let tuning = self.schedule.at(fraction);
            self.simulator.step(graph, &tuning)?;
            self.iterations += 1;
        }

        tracing::debug!(
            iterations = self.iterations,
            state = ?self.state,
            nodes = graph.len(),
            "layout run finished"
        );
        Ok(graph.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::Vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chain(ids: &[&str]) -> Graph {
        let mut g = Graph::new();
        for id in ids {
            g.add_node(*id).unwrap();
        }
        for pair in ids.windows(2) {
            g.add_edge(pair[0], pair[1]).unwrap();
        }
        g
    }

    fn run(
        graph: &mut Graph,
        budget: Budget,
        cancel: &CancelToken,
        seed: u64,
    ) -> (LayoutRunner, LayoutResult) {
        let mut runner = LayoutRunner::new(SimulatorConfig::default(), ParameterSchedule::default());
        let mut rng = StdRng::seed_from_u64(seed);
        let result = runner.run(graph, budget, cancel, &mut rng).unwrap();
        (runner, result)
    }

    #[test]
    fn completes_after_the_iteration_budget() {
        let mut g = chain(&["a", "b", "c"]);
        let (runner, result) = run(&mut g, Budget::Iterations(25), &CancelToken::new(), 1);
        assert_eq!(runner.state(), RunState::Completed);
        assert_eq!(runner.iterations(), 25);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn fixed_seed_runs_are_bit_identical() {
        let mut g1 = chain(&["a", "b", "c", "d"]);
        let mut g2 = chain(&["a", "b", "c", "d"]);
        let (_, r1) = run(&mut g1, Budget::Iterations(200), &CancelToken::new(), 42);
        let (_, r2) = run(&mut g2, Budget::Iterations(200), &CancelToken::new(), 42);
        assert_eq!(r1, r2);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut g1 = chain(&["a", "b", "c", "d"]);
        let mut g2 = chain(&["a", "b", "c", "d"]);
        let (_, r1) = run(&mut g1, Budget::Iterations(10), &CancelToken::new(), 1);
        let (_, r2) = run(&mut g2, Budget::Iterations(10), &CancelToken::new(), 2);
        assert_ne!(r1, r2);
    }

    #[test]
    fn every_coordinate_stays_finite() {
        let mut g = chain(&["a", "b", "c", "d", "e", "f"]);
        g.add_edge("a", "f").unwrap();
        let (_, result) = run(&mut g, Budget::Iterations(500), &CancelToken::new(), 3);
        for (id, [x, y]) in &result {
            assert!(x.is_finite() && y.is_finite(), "{id} went non-finite");
        }
    }

    #[test]
    fn cancellation_returns_the_partial_snapshot() {
        let mut g = chain(&["a", "b"]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let (runner, result) = run(&mut g, Budget::WallClock(Duration::from_secs(3600)), &cancel, 1);
        assert_eq!(runner.state(), RunState::Cancelled);
        assert_eq!(runner.iterations(), 0);
        // Still one finite entry per node: the seeded positions.
        assert_eq!(result.len(), 2);
        for [x, y] in result.values() {
            assert!(x.is_finite() && y.is_finite());
        }
    }

    #[test]
    fn empty_graph_completes_immediately() {
        let mut g = Graph::new();
        let (runner, result) = run(&mut g, Budget::WallClock(Duration::from_secs(3600)), &CancelToken::new(), 1);
        assert_eq!(runner.state(), RunState::Completed);
        assert!(result.is_empty());
    }

    #[test]
    fn preset_node_stays_near_its_hint() {
        // A preset node attached to an unconnected cluster ends closer to
        // its hint than a cluster node without one, under a short budget.
        let mut g = chain(&["n1", "n2", "n3"]);
        g.add_node("n4").unwrap();
        g.add_edge("n4", "n1").unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        g.apply_preset("n4", 100.0, 200.0, &mut rng).unwrap();

        let mut runner = LayoutRunner::new(SimulatorConfig::default(), ParameterSchedule::default());
        runner
            .run(&mut g, Budget::Iterations(10), &CancelToken::new(), &mut rng)
            .unwrap();

        let hint = Vec2::new(100.0, 200.0);
        let preset_dist = (g.position("n4").unwrap() - hint).length();
        let plain_dist = (g.position("n3").unwrap() - hint).length();
        assert!(
            preset_dist < plain_dist,
            "preset node at {preset_dist}, plain node at {plain_dist}"
        );
    }
}
