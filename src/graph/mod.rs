//! Graph model and the force-directed layout machinery.

pub mod model;
pub mod quadtree;
pub mod runner;
pub mod schedule;
pub mod simulator;

pub use model::{Graph, LayoutResult, Node, NodeId, Vec2};
pub use runner::{Budget, CancelToken, LayoutRunner, RunState};
pub use schedule::{ParameterSchedule, Scheduled, Tuning};
pub use simulator::{ForceSimulator, SimulatorConfig};
