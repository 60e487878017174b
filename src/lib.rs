//! Time-bounded force-directed graph layout with a content-addressed
//! result cache.
//!
//! Given a set of nodes, undirected edges and optional position hints,
//! the engine runs a repulsion / attraction / gravity simulation for a
//! fixed budget and returns 2D coordinates per node. Completed layouts
//! are cached by a canonical digest of the request, so resubmitting the
//! same graph never pays for a second simulation, and concurrent
//! identical requests coalesce into a single run.
//!
//! [`RequestHandler`] is the front door; the pieces underneath
//! ([`Graph`], [`ParameterSchedule`], [`ForceSimulator`],
//! [`LayoutRunner`], [`ResultCache`]) are public for callers that want
//! to drive a layout directly.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod handler;
pub mod protocol;

pub use cache::ResultCache;
pub use config::EngineConfig;
pub use error::LayoutError;
pub use graph::{
    Budget, CancelToken, ForceSimulator, Graph, LayoutResult, LayoutRunner, ParameterSchedule,
    RunState, SimulatorConfig, Vec2,
};
pub use handler::RequestHandler;
pub use protocol::{LayoutRequest, LayoutResponse, ResponseData, Status};
