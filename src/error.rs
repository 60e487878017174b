//! Error taxonomy for the layout service.

use thiserror::Error;

/// Everything that can go wrong between request parsing and response
/// assembly.
///
/// Variants own their data so the whole enum is `Clone`: coalesced
/// requests share a single `Result` across every caller awaiting the
/// same cache key.
#[derive(Debug, Clone, Error)]
pub enum LayoutError {
    /// Request body is not the documented JSON shape.
    #[error("malformed request: {0}")]
    Parse(String),

    /// A node id appeared more than once in the request.
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// An edge references a node absent from the node set.
    #[error("edge [{from}, {to}] references unknown node {missing}")]
    InvalidReference {
        from: String,
        to: String,
        missing: String,
    },

    /// A preset references a node absent from the node set. Non-fatal:
    /// callers log a warning and skip the preset.
    #[error("preset references unknown node: {0}")]
    UnknownPreset(String),

    /// The cache could not be read or written. Never fails a request;
    /// callers recompute (or skip the write) and still serve the layout.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The simulation produced a non-finite position. Indicates a
    /// misconfigured schedule or constant; fatal for the request.
    #[error("simulation fault: {0}")]
    SimulationFault(String),

    /// A worker task died before delivering its result.
    #[error("worker failed: {0}")]
    Worker(String),
}
