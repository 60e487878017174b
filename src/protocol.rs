//! Wire contract: request payload, canonical cache key, response
//! envelope.
//!
//! Request example:
//!
//! ```json
//! {
//!     "nodes": ["n1", "n2", "n3", "n4"],
//!     "edges": [["n1", "n2"], ["n1", "n3"], ["n3", "n4"]],
//!     "presets": {"n1": [100.0, 200.0]}
//! }
//! ```
//!
//! Response example:
//!
//! ```json
//! {
//!     "status": "ok",
//!     "message": "<hex digest>",
//!     "data": {"n1": [-63.5, 309.6], "n2": [42.0, -66.7]}
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LayoutError;
use crate::graph::model::LayoutResult;

/// The documented request payload. `edges` and `presets` may be omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutRequest {
    pub nodes: Vec<String>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
    /// Initial coordinate hints keyed by node id. A sorted map, so preset
    /// application consumes the run's RNG in a fixed order.
    #[serde(default)]
    pub presets: BTreeMap<String, (f64, f64)>,
}

impl LayoutRequest {
    pub fn parse(raw: &str) -> Result<Self, LayoutError> {
        serde_json::from_str(raw).map_err(|e| LayoutError::Parse(e.to_string()))
    }

    /// Content key: Sha256 over a canonical serialization of the request.
    ///
    /// Element order in the incoming payload does not affect the key:
    /// node ids are sorted, edge pairs are normalized (undirected) and
    /// sorted, presets are already sorted by id. Changing any of this
    /// (or the digest algorithm) invalidates every stored cache entry.
    pub fn cache_key(&self) -> String {
        let mut nodes: Vec<&str> = self.nodes.iter().map(String::as_str).collect();
        nodes.sort_unstable();

        let mut edges: Vec<(&str, &str)> = self
            .edges
            .iter()
            .map(|(a, b)| {
                if a <= b {
                    (a.as_str(), b.as_str())
                } else {
                    (b.as_str(), a.as_str())
                }
            })
            .collect();
        edges.sort_unstable();

        let canonical = serde_json::json!({
            "nodes": nodes,
            "edges": edges,
            "presets": self.presets,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex(&hasher.finalize())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// `data` is the per-node coordinate map on success and the literal `""`
/// on error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Coordinates(LayoutResult),
    Empty(String),
}

/// The envelope returned for every request, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutResponse {
    pub status: Status,
    /// Hex digest of the request on success; diagnostic text on error.
    pub message: String,
    pub data: ResponseData,
}

impl LayoutResponse {
    pub fn ok(key: impl Into<String>, result: LayoutResult) -> Self {
        Self {
            status: Status::Ok,
            message: key.into(),
            data: ResponseData::Coordinates(result),
        }
    }

    pub fn error(err: &LayoutError) -> Self {
        Self {
            status: Status::Error,
            message: err.to_string(),
            data: ResponseData::Empty(String::new()),
        }
    }
}
