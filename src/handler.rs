//! Request validation, cache resolution and run orchestration.
//!
//! The flow for one request: parse → build the graph (rejecting the
//! whole request on anything worse than an unknown preset) → answer from
//! the cache when possible → otherwise run the simulation once, no
//! matter how many identical requests are in flight, and publish the
//! result.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, OnceCell, Semaphore};

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::error::LayoutError;
use crate::graph::model::{Graph, LayoutResult};
use crate::graph::runner::{CancelToken, LayoutRunner, RunState};
use crate::protocol::{LayoutRequest, LayoutResponse};

/// One in-flight computation, shared by every caller awaiting its key.
type Flight = Arc<OnceCell<Result<LayoutResult, LayoutError>>>;

/// Front door of the engine: validates requests, answers from the cache
/// when possible, and coalesces concurrent identical requests into a
/// single simulation run.
pub struct RequestHandler {
    config: EngineConfig,
    cache: ResultCache,
    permits: Semaphore,
    in_flight: Mutex<HashMap<String, Flight>>,
    runs_completed: AtomicU64,
}

impl RequestHandler {
    pub fn new(config: EngineConfig) -> Self {
        let dir = config
            .cache_dir
            .clone()
            .or_else(ResultCache::default_dir)
            .unwrap_or_else(|| PathBuf::from("force-layout-cache"));
        tracing::info!(
            cache_dir = %dir.display(),
            max_concurrent_runs = config.max_concurrent_runs,
            "request handler ready"
        );
        Self {
            cache: ResultCache::new(dir),
            permits: Semaphore::new(config.max_concurrent_runs.max(1)),
            in_flight: Mutex::new(HashMap::new()),
            runs_completed: AtomicU64::new(0),
            config,
        }
    }

    /// Simulation runs actually executed. Cache hits and coalesced
    /// callers don't count; two identical requests cost one run.
    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub async fn handle(&self, raw: &str) -> LayoutResponse {
        self.handle_with_cancel(raw, CancelToken::new()).await
    }

    /// Like [`RequestHandler::handle`], with a cooperative cancellation
    /// token. A cancelled run still answers with the best partial layout.
    pub async fn handle_with_cancel(&self, raw: &str, cancel: CancelToken) -> LayoutResponse {
        let request = match LayoutRequest::parse(raw) {
            Ok(r) => r,
            Err(e) => return LayoutResponse::error(&e),
        };

        // Validation rejects the whole request before any cache traffic.
        let graph = match build_graph(&request) {
            Ok(g) => g,
            Err(e) => return LayoutResponse::error(&e),
        };

        let key = request.cache_key();

        match self.cache.get(&key) {
            Ok(Some(result)) => {
                tracing::debug!(%key, "cache hit");
                return LayoutResponse::ok(&key, result);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%key, "cache read failed, recomputing: {e}"),
        }

        // Single-flight: the first caller for a key runs the simulation;
        // concurrent duplicates await the same cell and share its result.
        let flight: Flight = {
            let mut map = self.in_flight.lock().await;
            Arc::clone(map.entry(key.clone()).or_default())
        };

        let outcome = flight
            .get_or_init(|| self.compute(request, graph, &key, cancel))
            .await
            .clone();

        self.in_flight.lock().await.remove(&key);

        match outcome {
            Ok(result) => LayoutResponse::ok(&key, result),
            Err(e) => LayoutResponse::error(&e),
        }
    }

    /// Runs the layout under a concurrency permit and publishes the
    /// result. Only ever executed by the single-flight winner.
    async fn compute(
        &self,
        request: LayoutRequest,
        mut graph: Graph,
        key: &str,
        cancel: CancelToken,
    ) -> Result<LayoutResult, LayoutError> {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Err(LayoutError::Worker("run limiter closed".into())),
        };

        let physics = self.config.physics;
        let schedule = self.config.schedule;
        let budget = self.config.budget();
        let seed = self.config.seed;

        let (state, result) = tokio::task::spawn_blocking(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            for (id, (x, y)) in &request.presets {
                if let Err(e) = graph.apply_preset(id, *x, *y, &mut rng) {
                    tracing::warn!("skipping preset: {e}");
                }
            }
            let mut runner = LayoutRunner::new(physics, schedule);
            let result = runner.run(&mut graph, budget, &cancel, &mut rng)?;
            Ok::<_, LayoutError>((runner.state(), result))
        })
        .await
        .map_err(|e| LayoutError::Worker(format!("layout task failed: {e}")))??;

        self.runs_completed.fetch_add(1, Ordering::Relaxed);

        if state == RunState::Cancelled {
            // A partial layout is fine to serve once, not to replay.
            tracing::debug!(%key, "cancelled run left uncached");
        } else if let Err(e) = self.cache.put(key, &result) {
            tracing::warn!(%key, "cache write failed, serving uncached: {e}");
        }
        Ok(result)
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &ResultCache {
        &self.cache
    }
}

/// Builds and validates the graph. Presets are applied later, inside the
/// run, so their jitter draws from the per-run RNG.
fn build_graph(request: &LayoutRequest) -> Result<Graph, LayoutError> {
    let mut graph = Graph::new();
    for id in &request.nodes {
        graph.add_node(id.clone())?;
    }
    for (source, target) in &request.edges {
        graph.add_edge(source, target)?;
    }
    Ok(graph)
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod handler_tests;
