//! Engine configuration with disk-backed overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::runner::Budget;
use crate::graph::schedule::ParameterSchedule;
use crate::graph::simulator::SimulatorConfig;

/// Everything tunable about the engine. Every field has a default, so a
/// config file only needs to name what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: SimulatorConfig,
    pub schedule: ParameterSchedule,
    /// Wall-clock run budget in seconds.
    pub budget_secs: f64,
    /// Cache directory; `None` resolves to the platform cache dir.
    pub cache_dir: Option<PathBuf>,
    /// Simultaneous simulation runs; excess requests queue.
    pub max_concurrent_runs: usize,
    /// Seed for preset jitter and position seeding. Fixed so identical
    /// requests reproduce identical layouts.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            physics: SimulatorConfig::default(),
            schedule: ParameterSchedule::default(),
            budget_secs: 240.0,
            cache_dir: None,
            max_concurrent_runs: 2,
            seed: 0,
        }
    }
}

impl EngineConfig {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("force-layout");
            p.push("config.json");
            p
        })
    }

    /// Loads overrides from disk, falling back to defaults when the file
    /// is absent or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            tracing::warn!("could not determine config directory, using defaults");
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            // Absent config is the common case.
            Err(_) => Self::default(),
        }
    }

    pub fn budget(&self) -> Budget {
        // max() also normalizes NaN to zero.
        Budget::WallClock(Duration::from_secs_f64(self.budget_secs.max(0.0)))
    }
}
