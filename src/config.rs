// Configuration for the vchamber client engine

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Serialize, Deserialize};

use crate::error::Result;

/// Tunable knobs of the synchronization engine.
///
/// All fields have working defaults; a JSON config file may override any
/// subset of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval between latency probes in milliseconds
    pub ping_interval_ms: u64,

    /// Window after a pause event within which a play or seek marks the
    /// pause as bouncy, in milliseconds
    pub bouncy_pause_threshold_ms: u64,

    /// Ring size of the latency sample window
    pub latency_window: usize,

    /// Samples required before control limits and smoothing engage
    pub min_latency_samples: usize,

    /// Lower bound on the position tolerance window in seconds
    pub position_tolerance_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 1000,
            bouncy_pause_threshold_ms: 10,
            latency_window: 20,
            min_latency_samples: 11,
            position_tolerance_floor: 0.1,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file, filling omitted fields with
    /// their defaults
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading engine configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn bouncy_pause_threshold(&self) -> Duration {
        Duration::from_millis(self.bouncy_pause_threshold_ms)
    }
}
