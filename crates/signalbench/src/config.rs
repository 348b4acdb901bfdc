//! Environment and per-map configuration records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{EnvError, Result};

/// Configuration for one benchmark environment instance.
///
/// `step_length` and `yellow_length` are in decision-window ticks; one window
/// tick expands to `step_ratio` simulator ticks (scenarios with sub-second
/// simulator steps use a ratio > 1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Run-identifying string, prefixed to the connection label and log paths
    pub run_name: String,
    /// Map/scenario name
    pub map_name: String,
    /// Network description passed to the simulator backend
    pub net: PathBuf,
    /// Route file stem; episode `n` loads `<route>_<n>.rou.xml`
    pub route: Option<PathBuf>,
    /// Simulated time at which an episode terminates
    pub end_time: f64,
    /// Decision-window length in window ticks
    pub step_length: u32,
    /// Yellow/transition interval in window ticks; strictly less than `step_length`
    pub yellow_length: u32,
    /// Simulator ticks per window tick
    pub step_ratio: u32,
    /// Maximum sensing distance per lane, in meters
    pub max_distance: f32,
    /// Window ticks to run with no agent control after session open
    pub warmup: u32,
    /// Launch the simulator GUI
    pub gui: bool,
    /// Explicit controllable-intersection list; empty means all signals
    pub lights: Vec<String>,
    /// Number of intersections under agent control in episode 1.
    /// `None` starts them all; `Some(k)` staggers one more in every 30th episode.
    pub initial_active: Option<usize>,
    /// Directory receiving per-episode metric logs
    pub log_dir: PathBuf,
    /// Return observations/rewards as an ordered sequence instead of a map
    pub ordered_returns: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            run_name: "run".into(),
            map_name: "default".into(),
            net: PathBuf::from("network.net.xml"),
            route: None,
            end_time: 3600.0,
            step_length: 10,
            yellow_length: 4,
            step_ratio: 1,
            max_distance: 200.0,
            warmup: 0,
            gui: false,
            lights: Vec::new(),
            initial_active: None,
            log_dir: PathBuf::from("logs"),
            ordered_returns: false,
        }
    }
}

impl EnvConfig {
    /// Create a config with the given run and map names.
    pub fn new(run_name: impl Into<String>, map_name: impl Into<String>) -> Self {
        Self {
            run_name: run_name.into(),
            map_name: map_name.into(),
            ..Default::default()
        }
    }

    /// Set the episode end time.
    pub fn end_time(mut self, t: f64) -> Self {
        self.end_time = t;
        self
    }

    /// Set the decision-window length.
    pub fn step_length(mut self, n: u32) -> Self {
        self.step_length = n;
        self
    }

    /// Set the yellow-transition length.
    pub fn yellow_length(mut self, n: u32) -> Self {
        self.yellow_length = n;
        self
    }

    /// Set the simulator tick multiplier.
    pub fn step_ratio(mut self, n: u32) -> Self {
        self.step_ratio = n;
        self
    }

    /// Set the warmup tick count.
    pub fn warmup(mut self, n: u32) -> Self {
        self.warmup = n;
        self
    }

    /// Set the log directory.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Set the initial agent-controlled intersection count (staggering start).
    pub fn initial_active(mut self, n: usize) -> Self {
        self.initial_active = Some(n);
        self
    }

    /// Request ordered-sequence returns.
    pub fn ordered_returns(mut self, on: bool) -> Self {
        self.ordered_returns = on;
        self
    }

    /// Validate interval relationships before a session is opened.
    pub fn validate(&self) -> Result<()> {
        if self.step_length == 0 {
            return Err(EnvError::Config("step_length must be positive".into()));
        }
        if self.yellow_length >= self.step_length {
            return Err(EnvError::Config(format!(
                "yellow_length ({}) must be strictly less than step_length ({})",
                self.yellow_length, self.step_length
            )));
        }
        if self.step_ratio == 0 {
            return Err(EnvError::Config("step_ratio must be positive".into()));
        }
        if self.end_time <= 0.0 {
            return Err(EnvError::Config("end_time must be positive".into()));
        }
        Ok(())
    }
}

/// Typed per-map configuration for baseline policies.
///
/// Loaded once per run and passed by reference; replaces any runtime
/// string-keyed lookup of map properties.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapConfig {
    /// Map/scenario name this record applies to
    pub name: String,
    /// Movement index pairs served by each phase, indexed by phase
    pub phase_pairs: Vec<[usize; 2]>,
    /// Optional per-signal restriction of selectable phase indices
    #[serde(default)]
    pub valid_actions: HashMap<String, Vec<usize>>,
}

impl MapConfig {
    /// Load a map record from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| EnvError::Config(format!("bad map config {}: {e}", path.display())))
    }

    /// Selectable phase indices for one signal, falling back to the full table.
    pub fn valid_actions_for(&self, signal: &str, table_len: usize) -> Vec<usize> {
        self.valid_actions
            .get(signal)
            .cloned()
            .unwrap_or_else(|| (0..table_len).collect())
    }
}
