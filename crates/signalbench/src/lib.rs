//! # signalbench
//!
//! A multi-agent reinforcement-learning benchmark harness for traffic-signal
//! control.
//!
//! ## Overview
//!
//! signalbench provides:
//! - A synchronous episode orchestrator ([`env::MultiSignalEnv`]) that drives an
//!   external microscopic traffic simulator in fixed-length decision steps
//! - A mandatory yellow-transition protocol between committed green phases
//! - Staggered handover of intersections from fixed-time baseline to agent control
//! - Pluggable state/reward functions and per-episode CSV metric logs
//!
//! The simulator itself is an external collaborator behind the
//! [`sim::SimulatorBackend`] trait; a deterministic synthetic backend
//! ([`sim::MockNetwork`]) is included for tests and offline benchmarking.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use signalbench::prelude::*;
//!
//! let config = EnvConfig::new("demo", "mock4").end_time(3600.0);
//! let mut env = MultiSignalEnv::new(MockNetwork::with_grid(4, 42), config,
//!     obs::wave(), obs::wait())?;
//! let obs = env.reset()?;
//! ```

pub mod agents;
pub mod config;
pub mod env;
pub mod metrics;
pub mod obs;
pub mod signal;
pub mod sim;
pub mod spaces;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agents::{FixedTimePolicy, GraphPolicy, Policy};
    pub use crate::config::{EnvConfig, MapConfig};
    pub use crate::env::{ActionBatch, EntryKind, MultiSignalEnv, ObsBatch, StepOutput};
    pub use crate::obs;
    pub use crate::signal::SignalController;
    pub use crate::sim::{LaneReading, MockNetwork, SessionRequest, SimSession, SimulatorBackend};
    pub use crate::spaces::{BoxSpace, Discrete, DynSpace, Space};
    pub use crate::{EnvError, Result};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// Malformed or missing simulator/network/route inputs. Fatal to the
    /// `reset()` that raised it.
    #[error("configuration error: {0}")]
    Config(String),

    /// No action supplied for an active intersection.
    #[error("missing action for active signal '{0}'")]
    MissingAction(String),

    /// Action supplied for a signal outside the active set.
    #[error("action supplied for inactive or unknown signal '{0}'")]
    UnexpectedAction(String),

    /// Ordered action batch does not match the active-set size.
    #[error("action count mismatch: expected {expected}, got {actual}")]
    ActionCountMismatch { expected: usize, actual: usize },

    /// Phase index outside the signal's phase table.
    #[error("phase index {index} out of range for signal '{signal}' ({len} phases)")]
    PhaseOutOfRange {
        signal: String,
        index: usize,
        len: usize,
    },

    /// `step()` called with no live episode.
    #[error("no active episode; call reset() first")]
    NoEpisode,

    /// The external simulator reported an error or disconnected. Never retried
    /// internally; the caller is expected to reset.
    #[error("simulator failure: {0}")]
    Simulator(String),

    /// Failure persisting a metric log. Does not roll back simulation state
    /// already advanced.
    #[error("metrics I/O error: {0}")]
    Metrics(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, EnvError>;
