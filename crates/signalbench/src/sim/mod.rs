//! Simulator abstraction.
//!
//! The traffic simulator is an external collaborator: this module defines the
//! session-handle surface the orchestrator consumes, plus a deterministic
//! synthetic backend for tests and offline benchmarking.
//!
//! Sessions are owned values. There is deliberately no process-global "current
//! connection" to switch between; an env instance threads its own session
//! through every call, so two instances with distinct labels can coexist in one
//! process without coordination.

mod mock;

pub use mock::{MockNetwork, MockSession, PhaseCommit};

use crate::Result;
use std::path::PathBuf;

/// Instantaneous per-lane sensor aggregate, capped by sensing distance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LaneReading {
    /// Halted vehicles on the lane
    pub queue: u32,
    /// Vehicles approaching within sensing range (includes the queue)
    pub approach: u32,
    /// Summed waiting time of vehicles currently on the lane, seconds
    pub total_wait: f64,
    /// Longest single-vehicle wait, seconds
    pub max_wait: f64,
}

/// Everything a backend needs to open one episode-scoped session.
#[derive(Clone, Debug)]
pub struct SessionRequest {
    /// Opaque session label; distinguishes concurrent environment instances
    pub label: String,
    /// Network description
    pub net: PathBuf,
    /// Episode-indexed route file, when episode-varying routes are configured
    pub route: Option<PathBuf>,
    /// 1-based episode number
    pub episode: u32,
    /// Launch with GUI
    pub gui: bool,
}

/// One open connection to the traffic simulator, scoped to one episode.
///
/// `advance` is the only blocking operation in the core; it must complete
/// before control returns. Dropping a session without `close` is permitted but
/// backends may leak simulator-side resources, so the orchestrator always
/// closes explicitly.
pub trait SimSession: Send {
    /// Advance simulated time by one tick.
    fn advance(&mut self) -> Result<()>;

    /// Current simulated time, seconds.
    fn time(&self) -> f64;

    /// Ordered list of traffic-light identifiers in the network.
    fn signal_ids(&self) -> Vec<String>;

    /// Ordered phase descriptors (state strings) of the signal's program.
    fn phase_program(&self, signal: &str) -> Result<Vec<String>>;

    /// Set the signal's light state to the given phase string.
    fn set_phase(&mut self, signal: &str, state: &str) -> Result<()>;

    /// Lanes controlled by the signal, in movement order.
    fn controlled_lanes(&self, signal: &str) -> Vec<String>;

    /// Sensor aggregate for one lane, capped at `max_distance` meters.
    fn lane_reading(&self, lane: &str, max_distance: f32) -> LaneReading;

    /// Terminate the session. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Factory for episode-scoped simulator sessions.
pub trait SimulatorBackend: Send {
    type Session: SimSession;

    /// Open a new session. Malformed inputs surface as
    /// [`EnvError::Config`](crate::EnvError::Config).
    fn open(&mut self, request: &SessionRequest) -> Result<Self::Session>;
}
