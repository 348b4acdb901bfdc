//! Deterministic synthetic simulator backend.
//!
//! A seeded arrival/drain queue model: vehicles arrive on each lane with a
//! fixed probability per tick and drain while their lane shows green. This is
//! not a traffic model; it exists so the orchestrator, metric log, and baseline
//! policies can be exercised without a simulator process. Every phase commit is
//! recorded with its tick stamp so tests can check the transition protocol.

use super::{LaneReading, SessionRequest, SimSession, SimulatorBackend};
use crate::{EnvError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Stopped-vehicle footprint used to cap sensing by distance, meters.
const VEHICLE_LENGTH: f32 = 7.5;

const LANES_PER_SIGNAL: usize = 4;

/// Four-phase program: two greens separated by yellows. The harness filters the
/// yellow states out of the phase table itself.
const PROGRAM: [&str; 4] = ["GGrr", "yyrr", "rrGG", "rryy"];

/// One recorded `set_phase` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseCommit {
    /// Tick count at the moment of the commit
    pub tick: u64,
    pub signal: String,
    pub state: String,
}

/// Synthetic network backend. Sessions are deterministic for a given
/// (seed, episode) pair, standing in for episode-indexed route files.
#[derive(Clone, Debug)]
pub struct MockNetwork {
    num_signals: usize,
    seed: u64,
    tick_length: f64,
    arrival_prob: f64,
    fail_open: bool,
}

impl MockNetwork {
    /// A line of `num_signals` intersections, four lanes each.
    pub fn with_grid(num_signals: usize, seed: u64) -> Self {
        Self {
            num_signals,
            seed,
            tick_length: 1.0,
            arrival_prob: 0.3,
            fail_open: false,
        }
    }

    /// Seconds of simulated time per tick (sub-second scenarios use < 1.0).
    pub fn tick_length(mut self, seconds: f64) -> Self {
        self.tick_length = seconds;
        self
    }

    /// Per-lane vehicle arrival probability per tick.
    pub fn arrival_prob(mut self, p: f64) -> Self {
        self.arrival_prob = p;
        self
    }

    /// A backend whose `open` always fails, for exercising configuration-error
    /// paths.
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::with_grid(0, 0)
        }
    }

    fn signal_id(i: usize) -> String {
        format!("ts{i}")
    }

    fn lane_id(signal: &str, lane: usize) -> String {
        format!("{signal}_l{lane}")
    }
}

impl SimulatorBackend for MockNetwork {
    type Session = MockSession;

    fn open(&mut self, request: &SessionRequest) -> Result<MockSession> {
        if self.fail_open {
            return Err(EnvError::Config(format!(
                "cannot open network '{}'",
                request.net.display()
            )));
        }

        let signals: Vec<String> = (0..self.num_signals).map(Self::signal_id).collect();
        let mut lanes = HashMap::new();
        let mut lane_order = HashMap::new();
        for signal in &signals {
            let ids: Vec<String> = (0..LANES_PER_SIGNAL)
                .map(|j| Self::lane_id(signal, j))
                .collect();
            for id in &ids {
                lanes.insert(id.clone(), LaneState::default());
            }
            lane_order.insert(signal.clone(), ids);
        }
        let phase_state = signals
            .iter()
            .map(|s| (s.clone(), PROGRAM[0].to_string()))
            .collect();

        // Distinct episodes see distinct demand, like episode-indexed routes.
        let rng = StdRng::seed_from_u64(
            self.seed
                .wrapping_add((request.episode as u64).wrapping_mul(0x9e37_79b9)),
        );

        Ok(MockSession {
            tick: 0,
            tick_length: self.tick_length,
            arrival_prob: self.arrival_prob,
            rng,
            signals,
            lanes,
            lane_order,
            phase_state,
            commits: Vec::new(),
            closed: false,
        })
    }
}

#[derive(Clone, Debug, Default)]
struct LaneState {
    queue: u32,
    total_wait: f64,
    max_wait: f64,
}

/// One open synthetic session.
pub struct MockSession {
    tick: u64,
    tick_length: f64,
    arrival_prob: f64,
    rng: StdRng,
    signals: Vec<String>,
    lanes: HashMap<String, LaneState>,
    lane_order: HashMap<String, Vec<String>>,
    phase_state: HashMap<String, String>,
    commits: Vec<PhaseCommit>,
    closed: bool,
}

impl MockSession {
    /// Ticks advanced since the session opened.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Every phase commit issued on this session, in order.
    pub fn commits(&self) -> &[PhaseCommit] {
        &self.commits
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(EnvError::Simulator("session is closed".into()));
        }
        Ok(())
    }
}

impl SimSession for MockSession {
    fn advance(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.tick += 1;

        for signal in &self.signals {
            let state = &self.phase_state[signal];
            for (j, lane_id) in self.lane_order[signal].iter().enumerate() {
                let green = matches!(state.as_bytes().get(j), Some(&b'G') | Some(&b'g'));
                let lane = self.lanes.get_mut(lane_id).unwrap();

                if self.rng.gen_bool(self.arrival_prob) {
                    lane.queue += 1;
                }
                if green {
                    lane.queue = lane.queue.saturating_sub(2);
                }
                if lane.queue == 0 {
                    lane.total_wait = 0.0;
                    lane.max_wait = 0.0;
                } else {
                    lane.total_wait += lane.queue as f64 * self.tick_length;
                    lane.max_wait += self.tick_length;
                }
            }
        }
        Ok(())
    }

    fn time(&self) -> f64 {
        self.tick as f64 * self.tick_length
    }

    fn signal_ids(&self) -> Vec<String> {
        self.signals.clone()
    }

    fn phase_program(&self, signal: &str) -> Result<Vec<String>> {
        if !self.phase_state.contains_key(signal) {
            return Err(EnvError::Simulator(format!("unknown signal '{signal}'")));
        }
        Ok(PROGRAM.iter().map(|s| s.to_string()).collect())
    }

    fn set_phase(&mut self, signal: &str, state: &str) -> Result<()> {
        self.ensure_open()?;
        match self.phase_state.get_mut(signal) {
            Some(current) => {
                *current = state.to_string();
                self.commits.push(PhaseCommit {
                    tick: self.tick,
                    signal: signal.to_string(),
                    state: state.to_string(),
                });
                Ok(())
            }
            None => Err(EnvError::Simulator(format!("unknown signal '{signal}'"))),
        }
    }

    fn controlled_lanes(&self, signal: &str) -> Vec<String> {
        self.lane_order.get(signal).cloned().unwrap_or_default()
    }

    fn lane_reading(&self, lane: &str, max_distance: f32) -> LaneReading {
        let capacity = (max_distance / VEHICLE_LENGTH).floor().max(1.0) as u32;
        match self.lanes.get(lane) {
            Some(state) => {
                let queue = state.queue.min(capacity);
                LaneReading {
                    queue,
                    approach: (state.queue + 2).min(capacity),
                    total_wait: state.total_wait,
                    max_wait: state.max_wait,
                }
            }
            None => LaneReading::default(),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
