//! Per-intersection signal controller.

use crate::sim::{LaneReading, SimSession};
use crate::{EnvError, Result};
use std::collections::HashMap;

/// Controller state for one intersection.
///
/// Holds the intersection's phase table (the non-yellow, green-containing
/// states of its program, derived once), the latched target phase for the
/// current decision, and the lane readings accumulated over the last decision
/// window. Agent decisions are two-stage: [`prep_phase`](Self::prep_phase)
/// latches a target without touching the simulator, and
/// [`commit_phase`](Self::commit_phase) applies it after the transition
/// interval has elapsed.
#[derive(Clone, Debug)]
pub struct SignalController {
    id: String,
    phase_table: Vec<String>,
    lanes: Vec<String>,
    latched: Option<usize>,
    current: usize,
    full_observation: HashMap<String, LaneReading>,
}

impl SignalController {
    /// Build a controller from a signal's program.
    pub fn new<S: SimSession>(session: &S, id: impl Into<String>, program: &[String]) -> Self {
        let id = id.into();
        Self {
            lanes: session.controlled_lanes(&id),
            phase_table: Self::green_phases(program),
            id,
            latched: None,
            current: 0,
            full_observation: HashMap::new(),
        }
    }

    /// Filter a phase program down to the controllable phase table: states with
    /// no yellow and at least one green.
    pub fn green_phases(program: &[String]) -> Vec<String> {
        program
            .iter()
            .filter(|p| !p.contains('y') && p.to_lowercase().contains('g'))
            .cloned()
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase_table(&self) -> &[String] {
        &self.phase_table
    }

    pub fn lanes(&self) -> &[String] {
        &self.lanes
    }

    /// Committed phase index.
    pub fn current_phase(&self) -> usize {
        self.current
    }

    /// Lane readings from the last observation window.
    pub fn observation(&self) -> &HashMap<String, LaneReading> {
        &self.full_observation
    }

    /// Latch the target phase for this decision without applying it.
    pub fn prep_phase(&mut self, index: usize) -> Result<()> {
        if index >= self.phase_table.len() {
            return Err(EnvError::PhaseOutOfRange {
                signal: self.id.clone(),
                index,
                len: self.phase_table.len(),
            });
        }
        self.latched = Some(index);
        Ok(())
    }

    /// Apply the latched phase to the simulator. The caller schedules this
    /// after the transition interval so two greens are never adjacent.
    pub fn commit_phase<S: SimSession>(&mut self, session: &mut S) -> Result<()> {
        if let Some(index) = self.latched.take() {
            session.set_phase(&self.id, &self.phase_table[index])?;
            self.current = index;
        }
        Ok(())
    }

    /// Take a fresh observation window over the interval just elapsed.
    pub fn observe<S: SimSession>(&mut self, session: &S, max_distance: f32) {
        self.full_observation = self
            .lanes
            .iter()
            .map(|lane| (lane.clone(), session.lane_reading(lane, max_distance)))
            .collect();
    }

    /// Sum and max of per-lane queues, for the metric log.
    pub fn queue_totals(&self) -> (u32, u32) {
        let mut total = 0;
        let mut max = 0;
        for lane in &self.lanes {
            let queue = self
                .full_observation
                .get(lane)
                .map(|r| r.queue)
                .unwrap_or(0);
            total += queue;
            max = max.max(queue);
        }
        (total, max)
    }

    /// Summed waiting time across lanes, seconds.
    pub fn wait_total(&self) -> f64 {
        self.lanes
            .iter()
            .filter_map(|lane| self.full_observation.get(lane))
            .map(|r| r.total_wait)
            .sum()
    }
}
