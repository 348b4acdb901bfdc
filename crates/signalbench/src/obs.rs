//! Pluggable state and reward functions.
//!
//! Both kinds are pure with respect to controller state and are always called
//! with the exact controller map used for stepping, so a function can reach
//! sibling intersections by id when it needs neighbor state. Each function
//! carries a name; the environment folds the names into its run-identifying
//! connection label.

use crate::signal::SignalController;
use ndarray::{ArrayD, IxDyn};
use std::collections::HashMap;

/// The active controller map handed to state/reward functions.
pub type SignalMap = HashMap<String, SignalController>;

/// Named observation function: controller map to per-intersection vectors.
pub struct StateFn {
    name: String,
    func: Box<dyn Fn(&SignalMap) -> HashMap<String, ArrayD<f32>> + Send>,
}

impl StateFn {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&SignalMap) -> HashMap<String, ArrayD<f32>> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, signals: &SignalMap) -> HashMap<String, ArrayD<f32>> {
        (self.func)(signals)
    }
}

/// Named reward function: controller map to per-intersection scalars.
pub struct RewardFn {
    name: String,
    func: Box<dyn Fn(&SignalMap) -> HashMap<String, f32> + Send>,
}

impl RewardFn {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&SignalMap) -> HashMap<String, f32> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, signals: &SignalMap) -> HashMap<String, f32> {
        (self.func)(signals)
    }
}

fn lane_vector(signal: &SignalController, pick: impl Fn(&crate::sim::LaneReading) -> f32) -> ArrayD<f32> {
    let values: Vec<f32> = signal
        .lanes()
        .iter()
        .map(|lane| signal.observation().get(lane).map(&pick).unwrap_or(0.0))
        .collect();
    ArrayD::from_shape_vec(IxDyn(&[values.len()]), values).unwrap()
}

/// Approaching-vehicle count per lane.
pub fn wave() -> StateFn {
    StateFn::new("wave", |signals| {
        signals
            .iter()
            .map(|(id, s)| (id.clone(), lane_vector(s, |r| r.approach as f32)))
            .collect()
    })
}

/// Halted-queue length per lane.
pub fn queue_state() -> StateFn {
    StateFn::new("queue_state", |signals| {
        signals
            .iter()
            .map(|(id, s)| (id.clone(), lane_vector(s, |r| r.queue as f32)))
            .collect()
    })
}

/// Negative summed waiting time.
pub fn wait() -> RewardFn {
    RewardFn::new("wait", |signals| {
        signals
            .iter()
            .map(|(id, s)| (id.clone(), -(s.wait_total() as f32)))
            .collect()
    })
}

/// Negative total queue length.
pub fn queue() -> RewardFn {
    RewardFn::new("queue", |signals| {
        signals
            .iter()
            .map(|(id, s)| (id.clone(), -(s.queue_totals().0 as f32)))
            .collect()
    })
}

/// Negative pressure: local total queue minus the mean queue of sibling
/// intersections. Uses the shared controller map for neighbor lookup.
pub fn pressure() -> RewardFn {
    RewardFn::new("pressure", |signals| {
        let totals: HashMap<&str, f32> = signals
            .iter()
            .map(|(id, s)| (id.as_str(), s.queue_totals().0 as f32))
            .collect();
        signals
            .keys()
            .map(|id| {
                let local = totals[id.as_str()];
                let others: Vec<f32> = totals
                    .iter()
                    .filter(|(k, _)| **k != id.as_str())
                    .map(|(_, v)| *v)
                    .collect();
                let downstream = if others.is_empty() {
                    0.0
                } else {
                    others.iter().sum::<f32>() / others.len() as f32
                };
                (id.clone(), -(local - downstream))
            })
            .collect()
    })
}
