//! Episode orchestration.
//!
//! [`MultiSignalEnv`] is the core of the benchmark: it owns the active signal
//! controllers, runs the reset/step state machine with the mandatory yellow
//! transition, staggers which intersections are agent-controlled, and records
//! per-step metrics.

mod multi_signal;

pub use multi_signal::MultiSignalEnv;

use crate::{EnvError, Result};
use ndarray::ArrayD;
use std::collections::HashMap;

/// Whether an entry in the fixed intersection ordering is a real traffic
/// signal or an aggregator/manager pseudo-entry contributed by a state
/// function. Aggregators appear in observation orderings but never receive an
/// action space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Intersection,
    Aggregator,
}

/// One slot in the fixed intersection ordering established at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalEntry {
    pub id: String,
    pub kind: EntryKind,
}

/// Agent decisions for one step, in either interface convention.
#[derive(Clone, Debug)]
pub enum ActionBatch {
    /// Map from intersection id to phase index
    Keyed(HashMap<String, usize>),
    /// Phase indices in the fixed active-intersection order
    Ordered(Vec<usize>),
}

impl ActionBatch {
    /// Resolve to a keyed map against the given active-intersection order.
    /// The ordered form must match the order's length exactly.
    pub fn into_keyed(self, order: &[String]) -> Result<HashMap<String, usize>> {
        match self {
            ActionBatch::Keyed(map) => Ok(map),
            ActionBatch::Ordered(indices) => {
                if indices.len() != order.len() {
                    return Err(EnvError::ActionCountMismatch {
                        expected: order.len(),
                        actual: indices.len(),
                    });
                }
                Ok(order.iter().cloned().zip(indices).collect())
            }
        }
    }
}

/// Per-intersection observations in either convention.
#[derive(Clone, Debug)]
pub enum ObsBatch {
    Keyed(HashMap<String, ArrayD<f32>>),
    Ordered(Vec<ArrayD<f32>>),
}

impl ObsBatch {
    /// Build from a keyed map, sequencing by `order` when requested. Entries
    /// absent from the map (inactive intersections) are skipped.
    pub fn from_keyed(
        map: HashMap<String, ArrayD<f32>>,
        order: &[SignalEntry],
        ordered: bool,
    ) -> Self {
        if ordered {
            ObsBatch::Ordered(
                order
                    .iter()
                    .filter_map(|e| map.get(&e.id).cloned())
                    .collect(),
            )
        } else {
            ObsBatch::Keyed(map)
        }
    }

    pub fn as_keyed(&self) -> Option<&HashMap<String, ArrayD<f32>>> {
        match self {
            ObsBatch::Keyed(m) => Some(m),
            ObsBatch::Ordered(_) => None,
        }
    }

    pub fn as_ordered(&self) -> Option<&[ArrayD<f32>]> {
        match self {
            ObsBatch::Keyed(_) => None,
            ObsBatch::Ordered(v) => Some(v),
        }
    }

    /// Number of per-intersection entries.
    pub fn len(&self) -> usize {
        match self {
            ObsBatch::Keyed(m) => m.len(),
            ObsBatch::Ordered(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-intersection rewards in either convention.
#[derive(Clone, Debug)]
pub enum RewardBatch {
    Keyed(HashMap<String, f32>),
    Ordered(Vec<f32>),
}

impl RewardBatch {
    pub fn from_keyed(map: HashMap<String, f32>, order: &[SignalEntry], ordered: bool) -> Self {
        if ordered {
            RewardBatch::Ordered(order.iter().filter_map(|e| map.get(&e.id).copied()).collect())
        } else {
            RewardBatch::Keyed(map)
        }
    }

    pub fn as_keyed(&self) -> Option<&HashMap<String, f32>> {
        match self {
            RewardBatch::Keyed(m) => Some(m),
            RewardBatch::Ordered(_) => None,
        }
    }

    pub fn as_ordered(&self) -> Option<&[f32]> {
        match self {
            RewardBatch::Keyed(_) => None,
            RewardBatch::Ordered(v) => Some(v),
        }
    }
}

/// Result of one decision step.
#[derive(Clone, Debug)]
pub struct StepOutput {
    pub observations: ObsBatch,
    pub rewards: RewardBatch,
    /// True iff simulated time has reached the configured end time
    pub done: bool,
    /// 1-based episode index
    pub episode: u32,
}
