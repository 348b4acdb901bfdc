//! Baseline signal-control policies.
//!
//! Policies are pure mappings from observations to one phase index per active
//! intersection; learned agents live outside this crate and only need to
//! satisfy [`Policy`].

mod fixed_time;
mod graph;

pub use fixed_time::FixedTimePolicy;
pub use graph::GraphPolicy;

use crate::spaces::{DynSpace, Space};
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A decision policy over the active intersections.
///
/// `observations` and the returned indices follow the active-intersection
/// order; each index must lie within the corresponding phase table.
/// `valid_actions`, when given, restricts the selectable indices per
/// intersection.
pub trait Policy: Send {
    fn act(
        &mut self,
        observations: &[ArrayD<f32>],
        valid_actions: Option<&[Vec<usize>]>,
    ) -> Vec<usize>;
}

/// Uniform-random phase selection, the usual evaluation floor.
pub struct RandomPolicy {
    action_spaces: Vec<DynSpace>,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(action_spaces: Vec<DynSpace>, seed: u64) -> Self {
        Self {
            action_spaces,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn act(
        &mut self,
        _observations: &[ArrayD<f32>],
        valid_actions: Option<&[Vec<usize>]>,
    ) -> Vec<usize> {
        self.action_spaces
            .iter()
            .enumerate()
            .map(|(i, space)| {
                if let Some(valid) = valid_actions.and_then(|v| v.get(i)).filter(|v| !v.is_empty())
                {
                    valid[rand::Rng::gen_range(&mut self.rng, 0..valid.len())]
                } else {
                    match space {
                        DynSpace::Discrete(d) => d.sample(&mut self.rng),
                        DynSpace::Box(_) => 0,
                    }
                }
            })
            .collect()
    }
}
