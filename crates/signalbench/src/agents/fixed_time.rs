//! Fixed-time baseline: round-robin through each phase table.

use super::Policy;
use crate::spaces::DynSpace;
use ndarray::ArrayD;

/// Cycles every intersection through its phase table at the decision cadence,
/// ignoring observations. This is the baseline that uncontrolled
/// intersections effectively run, and the usual lower bound in benchmark
/// tables.
pub struct FixedTimePolicy {
    phase_counts: Vec<usize>,
    current: usize,
}

impl FixedTimePolicy {
    pub fn new(phase_counts: Vec<usize>) -> Self {
        Self {
            phase_counts,
            current: 0,
        }
    }

    /// Build from the environment's action spaces.
    pub fn from_spaces(spaces: &[DynSpace]) -> Self {
        let counts = spaces
            .iter()
            .map(|s| match s {
                DynSpace::Discrete(d) => d.n,
                DynSpace::Box(_) => 1,
            })
            .collect();
        Self::new(counts)
    }
}

impl Policy for FixedTimePolicy {
    fn act(
        &mut self,
        _observations: &[ArrayD<f32>],
        valid_actions: Option<&[Vec<usize>]>,
    ) -> Vec<usize> {
        let actions = self
            .phase_counts
            .iter()
            .enumerate()
            .map(|(i, &count)| match valid_actions.and_then(|v| v.get(i)) {
                Some(valid) if !valid.is_empty() => valid[self.current % valid.len()],
                _ => self.current % count.max(1),
            })
            .collect();
        self.current = self.current.wrapping_add(1);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_cycles_each_table() {
        let mut policy = FixedTimePolicy::new(vec![2, 3]);
        let seen: Vec<Vec<usize>> = (0..6).map(|_| policy.act(&[], None)).collect();
        assert_eq!(seen[0], vec![0, 0]);
        assert_eq!(seen[1], vec![1, 1]);
        assert_eq!(seen[2], vec![0, 2]);
        assert_eq!(seen[3], vec![1, 0]);
    }

    #[test]
    fn test_valid_actions_restrict_cycle() {
        let mut policy = FixedTimePolicy::new(vec![4]);
        let valid = vec![vec![1, 3]];
        assert_eq!(policy.act(&[], Some(&valid)), vec![1]);
        assert_eq!(policy.act(&[], Some(&valid)), vec![3]);
        assert_eq!(policy.act(&[], Some(&valid)), vec![1]);
    }
}
