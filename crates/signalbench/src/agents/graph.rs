//! Graph-centrality baseline.
//!
//! Treats the network as a complete directed graph over the active
//! intersections, weights edges by local congestion, and biases each
//! intersection's greedy phase choice by its betweenness centrality.

use super::Policy;
use crate::config::MapConfig;
use ndarray::ArrayD;

/// Centrality-weighted greedy policy.
///
/// Betweenness is recomputed from a complete graph rebuild on every decision:
/// Brandes over a dense digraph, an O(n³)-class cost per step in the number of
/// intersections. Cache externally before scaling this to large networks.
pub struct GraphPolicy {
    map: MapConfig,
}

impl GraphPolicy {
    pub fn new(map: MapConfig) -> Self {
        Self { map }
    }

    fn queue_sum(observation: &ArrayD<f32>) -> f64 {
        observation.iter().map(|&v| v as f64).sum()
    }

    fn candidate_actions<'a>(
        &'a self,
        index: usize,
        valid_actions: Option<&'a [Vec<usize>]>,
    ) -> Vec<usize> {
        match valid_actions.and_then(|v| v.get(index)) {
            Some(valid) if !valid.is_empty() => valid.clone(),
            _ => (0..self.map.phase_pairs.len()).collect(),
        }
    }
}

impl Policy for GraphPolicy {
    fn act(
        &mut self,
        observations: &[ArrayD<f32>],
        valid_actions: Option<&[Vec<usize>]>,
    ) -> Vec<usize> {
        let n = observations.len();

        // Edge i->j carries i's congestion; zero-weight edges collapse every
        // shortest path, so clamp.
        let mut weights = vec![vec![f64::INFINITY; n]; n];
        for (i, observation) in observations.iter().enumerate() {
            let load = Self::queue_sum(observation).max(1e-6);
            for j in 0..n {
                if i != j {
                    weights[i][j] = load;
                }
            }
        }
        let centrality = betweenness(&weights);

        observations
            .iter()
            .enumerate()
            .map(|(i, observation)| {
                let mut best_action = 0;
                let mut best_score = f64::NEG_INFINITY;
                for action in self.candidate_actions(i, valid_actions) {
                    let Some(pair) = self.map.phase_pairs.get(action) else {
                        continue;
                    };
                    let served = pair
                        .iter()
                        .map(|&m| observation.get(m).copied().unwrap_or(0.0) as f64)
                        .sum::<f64>();
                    let score = served * (1.0 + centrality[i]);
                    if score > best_score {
                        best_score = score;
                        best_action = action;
                    }
                }
                best_action
            })
            .collect()
    }
}

/// Brandes betweenness centrality over a dense weighted digraph.
/// `weights[i][j]` is the edge length i->j, infinite when absent.
fn betweenness(weights: &[Vec<f64>]) -> Vec<f64> {
    let n = weights.len();
    let mut centrality = vec![0.0; n];

    for source in 0..n {
        let mut dist = vec![f64::INFINITY; n];
        let mut sigma = vec![0.0_f64; n];
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);

        dist[source] = 0.0;
        sigma[source] = 1.0;

        // Dense Dijkstra; the graphs here are small and complete.
        loop {
            let mut next = None;
            let mut best = f64::INFINITY;
            for v in 0..n {
                if !visited[v] && dist[v] < best {
                    best = dist[v];
                    next = Some(v);
                }
            }
            let Some(u) = next else { break };
            visited[u] = true;
            order.push(u);

            for v in 0..n {
                if v == u || !weights[u][v].is_finite() {
                    continue;
                }
                let alt = dist[u] + weights[u][v];
                if alt + 1e-12 < dist[v] {
                    dist[v] = alt;
                    sigma[v] = sigma[u];
                    preds[v] = vec![u];
                } else if (alt - dist[v]).abs() <= 1e-12 && !visited[v] && !preds[v].contains(&u) {
                    sigma[v] += sigma[u];
                    preds[v].push(u);
                }
            }
        }

        let mut delta = vec![0.0_f64; n];
        for &w in order.iter().rev() {
            for &v in &preds[w] {
                if sigma[w] > 0.0 {
                    delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
                }
            }
            if w != source {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for c in &mut centrality {
            *c *= scale;
        }
    }
    centrality
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn obs(values: &[f32]) -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec()).unwrap()
    }

    #[test]
    fn test_betweenness_path_graph() {
        // 0 -> 1 -> 2 line: the middle node carries all pairwise paths.
        let inf = f64::INFINITY;
        let weights = vec![
            vec![inf, 1.0, inf],
            vec![inf, inf, 1.0],
            vec![inf, inf, inf],
        ];
        let c = betweenness(&weights);
        assert!(c[1] > c[0]);
        assert!(c[1] > c[2]);
    }

    #[test]
    fn test_picks_most_congested_pair() {
        let map = MapConfig {
            name: "test".into(),
            phase_pairs: vec![[0, 1], [2, 3]],
            valid_actions: Default::default(),
        };
        let mut policy = GraphPolicy::new(map);
        let acts = policy.act(&[obs(&[0.0, 1.0, 5.0, 4.0]), obs(&[9.0, 9.0, 0.0, 0.0])], None);
        assert_eq!(acts, vec![1, 0]);
    }

    #[test]
    fn test_valid_actions_limit_choice() {
        let map = MapConfig {
            name: "test".into(),
            phase_pairs: vec![[0, 1], [2, 3]],
            valid_actions: Default::default(),
        };
        let mut policy = GraphPolicy::new(map);
        let valid = vec![vec![0]];
        let acts = policy.act(&[obs(&[0.0, 0.0, 9.0, 9.0])], Some(&valid));
        assert_eq!(acts, vec![0]);
    }
}
