//! Continuous box space for observation vectors.

use super::Space;
use ndarray::{ArrayD, IxDyn};
use rand::Rng;

/// Box space with per-element lower and upper bounds.
#[derive(Clone, Debug)]
pub struct BoxSpace {
    pub low: ArrayD<f32>,
    pub high: ArrayD<f32>,
    shape: Vec<usize>,
}

impl BoxSpace {
    /// Create a box with uniform bounds across all elements
    pub fn uniform(shape: &[usize], low: f32, high: f32) -> Self {
        Self {
            low: ArrayD::from_elem(IxDyn(shape), low),
            high: ArrayD::from_elem(IxDyn(shape), high),
            shape: shape.to_vec(),
        }
    }

    /// Unbounded box, the usual observation space for sensor vectors
    pub fn unbounded(shape: &[usize]) -> Self {
        Self::uniform(shape, f32::NEG_INFINITY, f32::INFINITY)
    }
}

impl Space for BoxSpace {
    type Sample = ArrayD<f32>;

    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample {
        let mut out = ArrayD::zeros(IxDyn(&self.shape));
        for ((o, &lo), &hi) in out.iter_mut().zip(self.low.iter()).zip(self.high.iter()) {
            // Unbounded dimensions sample from the unit interval.
            if lo.is_finite() && hi.is_finite() {
                *o = rng.gen_range(lo..=hi);
            } else {
                *o = rng.gen::<f32>();
            }
        }
        out
    }

    fn contains(&self, value: &Self::Sample) -> bool {
        if value.shape() != self.shape.as_slice() {
            return false;
        }
        value
            .iter()
            .zip(self.low.iter())
            .zip(self.high.iter())
            .all(|((&v, &lo), &hi)| v >= lo && v <= hi)
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_box_sample_in_bounds() {
        let space = BoxSpace::uniform(&[3], -1.0, 1.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        for _ in 0..50 {
            let sample = space.sample(&mut rng);
            assert!(space.contains(&sample));
        }
    }

    #[test]
    fn test_unbounded_contains_everything() {
        let space = BoxSpace::unbounded(&[2]);
        let value = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1e30, -1e30]).unwrap();
        assert!(space.contains(&value));
    }
}
