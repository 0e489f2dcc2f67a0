//! Action and observation space descriptors.
//!
//! These mirror the gym-style spaces the control-loop collaborator defines. The session
//! only needs two things from them: the first dimension of the action space (to size
//! the position vector) and a way to sample a baseline for resets.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A gym-style space descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Space {
    /// A single integer in `0..n` (scalar, no dimensions)
    Discrete {
        /// Number of values
        n: u64,
    },
    /// One integer per dimension, dimension `i` in `0..nvec[i]`
    MultiDiscrete {
        /// Number of values per dimension
        nvec: Vec<u64>,
    },
    /// One real per dimension, dimension `i` in `low[i]..=high[i]`
    Bounded {
        /// Lower bounds
        low: Vec<f64>,
        /// Upper bounds
        high: Vec<f64>,
    },
}

impl Space {
    /// Bounded space with the same bounds on every one of `dims` dimensions.
    pub fn uniform(low: f64, high: f64, dims: usize) -> Self {
        Space::Bounded {
            low: vec![low; dims],
            high: vec![high; dims],
        }
    }

    /// Shape of a single element; empty for a scalar [`Space::Discrete`].
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Space::Discrete { .. } => Vec::new(),
            Space::MultiDiscrete { nvec } => vec![nvec.len()],
            Space::Bounded { low, high } => vec![low.len().min(high.len())],
        }
    }

    /// Draw a random element, rounded to integers for the actuator protocol.
    ///
    /// A dimension bounded on one side only yields that bound; an unbounded one yields `0`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<i64> {
        match self {
            Space::Discrete { n } => vec![sample_index(rng, *n)],
            Space::MultiDiscrete { nvec } => nvec.iter().map(|n| sample_index(rng, *n)).collect(),
            Space::Bounded { low, high } => low
                .iter()
                .zip(high)
                .map(|(lo, hi)| sample_bounded(rng, *lo, *hi))
                .collect(),
        }
    }

    /// Whether `values` lies in this space.
    pub fn contains(&self, values: &[f64]) -> bool {
        match self {
            Space::Discrete { n } => {
                matches!(values, [v] if v.fract() == 0.0 && *v >= 0.0 && *v < *n as f64)
            }
            Space::MultiDiscrete { nvec } => {
                values.len() == nvec.len()
                    && values
                        .iter()
                        .zip(nvec)
                        .all(|(v, n)| v.fract() == 0.0 && *v >= 0.0 && *v < *n as f64)
            }
            Space::Bounded { low, high } => {
                values.len() == low.len()
                    && values.len() == high.len()
                    && values
                        .iter()
                        .zip(low.iter().zip(high))
                        .all(|(v, (lo, hi))| (*lo..=*hi).contains(v))
            }
        }
    }
}

/// Largest magnitude drawn from a bounded dimension; keeps `hi - lo` finite and the
/// result exact as an `i64`.
const SAMPLE_LIMIT: f64 = 1e15;

fn sample_bounded<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> i64 {
    let value = match (lo.is_finite(), hi.is_finite()) {
        (true, true) => {
            let lo = lo.clamp(-SAMPLE_LIMIT, SAMPLE_LIMIT);
            let hi = hi.clamp(-SAMPLE_LIMIT, SAMPLE_LIMIT);
            if lo < hi {
                rng.gen_range(lo..=hi)
            } else {
                lo
            }
        }
        (true, false) if hi > lo => lo,
        (false, true) if hi > lo => hi,
        _ => 0.0,
    };
    value.clamp(-SAMPLE_LIMIT, SAMPLE_LIMIT).round() as i64
}

fn sample_index<R: Rng + ?Sized>(rng: &mut R, n: u64) -> i64 {
    if n == 0 {
        0
    } else {
        rng.gen_range(0..n) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn shapes() {
        assert!(Space::Discrete { n: 4 }.shape().is_empty());
        assert_eq!(Space::MultiDiscrete { nvec: vec![3, 3, 3] }.shape(), vec![3]);
        assert_eq!(Space::uniform(-180.0, 180.0, 5).shape(), vec![5]);
    }

    #[test]
    fn samples_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let multi = Space::MultiDiscrete { nvec: vec![3, 1, 5] };
        let bounded = Space::Bounded {
            low: vec![45.0, -10.0],
            high: vec![110.0, 10.0],
        };

        for _ in 0..200 {
            let sample = multi.sample(&mut rng);
            let as_f64: Vec<f64> = sample.iter().map(|v| *v as f64).collect();
            assert!(multi.contains(&as_f64), "{:?}", sample);

            let sample = bounded.sample(&mut rng);
            assert!((45..=110).contains(&sample[0]));
            assert!((-10..=10).contains(&sample[1]));
        }
    }

    #[test]
    fn seeded_samples_repeat() {
        let space = Space::MultiDiscrete { nvec: vec![10, 10, 10] };
        let a = space.sample(&mut StdRng::seed_from_u64(42));
        let b = space.sample(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_spaces_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Space::Discrete { n: 0 }.sample(&mut rng), vec![0]);
        assert_eq!(Space::uniform(5.0, 5.0, 2).sample(&mut rng), vec![5, 5]);

        let unbounded = Space::uniform(f64::NEG_INFINITY, f64::INFINITY, 3);
        assert_eq!(unbounded.sample(&mut rng), vec![0, 0, 0]);

        let half_open = Space::Bounded {
            low: vec![10.0, f64::NEG_INFINITY, f64::NAN],
            high: vec![f64::INFINITY, -4.0, 1.0],
        };
        assert_eq!(half_open.sample(&mut rng), vec![10, -4, 0]);

        let huge = Space::uniform(-f64::MAX, f64::MAX, 2);
        for v in huge.sample(&mut rng) {
            assert!(v.unsigned_abs() <= 1_000_000_000_000_000);
        }
    }

    #[test]
    fn deserializes_from_toml() {
        let space: Space = toml::from_str("type = \"multi_discrete\"\nnvec = [3, 3, 3]").unwrap();
        assert_eq!(space, Space::MultiDiscrete { nvec: vec![3, 3, 3] });
    }
}
