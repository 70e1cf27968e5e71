//! Seeded random number generation for Monte-Carlo significance trials.
//!
//! Every trial owns its own [`TrialRng`]; there is no global generator. A
//! trial's seed is derived from a base seed and the trial index, so a batch
//! is reproducible regardless of how trials are scheduled across threads.

use rand::seq::index;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Golden-ratio increment used to decorrelate consecutive trial seeds.
const SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// Derive the seed of trial `index` from a batch base seed.
pub fn trial_seed(base_seed: u64, index: usize) -> u64 {
    let mixed = base_seed ^ (index as u64).rotate_left(32);
    mixed.wrapping_mul(SEED_MIX).wrapping_add(index as u64)
}

/// Draw a fresh base seed from OS entropy.
pub fn entropy_seed() -> u64 {
    ChaCha20Rng::from_entropy().next_u64()
}

/// ChaCha20-backed generator with the handful of draws the crate needs.
#[derive(Debug, Clone)]
pub struct TrialRng {
    rng: ChaCha20Rng,
    seed: u64,
}

impl TrialRng {
    /// Create a generator from an explicit seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Generator for trial `index` of a batch seeded with `base_seed`.
    pub fn for_trial(base_seed: u64, index: usize) -> Self {
        Self::with_seed(trial_seed(base_seed, index))
    }

    /// Seed this generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform f64 in [0, 1).
    pub fn f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform usize in the given range.
    pub fn usize(&mut self, range: std::ops::Range<usize>) -> usize {
        self.rng.gen_range(range)
    }

    /// Pick one element uniformly; `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.usize(0..items.len())])
        }
    }

    /// Draw an index according to non-negative weights.
    ///
    /// Weights need not sum to one. Falls back to a uniform draw when every
    /// weight is zero.
    pub fn weighted_index(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if weights.is_empty() {
            return 0;
        }
        if total <= 0.0 {
            return self.usize(0..weights.len());
        }

        let target = self.f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = 0;
        for (i, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = i;
            if target < cumulative {
                return i;
            }
        }
        // Rounding can leave target == total
        last_positive
    }

    /// Choose `amount` distinct positions out of `0..length`.
    pub fn sample_indices(&mut self, length: usize, amount: usize) -> Vec<usize> {
        index::sample(&mut self.rng, length, amount.min(length)).into_vec()
    }

    /// Access the underlying generator for `rand_distr` sampling.
    pub fn inner(&mut self) -> &mut ChaCha20Rng {
        &mut self.rng
    }
}
