//! Injectable randomness for the generators.
//!
//! Every random decision in the crate goes through a `&mut R: Rng` argument,
//! so a seeded [`GeneratorRng`] replays a performance exactly.

use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Random source owned by the engine.
pub type GeneratorRng = SmallRng;

pub fn seeded(seed: u64) -> GeneratorRng {
    SmallRng::seed_from_u64(seed)
}

pub fn from_entropy() -> GeneratorRng {
    SmallRng::from_os_rng()
}

/// Uniform sample in `[0, 1)`.
pub fn unit<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random::<f32>()
}

/// Returns `true` with probability `p`. `p <= 0` never fires.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, p: f32) -> bool {
    unit(rng) < p
}

/// Picks one item with probability proportional to its weight.
///
/// Negative weights count as zero. When every weight is zero the pick is
/// uniform. Returns `None` only for an empty slice.
pub fn weighted_pick<'a, T, R: Rng + ?Sized>(
    items: &'a [T],
    weights: &[f32],
    rng: &mut R,
) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }

    let sum: f32 = weights.iter().take(items.len()).map(|&w| w.max(0.0)).sum();
    if sum <= 1e-12 {
        return items.get(rng.random_range(0..items.len()));
    }

    let mut r = unit(rng) * sum;
    for (item, &weight) in items.iter().zip(weights) {
        r -= weight.max(0.0);
        if r <= 0.0 {
            return Some(item);
        }
    }
    items.last()
}
