//! Seed derivation for reproducible, independent random streams.
//!
//! Nothing in the search shares a mutable generator. Every consumer derives
//! its own seed from the run seed plus the coordinates that identify it
//! (iteration, wolf, axis, leader), so results do not depend on evaluation
//! order or thread scheduling.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stream domain for the initial pack.
pub const STREAM_INIT: u64 = 1;
/// Stream domain for per-wolf fitness evaluation seeds.
pub const STREAM_EVAL: u64 = 2;
/// Stream domain for leader-pull coefficients.
pub const STREAM_PULL: u64 = 3;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Mix `base` with an ordered list of coordinates into a new seed.
pub fn derive_seed(base: u64, components: &[u64]) -> u64 {
    components
        .iter()
        .fold(splitmix64(base), |state, &c| splitmix64(state ^ splitmix64(c)))
}

/// A generator for one `(domain, coordinates...)` stream.
pub fn stream_rng(base: u64, components: &[u64]) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_seed(base, components))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    #[test]
    fn derive_seed_is_deterministic() {
        assert_eq!(derive_seed(42, &[STREAM_EVAL, 3, 1]), derive_seed(42, &[STREAM_EVAL, 3, 1]));
    }

    #[test]
    fn derive_seed_separates_coordinates() {
        let mut seen = HashSet::new();
        for t in 0..20u64 {
            for wolf in 0..20u64 {
                assert!(seen.insert(derive_seed(7, &[STREAM_EVAL, t, wolf])));
            }
        }
        // order of coordinates matters
        assert_ne!(derive_seed(7, &[1, 2]), derive_seed(7, &[2, 1]));
        assert_ne!(derive_seed(7, &[1]), derive_seed(8, &[1]));
    }

    #[test]
    fn stream_rng_replays() {
        let mut a = stream_rng(9, &[STREAM_PULL, 0, 1, 2, 0]);
        let mut b = stream_rng(9, &[STREAM_PULL, 0, 1, 2, 0]);
        let xs: Vec<f64> = (0..4).map(|_| a.gen()).collect();
        let ys: Vec<f64> = (0..4).map(|_| b.gen()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (0.0..1.0).contains(x)));
    }
}
