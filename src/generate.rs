//! Synthetic relation generation.
//!
//! Produces `num_merchants` merchants named `Merchant_1..=Merchant_N`, a pool of
//! `num_pincodes` distinct 6-digit pincodes, and gives each merchant a uniformly sized
//! (within `[min, max]`) set of distinct pincodes drawn from the pool.
//!
//! Runs once per data set and is proportional to `num_merchants`; there is no cancellation.

use crate::error::{GenerationError, IndexResult};
use crate::relation::Relation;
use crate::validate::MERCHANT_PREFIX;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Smallest 6-digit pincode.
pub const PINCODE_MIN: u32 = 100_000;
/// Largest 6-digit pincode.
pub const PINCODE_MAX: u32 = 999_999;
/// Number of distinct 6-digit pincodes.
pub const PINCODE_SPACE: usize = (PINCODE_MAX - PINCODE_MIN + 1) as usize;

const PROGRESS_EVERY: usize = 1_000_000;

/// Parameters for [`generate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Number of merchants to create.
    pub num_merchants: usize,
    /// Size of the pincode pool (unique values).
    pub num_pincodes: usize,
    /// Minimum pincodes per merchant (inclusive).
    pub min_pincodes_per_merchant: usize,
    /// Maximum pincodes per merchant (inclusive).
    pub max_pincodes_per_merchant: usize,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            num_merchants: 10_000_000,
            num_pincodes: 30_000,
            min_pincodes_per_merchant: 1,
            max_pincodes_per_merchant: 5,
            seed: None,
        }
    }
}

impl GenerationParams {
    /// Parameters with an explicit shape and no seed.
    pub fn new(num_merchants: usize, num_pincodes: usize, min: usize, max: usize) -> Self {
        Self {
            num_merchants,
            num_pincodes,
            min_pincodes_per_merchant: min,
            max_pincodes_per_merchant: max,
            seed: None,
        }
    }

    /// Same parameters with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject parameters that cannot produce a relation.
    pub fn check(&self) -> Result<(), GenerationError> {
        if self.num_pincodes > PINCODE_SPACE {
            return Err(GenerationError::PoolExceedsSpace {
                requested: self.num_pincodes,
                space: PINCODE_SPACE,
            });
        }
        if self.min_pincodes_per_merchant > self.max_pincodes_per_merchant {
            return Err(GenerationError::InvalidRange {
                min: self.min_pincodes_per_merchant,
                max: self.max_pincodes_per_merchant,
            });
        }
        if self.num_merchants > 0 && self.max_pincodes_per_merchant > self.num_pincodes {
            return Err(GenerationError::PoolTooSmall {
                per_merchant: self.max_pincodes_per_merchant,
                pool: self.num_pincodes,
            });
        }
        Ok(())
    }
}

/// Generate a relation, seeding from `params.seed` or the OS.
pub fn generate(params: &GenerationParams) -> IndexResult<Relation> {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    generate_with_rng(params, &mut rng)
}

/// Generate a relation from a caller-supplied RNG.
///
/// Fails with a generation error before any work if the parameters are unusable.
pub fn generate_with_rng<R: Rng>(
    params: &GenerationParams,
    rng: &mut R,
) -> IndexResult<Relation> {
    params.check()?;
    let start = Instant::now();
    tracing::info!(
        merchants = params.num_merchants,
        pincodes = params.num_pincodes,
        min = params.min_pincodes_per_merchant,
        max = params.max_pincodes_per_merchant,
        "generating relation"
    );

    let pool = pincode_pool(params.num_pincodes, rng);
    let mut relation = Relation::with_capacity(params.num_merchants);
    for i in 1..=params.num_merchants {
        let n = rng.gen_range(params.min_pincodes_per_merchant..=params.max_pincodes_per_merchant);
        let served: Vec<String> = index::sample(rng, pool.len(), n)
            .into_iter()
            .map(|j| pool[j].clone())
            .collect();
        relation.insert_merchant(format!("{MERCHANT_PREFIX}{i}"), served);

        if i % PROGRESS_EVERY == 0 {
            tracing::debug!(done = i, total = params.num_merchants, "generation progress");
        }
    }

    tracing::info!(
        merchants = relation.merchant_count(),
        pairs = relation.pair_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generated relation"
    );
    Ok(relation)
}

/// `n` distinct pincodes drawn without replacement from the 6-digit space.
fn pincode_pool<R: Rng>(n: usize, rng: &mut R) -> Vec<String> {
    index::sample(rng, PINCODE_SPACE, n)
        .into_iter()
        .map(|i| (PINCODE_MIN as usize + i).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::validate::{validate_merchant, validate_pincode};
    use std::collections::HashSet;

    #[test]
    fn shape_matches_parameters() {
        let params = GenerationParams::new(100, 30_000, 1, 5).with_seed(7);
        let r = generate(&params).unwrap();

        assert_eq!(r.merchant_count(), 100);
        for (m, ps) in r.iter() {
            assert!(validate_merchant(m));
            assert!((1..=5).contains(&ps.len()), "{m} has {} pincodes", ps.len());
            let distinct: HashSet<&String> = ps.iter().collect();
            assert_eq!(distinct.len(), ps.len(), "{m} has repeated pincodes");
            assert!(ps.iter().all(|p| validate_pincode(p)));
            assert!(ps.iter().all(|p| p.parse::<u32>().unwrap() >= PINCODE_MIN));
        }
    }

    #[test]
    fn merchants_are_numbered_in_order() {
        let r = generate(&GenerationParams::new(3, 10, 1, 1).with_seed(1)).unwrap();
        let names: Vec<&str> = r.iter().map(|(m, _)| m).collect();
        assert_eq!(names, vec!["Merchant_1", "Merchant_2", "Merchant_3"]);
    }

    #[test]
    fn pincodes_come_from_a_pool_of_the_requested_size() {
        let r = generate(&GenerationParams::new(500, 8, 3, 3).with_seed(11)).unwrap();
        let used: HashSet<&str> = r
            .iter()
            .flat_map(|(_, ps)| ps.iter().map(String::as_str))
            .collect();
        assert!(used.len() <= 8);
    }

    #[test]
    fn same_seed_same_relation() {
        let p = GenerationParams::new(50, 1_000, 1, 5).with_seed(42);
        assert_eq!(generate(&p).unwrap(), generate(&p).unwrap());
    }

    #[test]
    fn whole_space_can_be_pooled() {
        let r = generate(&GenerationParams::new(1, PINCODE_SPACE, 1, 1).with_seed(3)).unwrap();
        assert_eq!(r.pair_count(), 1);
    }

    #[test]
    fn pool_larger_than_space_fails() {
        let err = generate(&GenerationParams::new(1, 1_000_000, 1, 5)).unwrap_err();
        assert!(matches!(
            err,
            IndexError::Generation(GenerationError::PoolExceedsSpace {
                requested: 1_000_000,
                space: 900_000
            })
        ));
    }

    #[test]
    fn inverted_range_fails() {
        let err = generate(&GenerationParams::new(1, 10, 5, 1)).unwrap_err();
        assert!(matches!(
            err,
            IndexError::Generation(GenerationError::InvalidRange { min: 5, max: 1 })
        ));
    }

    #[test]
    fn per_merchant_above_pool_fails() {
        let err = generate(&GenerationParams::new(1, 3, 1, 5)).unwrap_err();
        assert!(matches!(
            err,
            IndexError::Generation(GenerationError::PoolTooSmall { .. })
        ));
        // No merchants means nothing is ever drawn.
        assert!(generate(&GenerationParams::new(0, 3, 1, 5)).unwrap().is_empty());
    }
}
