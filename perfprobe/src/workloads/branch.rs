//! Branch predictor stress: a conditional sum whose branch is either
//! well-predicted (sorted input), mispredicted half the time (random
//! input), or compiled out entirely (mask arithmetic).

use std::hint::black_box;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const THRESHOLD: i32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchMode {
    SortedBranchy,
    RandomBranchy,
    RandomBranchless,
    SortedBranchless,
}

impl BranchMode {
    pub const ALL: [BranchMode; 4] = [
        BranchMode::SortedBranchy,
        BranchMode::RandomBranchy,
        BranchMode::RandomBranchless,
        BranchMode::SortedBranchless,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BranchMode::SortedBranchy => "sorted_predictable",
            BranchMode::RandomBranchy => "random_unpredictable",
            BranchMode::RandomBranchless => "random_branchless",
            BranchMode::SortedBranchless => "sorted_branchless",
        }
    }

    pub fn wants_sorted(self) -> bool {
        matches!(self, BranchMode::SortedBranchy | BranchMode::SortedBranchless)
    }

    pub fn branchless(self) -> bool {
        matches!(
            self,
            BranchMode::RandomBranchless | BranchMode::SortedBranchless
        )
    }
}

/// Values in 0..256, sorted. Every `< 128` comparison resolves the same way
/// for long stretches, so prediction is near-perfect.
pub fn sorted_input(len: usize) -> Vec<i32> {
    let mut values: Vec<i32> = (0..len).map(|i| (i % 256) as i32).collect();
    values.sort_unstable();
    values
}

/// Values in 0..256 in seeded random order; the comparison is a coin flip.
pub fn random_input(len: usize, seed: u64) -> Vec<i32> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0..256)).collect()
}

/// Data-dependent branch: add below the threshold, subtract at or above.
pub fn branchy_sum(values: &[i32]) -> i64 {
    let mut sum: i64 = 0;
    for &v in values {
        if v < THRESHOLD {
            sum += v as i64;
        } else {
            sum -= v as i64;
        }
    }
    black_box(sum)
}

/// Same function with the branch replaced by mask arithmetic. More
/// instructions per element, zero mispredictions.
pub fn branchless_sum(values: &[i32]) -> i64 {
    let mut sum: i64 = 0;
    for &v in values {
        let mask = -((v < THRESHOLD) as i64);
        sum += (v as i64) & mask;
        sum -= (v as i64) & !mask;
    }
    black_box(sum)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn branchless_matches_branchy() {
        let sorted = sorted_input(100_000);
        let random = random_input(100_000, 12345);
        assert_eq!(branchy_sum(&sorted), branchless_sum(&sorted));
        assert_eq!(branchy_sum(&random), branchless_sum(&random));
    }

    #[test]
    fn sorted_is_sorted_and_bounded() {
        let values = sorted_input(10_000);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|&v| (0..256).contains(&v)));
    }

    #[test]
    fn random_is_seed_stable() {
        assert_eq!(random_input(1000, 7), random_input(1000, 7));
        assert_ne!(random_input(1000, 7), random_input(1000, 8));
    }

    #[test]
    fn known_small_case() {
        // 100 < 128 adds, 200 >= 128 subtracts.
        assert_eq!(branchy_sum(&[100, 200]), -100);
        assert_eq!(branchless_sum(&[100, 200]), -100);
    }
}
