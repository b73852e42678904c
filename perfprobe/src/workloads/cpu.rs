//! Pure integer compute. A single register-resident accumulator, no memory
//! traffic, no branches beyond the loop itself. Any migrations or context
//! switches seen around this kernel come from the scheduler, not the work.

use std::hint::black_box;

/// Fixed-count loop of add/xor/multiply over one accumulator.
pub fn spin(iterations: u64) -> u64 {
    let mut result: u64 = 0;
    for i in 0..iterations {
        result = result.wrapping_add(i);
        result ^= i << 1;
        result = result.wrapping_mul(3);
    }
    black_box(result)
}

/// Phased variant: the same loop nested, for runs long enough to observe
/// scheduler behavior over time.
pub fn spin_phased(iterations: u64, phases: u32) -> u64 {
    let mut result: u64 = 0;
    for _ in 0..phases {
        result = result.wrapping_add(spin(iterations));
    }
    black_box(result)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(spin(10_000), spin(10_000));
        assert_eq!(spin_phased(1_000, 4), spin_phased(1_000, 4));
    }

    #[test]
    fn iteration_count_changes_result() {
        assert_ne!(spin(1_000), spin(1_001));
    }

    #[test]
    fn zero_iterations() {
        assert_eq!(spin(0), 0);
        assert_eq!(spin_phased(0, 8), 0);
    }
}
