//! Mixed CPU+memory kernel: reads from a bounded working set, a
//! configurable number of compute ops per access, then a write-back that
//! dirties the line. Bridges the gap between the pure-compute and
//! pure-memory kernels.

use std::hint::black_box;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

/// Prepared mixed workload. Buffer and access pattern are generated at
/// construction; `run`/`phased`/`bursty` touch no allocator.
pub struct MixedWorkload {
    buffer: Vec<u64>,
    indices: Vec<usize>,
    working_set: usize,
    compute_ratio: u32,
}

impl MixedWorkload {
    pub fn new(
        buffer_size: usize,
        working_set: usize,
        compute_ratio: u32,
        seed: u64,
    ) -> Result<Self> {
        let count = buffer_size / std::mem::size_of::<u64>();
        if count == 0 || working_set == 0 {
            return Err(Error::Workload("mixed workload needs nonempty buffers".into()));
        }
        let buffer: Vec<u64> = (0..count as u64).collect();
        let mut rng = SmallRng::seed_from_u64(seed);
        let indices: Vec<usize> = (0..working_set).map(|_| rng.gen_range(0..count)).collect();
        Ok(Self {
            buffer,
            indices,
            working_set,
            compute_ratio: compute_ratio.max(1),
        })
    }

    /// Uniform pattern: read, compute, write back.
    pub fn run(&mut self, iterations: u64) -> u64 {
        self.run_window(iterations, 0, self.working_set, self.compute_ratio)
    }

    /// Working set grows across `phases` equal slices of the iteration
    /// budget, imitating application warmup.
    pub fn phased(&mut self, iterations: u64, phases: u32) -> u64 {
        let phases = phases.max(1);
        let per_phase = iterations / phases as u64;
        let mut result = 0u64;
        for phase in 0..phases {
            let window = (self.working_set * (phase as usize + 1) / phases as usize).max(1);
            result = result.wrapping_add(self.run_window(
                per_phase,
                0,
                window,
                self.compute_ratio,
            ));
        }
        black_box(result)
    }

    /// Alternating compute-heavy and memory-heavy windows, switching every
    /// 1000 iterations.
    pub fn bursty(&mut self, iterations: u64) -> u64 {
        let heavy = self.compute_ratio * 4;
        let light = (self.compute_ratio / 4).max(1);
        let mut result = 0u64;
        let mut done = 0u64;
        let mut window = 0u64;
        while done < iterations {
            let chunk = (iterations - done).min(1000);
            let ratio = if window % 2 == 0 { heavy } else { light };
            result =
                result.wrapping_add(self.run_window(chunk, done, self.working_set, ratio));
            done += chunk;
            window += 1;
        }
        black_box(result)
    }

    fn run_window(&mut self, iterations: u64, base: u64, window: usize, ratio: u32) -> u64 {
        let window = window.min(self.indices.len()).max(1);
        let mut result = 0u64;
        for iter in 0..iterations {
            let global = base + iter;
            let index = self.indices[(global % window as u64) as usize];
            let mut value = self.buffer[index];
            for _ in 0..ratio {
                value = value.wrapping_mul(3).wrapping_add(global);
                value ^= value << 13;
                value ^= value >> 7;
                value ^= value << 17;
            }
            self.buffer[index] = value;
            result = result.wrapping_add(value);
        }
        black_box(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> MixedWorkload {
        MixedWorkload::new(1 << 20, 1000, 3, 99).unwrap()
    }

    #[test]
    fn deterministic_given_seed() {
        let a = fresh().run(50_000);
        let b = fresh().run(50_000);
        assert_eq!(a, b);
    }

    #[test]
    fn variants_complete() {
        let mut w = fresh();
        w.run(10_000);
        w.phased(10_000, 5);
        w.bursty(10_000);
    }

    #[test]
    fn working_set_indices_in_range() {
        let w = fresh();
        let count = w.buffer.len();
        assert!(w.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn rejects_empty() {
        assert!(MixedWorkload::new(0, 10, 3, 1).is_err());
        assert!(MixedWorkload::new(4096, 0, 3, 1).is_err());
    }
}
