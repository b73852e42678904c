//! Reader-writer lock scaling: N threads over one `RwLock`, each op a
//! read-lock/read or a write-lock/mutate chosen by a per-thread seeded
//! coin weighted with the writer percentage.

use std::hint::black_box;
use std::sync::RwLock;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{sched, Error, Result};

/// Prepared rwlock workload. `total_iterations` is divided evenly among
/// the threads.
pub struct RwLockWorkload {
    threads: usize,
    write_percentage: u32,
    iterations_per_thread: u64,
    shared: RwLock<u64>,
}

impl RwLockWorkload {
    pub fn new(threads: usize, write_percentage: u32, total_iterations: u64) -> Result<Self> {
        if threads == 0 {
            return Err(Error::Workload("rwlock workload needs >= 1 thread".into()));
        }
        if write_percentage > 100 {
            return Err(Error::Workload(format!(
                "writer percentage {write_percentage} > 100"
            )));
        }
        Ok(Self {
            threads,
            write_percentage,
            iterations_per_thread: total_iterations / threads as u64,
            shared: RwLock::new(0),
        })
    }

    pub fn total_ops(&self) -> u64 {
        self.iterations_per_thread * self.threads as u64
    }

    /// Fan out, run the read/write mix, rejoin. Workers pin themselves
    /// round-robin and draw from their own seeded RNG so the mix is
    /// reproducible per thread.
    pub fn run(&self, seed: u64) {
        std::thread::scope(|scope| {
            for worker in 0..self.threads {
                scope.spawn(move || {
                    sched::pin_worker(worker);
                    let mut rng = SmallRng::seed_from_u64(seed ^ worker as u64);
                    for _ in 0..self.iterations_per_thread {
                        if rng.gen_range(0..100) < self.write_percentage {
                            *self.shared.write().unwrap() += 1;
                        } else {
                            black_box(*self.shared.read().unwrap());
                        }
                    }
                });
            }
        });
    }

    pub fn writes_seen(&self) -> u64 {
        *self.shared.read().unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_writers_count_exactly() {
        let work = RwLockWorkload::new(4, 100, 40_000).unwrap();
        work.run(1);
        assert_eq!(work.writes_seen(), 40_000);
    }

    #[test]
    fn all_readers_never_mutate() {
        let work = RwLockWorkload::new(4, 0, 40_000).unwrap();
        work.run(1);
        assert_eq!(work.writes_seen(), 0);
    }

    #[test]
    fn mixed_ratio_lands_between() {
        let work = RwLockWorkload::new(2, 50, 100_000).unwrap();
        work.run(9);
        let writes = work.writes_seen();
        // Binomial around 50%; far bounds to stay deterministic in spirit.
        assert!(writes > 30_000 && writes < 70_000, "writes {writes}");
    }

    #[test]
    fn parameter_validation() {
        assert!(RwLockWorkload::new(0, 10, 100).is_err());
        assert!(RwLockWorkload::new(2, 101, 100).is_err());
    }
}
