//! Atomic operation cost: a plain increment baseline, relaxed fetch_add,
//! strong compare-and-swap, and a contended multi-thread variant where the
//! cache line bounces between pinned cores.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{clock, sched, Error, Result};

/// Non-atomic increment; the compiler may keep the counter in a register.
pub fn plain_increment(iterations: u64) -> u64 {
    let mut counter: u64 = 0;
    for _ in 0..iterations {
        counter = black_box(counter) + 1;
    }
    black_box(counter)
}

/// Relaxed atomic add on an uncontended counter.
pub fn relaxed_add(iterations: u64) -> u64 {
    let counter = AtomicU64::new(0);
    for _ in 0..iterations {
        counter.fetch_add(1, Ordering::Relaxed);
    }
    black_box(counter.load(Ordering::Relaxed))
}

/// Strong compare-and-swap walking the counter up one step per iteration.
pub fn cas_strong(iterations: u64) -> u64 {
    let counter = AtomicU64::new(0);
    for i in 0..iterations {
        let _ = counter.compare_exchange(i, i + 1, Ordering::Relaxed, Ordering::Relaxed);
    }
    black_box(counter.load(Ordering::Relaxed))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContendedOutcome {
    pub max_worker_ns: u64,
    pub ops_per_thread: u64,
    pub total: u64,
}

/// `threads` pinned workers hammering one shared counter with relaxed
/// adds. The per-thread share of `total_iterations` and the slowest
/// worker's duration feed the derived per-op column.
pub fn contended_add(threads: usize, total_iterations: u64) -> Result<ContendedOutcome> {
    if threads == 0 {
        return Err(Error::Workload("contended add needs >= 1 thread".into()));
    }
    let per_thread = total_iterations / threads as u64;
    let counter = AtomicU64::new(0);
    let mut worker_ns = vec![0u64; threads];

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for worker in 0..threads {
            let counter = &counter;
            handles.push(scope.spawn(move || -> crate::Result<u64> {
                sched::pin_worker(worker);
                let start = clock::now_ns()?;
                for _ in 0..per_thread {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                Ok(clock::now_ns()? - start)
            }));
        }
        for (worker, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(ns)) => worker_ns[worker] = ns,
                Ok(Err(e)) => log::warn!("worker {worker} clock failure: {e}"),
                Err(_) => log::warn!("worker {worker} panicked"),
            }
        }
    });

    Ok(ContendedOutcome {
        max_worker_ns: worker_ns.iter().copied().max().unwrap_or(0),
        ops_per_thread: per_thread,
        total: counter.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_threaded_kernels_count() {
        assert_eq!(plain_increment(10_000), 10_000);
        assert_eq!(relaxed_add(10_000), 10_000);
        assert_eq!(cas_strong(10_000), 10_000);
    }

    #[test]
    fn contended_adds_all_land() {
        let outcome = contended_add(4, 100_000).unwrap();
        assert_eq!(outcome.total, outcome.ops_per_thread * 4);
        assert!(outcome.max_worker_ns > 0);
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(contended_add(0, 100).is_err());
    }
}
