//! False sharing: per-thread counters packed onto one cache line versus
//! padded to a line each. The packed layout forces the coherency protocol
//! to bounce the line between cores on every increment.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{clock, sched, Error, Result};

pub const MAX_THREADS: usize = 8;

/// One counter per cache line.
#[repr(align(64))]
#[derive(Default)]
struct PaddedCounter {
    value: AtomicU64,
}

/// All counters adjacent on (at most) one line.
#[repr(C)]
#[derive(Default)]
struct PackedCounters {
    values: [AtomicU64; MAX_THREADS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Packed,
    Padded,
}

impl Layout {
    pub const ALL: [Layout; 2] = [Layout::Packed, Layout::Padded];

    pub fn label(self) -> &'static str {
        match self {
            Layout::Packed => "false_sharing",
            Layout::Padded => "padded",
        }
    }
}

/// Worker-side results of one run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharingOutcome {
    /// Longest individual worker duration; the aggregate rate derives from
    /// this, not from the main thread's wall clock.
    pub max_worker_ns: u64,
    pub total_ops: u64,
}

/// Run `threads` workers, each incrementing its own counter `iterations`
/// times, pinned to distinct CPUs. Workers time themselves; the maximum is
/// what the scenario reports.
pub fn run(layout: Layout, threads: usize, iterations: u64) -> Result<SharingOutcome> {
    if threads == 0 || threads > MAX_THREADS {
        return Err(Error::Workload(format!(
            "thread count {threads} outside 1..={MAX_THREADS}"
        )));
    }

    let packed = PackedCounters::default();
    let padded: [PaddedCounter; MAX_THREADS] = Default::default();

    let mut worker_ns = vec![0u64; threads];
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for worker in 0..threads {
            let packed = &packed;
            let padded = &padded;
            handles.push(scope.spawn(move || -> crate::Result<u64> {
                sched::pin_worker(worker);
                let start = clock::now_ns()?;
                match layout {
                    Layout::Packed => {
                        let counter = &packed.values[worker];
                        for _ in 0..iterations {
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Layout::Padded => {
                        let counter = &padded[worker].value;
                        for _ in 0..iterations {
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                    }
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

    // Increments must all have landed.
    let counted: u64 = match layout {
        Layout::Packed => packed
            .values
            .iter()
            .take(threads)
            .map(|c| c.load(Ordering::Relaxed))
            .sum(),
        Layout::Padded => padded
            .iter()
            .take(threads)
            .map(|c| c.value.load(Ordering::Relaxed))
            .sum(),
    };

    Ok(SharingOutcome {
        max_worker_ns: worker_ns.iter().copied().max().unwrap_or(0),
        total_ops: counted,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CACHE_LINE;

    #[test]
    fn layouts_differ_in_footprint() {
        assert_eq!(std::mem::align_of::<PaddedCounter>(), CACHE_LINE);
        assert_eq!(std::mem::size_of::<PaddedCounter>(), CACHE_LINE);
        assert!(std::mem::size_of::<PackedCounters>() <= CACHE_LINE);
    }

    #[test]
    fn all_increments_land() {
        for layout in Layout::ALL {
            let outcome = run(layout, 4, 50_000).unwrap();
            assert_eq!(outcome.total_ops, 200_000);
            assert!(outcome.max_worker_ns > 0);
        }
    }

    #[test]
    fn thread_bounds_enforced() {
        assert!(run(Layout::Packed, 0, 1).is_err());
        assert!(run(Layout::Packed, MAX_THREADS + 1, 1).is_err());
    }
}
