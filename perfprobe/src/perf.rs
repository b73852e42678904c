//! Hardware performance counter group.
//!
//! A fixed panel of six PMU events read through the kernel's perf interface:
//! instructions, cycles, L1D read misses, LLC misses, branches, branch
//! misses. Descriptors are opened once per scenario and stay live until the
//! group drops; each measured region is bracketed by an explicit
//! reset+enable / disable+read pair.

use std::io;

use perf_event::events::{Cache, CacheOp, CacheResult, Event, Hardware, WhichCache};
use perf_event::{Builder, Counter};

/// Panel indices, in emission order.
const INSTRUCTIONS: usize = 0;
const CYCLES: usize = 1;
const L1D_READ_MISSES: usize = 2;
const LLC_MISSES: usize = 3;
const BRANCHES: usize = 4;
const BRANCH_MISSES: usize = 5;

const EVENTS: usize = 6;

/// Deltas observed over one measured region.
#[derive(Debug, Default, Clone, Copy)]
pub struct HwCounts {
    pub instructions: u64,
    pub cycles: u64,
    pub l1_dcache_misses: u64,
    pub llc_misses: u64,
    pub branches: u64,
    pub branch_misses: u64,
}

impl HwCounts {
    /// Instructions per cycle; 0 when cycles were not counted.
    pub fn ipc(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.instructions as f64 / self.cycles as f64
        }
    }

    /// Mispredicted fraction of retired branches; 0 when branches were not
    /// counted.
    pub fn branch_miss_rate(&self) -> f64 {
        if self.branches == 0 {
            0.0
        } else {
            self.branch_misses as f64 / self.branches as f64
        }
    }
}

/// The six-event group. Events that failed to open individually read as
/// zero; if either mandatory event (instructions, cycles) is missing the
/// whole group reports unavailable and every operation is a no-op.
pub struct CounterGroup {
    counters: [Option<Counter>; EVENTS],
    available: bool,
}

impl CounterGroup {
    /// Open the panel against the calling process on any CPU, kernel
    /// included, hypervisor excluded, initially disabled.
    ///
    /// Permission denial is expected on locked-down systems
    /// (`perf_event_paranoid`) and is not an error: the group comes back
    /// unavailable and scenarios continue without hardware columns.
    pub fn open() -> Self {
        let mut counters: [Option<Counter>; EVENTS] = Default::default();
        counters[INSTRUCTIONS] = open_event(Hardware::INSTRUCTIONS);
        counters[CYCLES] = open_event(Hardware::CPU_CYCLES);
        counters[L1D_READ_MISSES] = open_event(Cache {
            which: WhichCache::L1D,
            operation: CacheOp::READ,
            result: CacheResult::MISS,
        });
        counters[LLC_MISSES] = open_event(Hardware::CACHE_MISSES);
        counters[BRANCHES] = open_event(Hardware::BRANCH_INSTRUCTIONS);
        counters[BRANCH_MISSES] = open_event(Hardware::BRANCH_MISSES);

        let available = counters[INSTRUCTIONS].is_some() && counters[CYCLES].is_some();
        if !available {
            log::warn!(
                "hardware counters unavailable (CAP_PERFMON or \
                 kernel.perf_event_paranoid <= 2 required); continuing without"
            );
            counters = Default::default();
        }
        Self {
            counters,
            available,
        }
    }

    pub fn available(&self) -> bool {
        self.available
    }

    /// Reset every live counter to zero, then enable it.
    pub fn start(&mut self) {
        for counter in self.counters.iter_mut().flatten() {
            if let Err(e) = counter.reset().and_then(|_| counter.enable()) {
                log::debug!("counter start failed: {e}");
            }
        }
    }

    /// Disable every live counter and read the deltas.
    ///
    /// A short or failed read reports that event as 0 for this iteration
    /// only; the descriptor stays live for the next one.
    pub fn stop(&mut self) -> HwCounts {
        let mut raw = [0u64; EVENTS];
        for (slot, counter) in raw.iter_mut().zip(self.counters.iter_mut()) {
            if let Some(counter) = counter {
                if let Err(e) = counter.disable() {
                    log::debug!("counter disable failed: {e}");
                }
                *slot = counter.read().unwrap_or_else(|e| {
                    log::debug!("counter read failed: {e}");
                    0
                });
            }
        }
        HwCounts {
            instructions: raw[INSTRUCTIONS],
            cycles: raw[CYCLES],
            l1_dcache_misses: raw[L1D_READ_MISSES],
            llc_misses: raw[LLC_MISSES],
            branches: raw[BRANCHES],
            branch_misses: raw[BRANCH_MISSES],
        }
    }

    /// Release the descriptors early. The group reads as unavailable from
    /// here on; dropping the group does the same implicitly.
    pub fn close(&mut self) {
        self.counters = Default::default();
        self.available = false;
    }
}

fn open_event(event: impl Event) -> Option<Counter> {
    let result: io::Result<Counter> = Builder::new(event)
        .exclude_kernel(false)
        .exclude_hv(true)
        .build();
    match result {
        Ok(counter) => Some(counter),
        Err(e) => {
            log::debug!("perf event open failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derived_rates_guard_zero_denominators() {
        let counts = HwCounts::default();
        assert_eq!(counts.ipc(), 0.0);
        assert_eq!(counts.branch_miss_rate(), 0.0);

        let counts = HwCounts {
            instructions: 30,
            cycles: 10,
            branches: 1_000_000,
            branch_misses: 500,
            ..Default::default()
        };
        assert!((counts.ipc() - 3.0).abs() < 1e-9);
        assert!((counts.branch_miss_rate() - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn unavailable_group_is_inert() {
        let mut group = CounterGroup {
            counters: Default::default(),
            available: false,
        };
        group.start();
        let counts = group.stop();
        assert_eq!(counts.instructions, 0);
        assert_eq!(counts.cycles, 0);
    }

    #[test]
    fn live_group_counts_work_when_permitted() {
        let mut group = CounterGroup::open();
        if !group.available() {
            return; // expected on locked-down kernels
        }
        group.start();
        let mut x = 1u64;
        for i in 0..100_000u64 {
            x = x.wrapping_mul(3).wrapping_add(i);
        }
        std::hint::black_box(x);
        let counts = group.stop();
        assert!(counts.instructions > 100_000);
        assert!(counts.cycles > 0);
    }
}
