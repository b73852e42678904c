//! Lock contention: N threads hammering one shared counter through a
//! busy-wait lock, a sleeping mutex, or a sequentially-consistent atomic.
//!
//! The variants are a tagged enum rather than function pointers so the
//! dispatch branch is visible to the predictor. The whole workload object
//! lives on the caller's stack; its size is checked against the budget at
//! construction.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::{sched, Error, Result};

/// Stack budget for one workload object.
pub const STACK_BUDGET: usize = 256;

/// Which primitive guards the shared counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Busy-wait lock; waiters spin in userspace.
    Spin,
    /// Sleeping mutex; waiters go through the scheduler.
    Mutex,
    /// No lock: a SeqCst fetch_add on the counter itself.
    Atomic,
}

impl LockKind {
    pub const ALL: [LockKind; 3] = [LockKind::Spin, LockKind::Mutex, LockKind::Atomic];

    pub fn label(self) -> &'static str {
        match self {
            LockKind::Spin => "spinlock",
            LockKind::Mutex => "mutex",
            LockKind::Atomic => "atomic",
        }
    }
}

/// Minimal test-and-set lock over a u64 counter.
struct SpinLock {
    locked: AtomicBool,
    value: UnsafeCell<u64>,
}

unsafe impl Sync for SpinLock {}

impl SpinLock {
    fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(0),
        }
    }

    fn increment(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        // Owner: the flag serializes access to the cell.
        unsafe { *self.value.get() += 1 };
        self.locked.store(false, Ordering::Release);
    }

    fn read(&self) -> u64 {
        unsafe { *self.value.get() }
    }
}

enum SharedState {
    Spin(SpinLock),
    Mutex(Mutex<u64>),
    Atomic(AtomicU64),
}

/// A prepared lock-contention workload. Construction is the setup phase;
/// [`LockWorkload::run`] is the only part meant to sit inside a measured
/// region.
pub struct LockWorkload {
    kind: LockKind,
    threads: usize,
    iterations_per_thread: u64,
    state: SharedState,
}

// The object must fit the stack slot scenarios reserve for it.
const _: () = assert!(std::mem::size_of::<LockWorkload>() <= STACK_BUDGET);

impl LockWorkload {
    pub fn new(kind: LockKind, threads: usize, iterations_per_thread: u64) -> Result<Self> {
        if threads == 0 {
            return Err(Error::Workload("lock workload needs >= 1 thread".into()));
        }
        let state = match kind {
            LockKind::Spin => SharedState::Spin(SpinLock::new()),
            LockKind::Mutex => SharedState::Mutex(Mutex::new(0)),
            LockKind::Atomic => SharedState::Atomic(AtomicU64::new(0)),
        };
        Ok(Self {
            kind,
            threads,
            iterations_per_thread,
            state,
        })
    }

    /// Size of the workload object, for callers that keep it on the stack.
    pub const fn object_size() -> usize {
        std::mem::size_of::<Self>()
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn total_ops(&self) -> u64 {
        self.threads as u64 * self.iterations_per_thread
    }

    /// Fan out the worker threads, run the per-thread loops, rejoin.
    ///
    /// With `pin` set, each worker pins itself round-robin across the
    /// online CPUs before touching the shared counter.
    pub fn run(&self, pin: bool) {
        std::thread::scope(|scope| {
            for worker in 0..self.threads {
                scope.spawn(move || {
                    if pin {
                        sched::pin_worker(worker);
                    }
                    match &self.state {
                        SharedState::Spin(lock) => {
                            for _ in 0..self.iterations_per_thread {
                                lock.increment();
                            }
                        }
                        SharedState::Mutex(mutex) => {
                            for _ in 0..self.iterations_per_thread {
                                *mutex.lock().unwrap() += 1;
                            }
                        }
                        SharedState::Atomic(counter) => {
                            for _ in 0..self.iterations_per_thread {
                                counter.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                });
            }
        });
    }

    /// Final counter value, for post-run verification.
    pub fn counter(&self) -> u64 {
        match &self.state {
            SharedState::Spin(lock) => lock.read(),
            SharedState::Mutex(mutex) => *mutex.lock().unwrap(),
            SharedState::Atomic(counter) => counter.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn object_fits_stack_budget() {
        assert!(LockWorkload::object_size() <= STACK_BUDGET);
    }

    #[test]
    fn every_kind_counts_exactly() {
        for kind in LockKind::ALL {
            let work = LockWorkload::new(kind, 4, 10_000).unwrap();
            work.run(false);
            assert_eq!(work.counter(), 40_000, "{}", kind.label());
        }
    }

    #[test]
    fn single_thread_counts() {
        let work = LockWorkload::new(LockKind::Spin, 1, 1_000).unwrap();
        work.run(false);
        assert_eq!(work.counter(), 1_000);
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(LockWorkload::new(LockKind::Mutex, 0, 1).is_err());
    }
}
