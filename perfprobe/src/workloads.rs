//! The microbenchmark kernel catalog.
//!
//! Every kernel is a pure function of its parameters and buffers,
//! deterministic given a seed, with no timing code of its own. Hot paths
//! allocate nothing and do no I/O; per-kernel setup (index generation,
//! file creation, thread-stack allocation) happens in a construction phase
//! before the measured region, and results escape the optimizer through
//! `std::hint::black_box` or a volatile access.

pub mod atomics;
pub mod branch;
pub mod chase;
pub mod cpu;
pub mod fileio;
pub mod locks;
pub mod mixed;
pub mod pages;
pub mod process;
pub mod rwlock;
pub mod sharing;
pub mod simd;
pub mod stream;
pub mod syscalls;
pub mod tlb;
