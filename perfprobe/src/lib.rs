
#![allow(unused_parens)]

pub mod clock;
pub mod emit;
pub mod metrics;
pub mod numa;
pub mod perf;
pub mod procfs;
pub mod scenario;
pub mod sched;
pub mod stats;
pub mod workloads;

pub use rand::Rng;
pub use rand::rngs::SmallRng;
pub use rand::SeedableRng;
pub use itertools::iproduct;

pub use crate::emit::{Field, OverwritePolicy, RecordWriter};
pub use crate::metrics::Snapshot;
pub use crate::perf::{CounterGroup, HwCounts};
pub use crate::scenario::{install_interrupt_handler, interrupted};

use std::path::PathBuf;

/// Size of a cache line on every x86_64 part this framework targets.
pub const CACHE_LINE: usize = 64;

/// Errors surfaced by the measurement substrate.
///
/// Only conditions the scenario driver must react to get a variant here;
/// degrading and per-iteration failures are absorbed (and logged) where
/// they occur.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("monotonic clock unavailable: {0}")]
    Clock(#[source] nix::Error),

    #[error("cannot pin to cpu {cpu}: {source}")]
    Affinity { cpu: usize, source: nix::Error },

    #[error("setpriority({nice}) denied: {source}")]
    Nice { nice: i32, source: std::io::Error },

    #[error("numa node {node} out of range ({nodes} nodes present)")]
    BadNode { node: usize, nodes: usize },

    #[error("anonymous mapping of {len} bytes failed: {source}")]
    Map { len: usize, source: nix::Error },

    #[error("allocation of {len} bytes failed")]
    Alloc { len: usize },

    #[error("refusing to overwrite {}", .0.display())]
    OutputExists(PathBuf),

    #[error("record has {got} fields, schema declares {want}")]
    ColumnMismatch { got: usize, want: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Workload(String),
}

pub type Result<T> = std::result::Result<T, Error>;
