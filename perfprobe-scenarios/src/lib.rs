//! The experiment catalog: one module per scenario, a registry the
//! dispatcher binary indexes by name, and the glue shared by every driver
//! (schema composition, record assembly, interrupt checks).

pub mod atomic_operations;
pub mod branch_prediction;
pub mod cache_analysis;
pub mod cache_hierarchy;
pub mod false_sharing;
pub mod file_io_patterns;
pub mod huge_pages;
pub mod latency_vs_bandwidth;
pub mod lock_scaling;
pub mod memory_bandwidth;
pub mod nice_levels;
pub mod null_baseline;
pub mod numa_locality;
pub mod pinned;
pub mod process_creation;
pub mod realistic_patterns;
pub mod rwlock_scaling;
pub mod simd_performance;
pub mod syscall_overhead;
pub mod tlb_pressure;

use std::path::PathBuf;

use perfprobe::emit::{Field, OverwritePolicy, RecordWriter};
use perfprobe::metrics::Snapshot;

/// Dispatcher-provided configuration shared by every scenario.
pub struct Config {
    /// Directory record files land in; `data/` by default.
    pub out_dir: PathBuf,
    pub policy: OverwritePolicy,
}

/// Registry entry.
pub struct ScenarioDesc {
    pub name: &'static str,
    pub summary: &'static str,
    pub run: fn(&Config) -> anyhow::Result<()>,
}

pub const REGISTRY: &[ScenarioDesc] = &[
    ScenarioDesc {
        name: "null_baseline",
        summary: "overhead floor: empty workloads under full measurement",
        run: null_baseline::run,
    },
    ScenarioDesc {
        name: "pinned",
        summary: "CPU spin unpinned vs pinned to cpu0/cpu1",
        run: pinned::run,
    },
    ScenarioDesc {
        name: "nice_levels",
        summary: "CPU spin across nice levels",
        run: nice_levels::run,
    },
    ScenarioDesc {
        name: "cache_hierarchy",
        summary: "sequential read across L1/L2/L3/DRAM buffer sizes",
        run: cache_hierarchy::run,
    },
    ScenarioDesc {
        name: "cache_analysis",
        summary: "cache_hierarchy with the hardware-counter panel",
        run: cache_analysis::run,
    },
    ScenarioDesc {
        name: "latency_vs_bandwidth",
        summary: "sequential vs pointer-chase access at each cache level",
        run: latency_vs_bandwidth::run,
    },
    ScenarioDesc {
        name: "memory_bandwidth",
        summary: "multi-threaded streaming until bandwidth saturates",
        run: memory_bandwidth::run,
    },
    ScenarioDesc {
        name: "lock_scaling",
        summary: "spinlock/mutex/atomic contention across thread counts",
        run: lock_scaling::run,
    },
    ScenarioDesc {
        name: "rwlock_scaling",
        summary: "reader-writer lock across writer percentages",
        run: rwlock_scaling::run,
    },
    ScenarioDesc {
        name: "false_sharing",
        summary: "packed vs cache-line-padded per-thread counters",
        run: false_sharing::run,
    },
    ScenarioDesc {
        name: "atomic_operations",
        summary: "plain/relaxed/CAS/contended atomic costs",
        run: atomic_operations::run,
    },
    ScenarioDesc {
        name: "branch_prediction",
        summary: "sorted vs random vs branchless conditional sums",
        run: branch_prediction::run,
    },
    ScenarioDesc {
        name: "tlb_pressure",
        summary: "page-strided touches from below to beyond TLB reach",
        run: tlb_pressure::run,
    },
    ScenarioDesc {
        name: "huge_pages",
        summary: "normal vs THP vs hugetlb page-strided access",
        run: huge_pages::run,
    },
    ScenarioDesc {
        name: "numa_locality",
        summary: "pointer chase over node-local vs remote memory",
        run: numa_locality::run,
    },
    ScenarioDesc {
        name: "process_creation",
        summary: "fork/vfork/clone/spawn create-exit-reap cycles",
        run: process_creation::run,
    },
    ScenarioDesc {
        name: "simd_performance",
        summary: "scalar vs vectorized adds and dot products",
        run: simd_performance::run,
    },
    ScenarioDesc {
        name: "file_io_patterns",
        summary: "six I/O patterns over a scratch file",
        run: file_io_patterns::run,
    },
    ScenarioDesc {
        name: "syscall_overhead",
        summary: "getpid/read/getrusage loops vs no-syscall baseline",
        run: syscall_overhead::run,
    },
    ScenarioDesc {
        name: "realistic_patterns",
        summary: "mixed compute:memory ratios, phased and bursty",
        run: realistic_patterns::run,
    },
];

pub fn find(name: &str) -> Option<&'static ScenarioDesc> {
    REGISTRY.iter().find(|s| s.name == name)
}

/// Compose a schema: condition columns, the snapshot columns, derived
/// columns.
pub(crate) fn schema(prefix: &[&'static str], derived: &[&'static str]) -> Vec<&'static str> {
    prefix
        .iter()
        .chain(perfprobe::metrics::COLUMNS.iter())
        .chain(derived.iter())
        .copied()
        .collect()
}

/// Assemble one record in the same order as [`schema`].
pub(crate) fn record(prefix: Vec<Field>, snapshot: &Snapshot, derived: Vec<Field>) -> Vec<Field> {
    let mut fields = prefix;
    fields.extend(snapshot.fields());
    fields.extend(derived);
    fields
}

pub(crate) fn open_writer(
    cfg: &Config,
    scenario: &str,
    header: &[&str],
) -> anyhow::Result<RecordWriter> {
    Ok(RecordWriter::create(
        &cfg.out_dir,
        scenario,
        header,
        cfg.policy,
    )?)
}

/// Scenario-wide pin: a denied affinity change degrades the whole run to
/// unpinned (with a warning) rather than aborting or skipping anything.
pub(crate) fn pin_or_warn(scenario: &str, cpu: usize) {
    if let Err(e) = perfprobe::sched::pin_to_cpu(cpu) {
        log::warn!("{scenario}: running unpinned: {e}");
    }
}

/// Iteration-boundary interrupt poll. Logs once when tripping.
pub(crate) fn stop_requested(scenario: &str) -> bool {
    if perfprobe::interrupted() {
        log::warn!("{scenario}: interrupted; flushing partial output");
        return true;
    }
    false
}

/// Fallible buffer allocation: an allocation failure skips a condition
/// instead of aborting the scenario.
pub(crate) fn try_alloc_words(words: usize) -> Option<Vec<u64>> {
    let mut buffer: Vec<u64> = Vec::new();
    if buffer.try_reserve_exact(words).is_err() {
        return None;
    }
    buffer.resize(words, 0);
    Some(buffer)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<&str> = REGISTRY.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), REGISTRY.len());
    }

    #[test]
    fn find_hits_and_misses() {
        assert!(find("null_baseline").is_some());
        assert!(find("no_such_scenario").is_none());
    }

    #[test]
    fn schema_composes_in_order() {
        let header = schema(&["run", "affinity"], &["ns_per_operation"]);
        assert_eq!(header[0], "run");
        assert_eq!(header[1], "affinity");
        assert_eq!(header[2], "timestamp_ns");
        assert_eq!(*header.last().unwrap(), "ns_per_operation");
        assert_eq!(header.len(), 2 + perfprobe::metrics::COLUMNS.len() + 1);
    }

    #[test]
    fn record_width_matches_schema() {
        let header = schema(&["run"], &[]);
        let snapshot = Snapshot::default();
        let fields = record(vec![Field::Count(0)], &snapshot, vec![]);
        assert_eq!(fields.len(), header.len());
    }
}
