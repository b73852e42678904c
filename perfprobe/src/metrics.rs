//! Per-iteration metric snapshots.
//!
//! `begin` and `end` bracket the measured region strictly: between them the
//! workload may not allocate, perform I/O, or make syscalls beyond the
//! clock read and `sched_getcpu`. The pseudo-file reads happen inside the
//! bracket operations themselves, outside the region they delimit.

use crate::procfs::{read_task_counters, TaskCounters};
use crate::{clock, sched, Result};

/// One iteration's metrics. Before `end`, the counter slots hold absolute
/// start values; `end` replaces every slot with the end−start delta.
#[derive(Debug, Default, Clone, Copy)]
pub struct Snapshot {
    /// Monotonic-raw capture at iteration start.
    pub timestamp_ns: u64,
    pub runtime_ns: u64,
    pub voluntary_ctxt_switches: u64,
    pub nonvoluntary_ctxt_switches: u64,
    pub minor_page_faults: u64,
    pub major_page_faults: u64,
    pub start_cpu: i32,
    pub end_cpu: i32,
}

/// Column names in emission order.
pub const COLUMNS: &[&str] = &[
    "timestamp_ns",
    "runtime_ns",
    "voluntary_ctxt_switches",
    "nonvoluntary_ctxt_switches",
    "minor_page_faults",
    "major_page_faults",
    "start_cpu",
    "end_cpu",
];

impl Snapshot {
    /// Capture the before-side of the measured region.
    pub fn begin() -> Result<Self> {
        let timestamp_ns = clock::now_ns()?;
        let counters = read_task_counters();
        Ok(Self {
            timestamp_ns,
            runtime_ns: 0,
            voluntary_ctxt_switches: counters.voluntary_ctxt_switches,
            nonvoluntary_ctxt_switches: counters.nonvoluntary_ctxt_switches,
            minor_page_faults: counters.minor_page_faults,
            major_page_faults: counters.major_page_faults,
            start_cpu: sched::current_cpu(),
            end_cpu: -1,
        })
    }

    /// Capture the after-side and turn every counter slot into a delta.
    ///
    /// Deltas saturate at zero: a pseudo-file read that failed on one side
    /// reports as 0 rather than wrapping.
    pub fn end(&mut self) -> Result<()> {
        let end_ns = clock::now_ns()?;
        let counters = read_task_counters();
        self.runtime_ns = end_ns.saturating_sub(self.timestamp_ns);
        self.apply_deltas(&counters);
        self.end_cpu = sched::current_cpu();
        Ok(())
    }

    fn apply_deltas(&mut self, end: &TaskCounters) {
        self.voluntary_ctxt_switches = end
            .voluntary_ctxt_switches
            .saturating_sub(self.voluntary_ctxt_switches);
        self.nonvoluntary_ctxt_switches = end
            .nonvoluntary_ctxt_switches
            .saturating_sub(self.nonvoluntary_ctxt_switches);
        self.minor_page_faults = end
            .minor_page_faults
            .saturating_sub(self.minor_page_faults);
        self.major_page_faults = end
            .major_page_faults
            .saturating_sub(self.major_page_faults);
    }

    /// Snapshot fields in [`COLUMNS`] order, ready for the record writer.
    pub fn fields(&self) -> Vec<crate::emit::Field> {
        use crate::emit::Field;
        vec![
            Field::Count(self.timestamp_ns),
            Field::Count(self.runtime_ns),
            Field::Count(self.voluntary_ctxt_switches),
            Field::Count(self.nonvoluntary_ctxt_switches),
            Field::Count(self.minor_page_faults),
            Field::Count(self.major_page_faults),
            Field::Cpu(self.start_cpu),
            Field::Cpu(self.end_cpu),
        ]
    }
}

/// Bracket a workload closure with a begin/end pair.
pub fn measure<F: FnOnce()>(workload: F) -> Result<Snapshot> {
    let mut snapshot = Snapshot::begin()?;
    workload();
    snapshot.end()?;
    Ok(snapshot)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_region_has_positive_runtime() {
        let snap = measure(|| {}).unwrap();
        assert!(snap.runtime_ns > 0);
        // Even an empty bracket costs well under a millisecond.
        assert!(snap.runtime_ns < 50_000_000);
    }

    #[test]
    fn deltas_are_small_for_trivial_work() {
        let snap = measure(|| {
            std::hint::black_box((0..1000u64).sum::<u64>());
        })
        .unwrap();
        assert!(snap.runtime_ns > 0);
        assert!(snap.major_page_faults < 100);
        assert!(snap.voluntary_ctxt_switches < 100);
    }

    #[test]
    fn cpu_endpoints_populate() {
        crate::sched::pin_to_cpu(0).unwrap();
        let snap = measure(|| {}).unwrap();
        assert_eq!(snap.start_cpu, 0);
        assert_eq!(snap.end_cpu, 0);
    }

    #[test]
    fn field_count_matches_schema() {
        let snap = Snapshot::default();
        assert_eq!(snap.fields().len(), COLUMNS.len());
    }
}
