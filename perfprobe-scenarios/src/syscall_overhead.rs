//! Syscall overhead: a million calls each of getpid, 1-byte /dev/null
//! reads, and getrusage, against a no-syscall baseline loop. The /dev/null
//! descriptor is opened before any measurement.
//!
//! Run counter resets per condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::stats::RunTimes;
use perfprobe::workloads::syscalls::{SyscallKind, SyscallWorkload};

use crate::{open_writer, record, schema, stop_requested, Config};

const ITERATIONS: u64 = 1_000_000;
const RUNS: usize = 10;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    crate::pin_or_warn("syscall_overhead", 0);

    let header = schema(&["run", "syscall_type"], &[]);
    let mut out = open_writer(cfg, "syscall_overhead", &header)?;

    for kind in SyscallKind::ALL {
        let mut work = SyscallWorkload::new(kind)?;
        let mut times = RunTimes::new();

        for run in 0..RUNS {
            if stop_requested("syscall_overhead") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            work.run(ITERATIONS);
            snapshot.end()?;

            times.push(snapshot.runtime_ns);
            out.write_record(&record(
                vec![Field::Count(run as u64), Field::label(kind.label())],
                &snapshot,
                vec![],
            ))?;
        }
        println!("[*] {}: {}", kind.label(), times.summary());
    }

    out.finish()?;
    Ok(())
}
