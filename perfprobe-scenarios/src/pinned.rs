//! Affinity experiment: an identical CPU spin unpinned, pinned to cpu0,
//! and pinned to cpu1. Pinned groups must show start_cpu == end_cpu on
//! every run and lower runtime variance than the unpinned group.
//!
//! Run counter resets per condition; a denied pin skips the condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::sched;
use perfprobe::stats::RunTimes;
use perfprobe::workloads::cpu;

use crate::{open_writer, record, schema, stop_requested, Config};

const ITERATIONS: u64 = 1_000_000_000;
const RUNS: usize = 10;

enum Affinity {
    Unpinned,
    Cpu(usize),
}

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "affinity"], &[]);
    let mut out = open_writer(cfg, "pinned", &header)?;

    let conditions = [
        ("unpinned", Affinity::Unpinned),
        ("cpu0", Affinity::Cpu(0)),
        ("cpu1", Affinity::Cpu(1)),
    ];

    for (label, affinity) in conditions {
        if let Affinity::Cpu(cpu) = affinity {
            if let Err(e) = sched::pin_to_cpu(cpu) {
                log::warn!("pinned: skipping {label}: {e}");
                continue;
            }
        }

        let mut times = RunTimes::new();
        for run in 0..RUNS {
            if stop_requested("pinned") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            cpu::spin(ITERATIONS);
            snapshot.end()?;

            times.push(snapshot.runtime_ns);
            out.write_record(&record(
                vec![Field::Count(run as u64), Field::label(label)],
                &snapshot,
                vec![],
            ))?;
        }
        println!("[*] {label}: {}", times.summary());
    }

    out.finish()?;
    Ok(())
}
