//! Mixed compute:memory patterns: ratios from compute-heavy to
//! memory-heavy, plus the phased (growing working set) and bursty
//! (alternating windows) variants. A fresh workload is built per run with
//! a run-derived seed so access patterns are reproducible but not frozen.
//!
//! Run counter resets per condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::stats::RunTimes;
use perfprobe::workloads::mixed::MixedWorkload;

use crate::{open_writer, record, schema, stop_requested, Config};

const BUFFER_SIZE: usize = 16 * 1024 * 1024;
const WORKING_SET: usize = 10_000;
const ITERATIONS: u64 = 1_000_000;
const RUNS: usize = 10;
const SEED: u64 = 0x0ea1_2024;

#[derive(Clone, Copy)]
enum Variant {
    Uniform,
    Phased,
    Bursty,
}

const CONDITIONS: [(&str, u32, Variant); 5] = [
    ("compute_heavy", 10, Variant::Uniform),
    ("balanced", 3, Variant::Uniform),
    ("memory_heavy", 1, Variant::Uniform),
    ("phased", 3, Variant::Phased),
    ("bursty", 3, Variant::Bursty),
];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    crate::pin_or_warn("realistic_patterns", 0);

    let header = schema(&["run", "pattern", "compute_ratio"], &[]);
    let mut out = open_writer(cfg, "realistic_patterns", &header)?;

    for (label, ratio, variant) in CONDITIONS {
        let mut times = RunTimes::new();
        for run in 0..RUNS {
            if stop_requested("realistic_patterns") {
                out.finish()?;
                return Ok(());
            }

            let mut work =
                MixedWorkload::new(BUFFER_SIZE, WORKING_SET, ratio, SEED ^ run as u64)?;

            let mut snapshot = Snapshot::begin()?;
            match variant {
                Variant::Uniform => {
                    work.run(ITERATIONS);
                }
                Variant::Phased => {
                    work.phased(ITERATIONS, 5);
                }
                Variant::Bursty => {
                    work.bursty(ITERATIONS);
                }
            }
            snapshot.end()?;

            times.push(snapshot.runtime_ns);
            out.write_record(&record(
                vec![
                    Field::Count(run as u64),
                    Field::label(label),
                    Field::Count(ratio as u64),
                ],
                &snapshot,
                vec![],
            ))?;
        }
        println!("[*] {label}: {}", times.summary());
    }

    out.finish()?;
    Ok(())
}
