//! The cache sweep again, with the hardware-counter panel alongside the
//! kernel counters. When the panel cannot open (perf_event_paranoid,
//! missing CAP_PERFMON) the scenario declares the narrower schema and
//! still produces the timing records.
//!
//! Run counter resets per condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::perf::{CounterGroup, HwCounts};
use perfprobe::stats::RunTimes;
use perfprobe::workloads::stream;

use crate::cache_hierarchy::SIZES;
use crate::{open_writer, record, schema, stop_requested, try_alloc_words, Config};

const RUNS: usize = 10;

const HW_COLUMNS: [&str; 8] = [
    "instructions",
    "cycles",
    "ipc",
    "l1_dcache_misses",
    "llc_misses",
    "branches",
    "branch_misses",
    "branch_miss_rate",
];

fn hw_fields(counts: &HwCounts) -> Vec<Field> {
    vec![
        Field::Count(counts.instructions),
        Field::Count(counts.cycles),
        Field::Ipc(counts.ipc()),
        Field::Count(counts.l1_dcache_misses),
        Field::Count(counts.llc_misses),
        Field::Count(counts.branches),
        Field::Count(counts.branch_misses),
        Field::Rate(counts.branch_miss_rate()),
    ]
}

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    // Open the panel before touching the output so the schema can reflect
    // availability. The descriptors stay live for the whole scenario.
    let mut group = CounterGroup::open();

    let header = if group.available() {
        schema(&["run", "buffer_size"], &HW_COLUMNS)
    } else {
        schema(&["run", "buffer_size"], &[])
    };
    let mut out = open_writer(cfg, "cache_analysis", &header)?;

    crate::pin_or_warn("cache_analysis", 0);

    for (size, label) in SIZES {
        let Some(mut buffer) = try_alloc_words(size / 8) else {
            log::warn!("cache_analysis: cannot allocate {size} bytes; skipping {label}");
            continue;
        };
        buffer.fill(0x4242_4242_4242_4242);

        let mut times = RunTimes::new();
        for run in 0..RUNS {
            if stop_requested("cache_analysis") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            group.start();
            stream::read(&buffer);
            let counts = group.stop();
            snapshot.end()?;

            times.push(snapshot.runtime_ns);
            let derived = if group.available() {
                hw_fields(&counts)
            } else {
                vec![]
            };
            out.write_record(&record(
                vec![Field::Count(run as u64), Field::label(label)],
                &snapshot,
                derived,
            ))?;
        }
        println!("[*] {label}: {}", times.summary());
    }

    group.close();
    out.finish()?;
    Ok(())
}
