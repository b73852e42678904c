//! Cache-level sweep: sequential reads over buffers sized for L1, L2, L3,
//! and DRAM. Median per-byte runtime must be non-decreasing in buffer
//! size.
//!
//! Run counter resets per condition; an allocation failure skips the
//! condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::stats::RunTimes;
use perfprobe::workloads::stream;

use crate::{open_writer, record, schema, stop_requested, try_alloc_words, Config};

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const RUNS: usize = 10;

pub const SIZES: [(usize, &str); 4] = [
    (8 * KB, "8KB_L1"),
    (128 * KB, "128KB_L2"),
    (4 * MB, "4MB_L3"),
    (64 * MB, "64MB_DRAM"),
];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    crate::pin_or_warn("cache_hierarchy", 0);

    let header = schema(&["run", "buffer_size"], &[]);
    let mut out = open_writer(cfg, "cache_hierarchy", &header)?;

    for (size, label) in SIZES {
        let Some(mut buffer) = try_alloc_words(size / 8) else {
            log::warn!("cache_hierarchy: cannot allocate {size} bytes; skipping {label}");
            continue;
        };
        // Warmup: fault every page in and leave the buffer hot-or-cold
        // the same way for each size.
        buffer.fill(0x4242_4242_4242_4242);

        let mut times = RunTimes::new();
        for run in 0..RUNS {
            if stop_requested("cache_hierarchy") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            stream::read(&buffer);
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
