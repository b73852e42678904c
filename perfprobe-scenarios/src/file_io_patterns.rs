//! File I/O patterns over a 64 MiB scratch file: buffered sequential read
//! and write, random-seek reads, O_DIRECT, and mmap sequential/random.
//! Throughput normalizes by the bytes each pattern actually moved. An
//! unsupported pattern (O_DIRECT on tmpfs) is skipped with a warning.
//!
//! Run counter increments globally; each pattern runs once (the file is
//! large enough that one pass dominates any per-run noise).

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::workloads::fileio::{IoPattern, IoWorkload};

use crate::{open_writer, record, schema, stop_requested, Config};

const FILE_SIZE: usize = 64 * 1024 * 1024;
const SEEKS: usize = 100;
const MMAP_TOUCHES: usize = 10_000;
const SEED: u64 = 12345;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "condition_label"], &["throughput_mbs"]);
    let mut out = open_writer(cfg, "file_io_patterns", &header)?;

    println!("[*] creating {} MB scratch file", FILE_SIZE / (1024 * 1024));
    let mut work = IoWorkload::new(FILE_SIZE, SEEKS, MMAP_TOUCHES, SEED)?;

    let mut run_index = 0u64;
    for pattern in IoPattern::ALL {
        if stop_requested("file_io_patterns") {
            out.finish()?;
            return Ok(());
        }

        let mut snapshot = Snapshot::begin()?;
        let outcome = work.run(pattern);
        snapshot.end()?;

        let bytes = match outcome {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("file_io_patterns: {} skipped: {e}", pattern.label());
                continue;
            }
        };

        let throughput_mbs = if snapshot.runtime_ns == 0 {
            0.0
        } else {
            (bytes as f64 / (1024.0 * 1024.0)) / (snapshot.runtime_ns as f64 / 1e9)
        };
        out.write_record(&record(
            vec![Field::Count(run_index), Field::label(pattern.label())],
            &snapshot,
            vec![Field::Fixed2(throughput_mbs)],
        ))?;
        println!("[*] {}: {throughput_mbs:.2} MB/s", pattern.label());
        run_index += 1;
    }

    out.finish()?;
    Ok(())
}
