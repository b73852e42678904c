//! Page-size comparison: the same page-strided access over buffers backed
//! by normal pages, a transparent-huge-page hint, and explicit hugetlb
//! pages. An empty hugetlb pool degrades that condition to normal pages
//! with a warning instead of skipping it; one unmeasured warmup pass runs
//! before each measurement.
//!
//! Run counter increments globally.

use itertools::iproduct;

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::workloads::pages::{self, PageBuffer, PageKind};

use crate::{open_writer, record, schema, stop_requested, Config};

const MB: usize = 1024 * 1024;
const ITERATIONS: u64 = 10_000_000;

const SIZES: [(usize, &str); 4] = [
    (4 * MB, "4MB"),
    (16 * MB, "16MB"),
    (64 * MB, "64MB"),
    (256 * MB, "256MB"),
];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "condition_label", "buffer_size"], &["ns_per_access"]);
    let mut out = open_writer(cfg, "huge_pages", &header)?;

    let mut run_index = 0u64;

    for ((size, size_label), kind) in iproduct!(SIZES, PageKind::ALL) {
        if stop_requested("huge_pages") {
            out.finish()?;
            return Ok(());
        }

        let mut buffer = match PageBuffer::alloc(size, kind) {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("huge_pages: {e}; skipping {}/{size_label}", kind.label());
                continue;
            }
        };
        buffer.fault_in();

        // Warmup pass, unmeasured.
        pages::page_strided_access(buffer.as_slice(), ITERATIONS);

        let mut snapshot = Snapshot::begin()?;
        pages::page_strided_access(buffer.as_slice(), ITERATIONS);
        snapshot.end()?;

        let ns_per_access = snapshot.runtime_ns as f64 / ITERATIONS as f64;
        out.write_record(&record(
            vec![
                Field::Count(run_index),
                Field::label(kind.label()),
                Field::label(size_label),
            ],
            &snapshot,
            vec![Field::Fixed2(ns_per_access)],
        ))?;
        println!(
            "[*] {}/{size_label}: {ns_per_access:.2} ns/access{}",
            kind.label(),
            if buffer.degraded { " (degraded)" } else { "" }
        );
        run_index += 1;
    }

    out.finish()?;
    Ok(())
}
