//! TLB pressure sweep: page-strided touches over working sets from well
//! inside TLB reach to far beyond it, at several page strides. For a fixed
//! stride, ns/access must be non-decreasing in buffer size once past TLB
//! reach; for a fixed large size, non-decreasing in stride.
//!
//! Run counter increments globally; a failed mapping skips the condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::numa::page_size;
use perfprobe::workloads::pages::{PageBuffer, PageKind};
use perfprobe::workloads::tlb;

use crate::{open_writer, record, schema, stop_requested, Config};

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const ITERATIONS: u64 = 1_000_000;

const SIZES: [(usize, &str); 6] = [
    (16 * KB, "16KB"),
    (64 * KB, "64KB"),
    (256 * KB, "256KB"),
    (1 * MB, "1MB"),
    (4 * MB, "4MB"),
    (16 * MB, "16MB"),
];
const STRIDES: [usize; 5] = [1, 2, 4, 8, 16];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "buffer_size", "pattern"], &["ns_per_access"]);
    let mut out = open_writer(cfg, "tlb_pressure", &header)?;

    let page = page_size();
    let mut run_index = 0u64;

    for (size, size_label) in SIZES {
        let buffer = match PageBuffer::alloc(size, PageKind::Normal) {
            Ok(mut buffer) => {
                buffer.fault_in();
                buffer
            }
            Err(e) => {
                log::warn!("tlb_pressure: {e}; skipping {size_label}");
                continue;
            }
        };

        for stride in STRIDES {
            if stop_requested("tlb_pressure") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            tlb::touch(buffer.as_slice(), page, stride, ITERATIONS);
            snapshot.end()?;

            let ns_per_access = snapshot.runtime_ns as f64 / ITERATIONS as f64;
            out.write_record(&record(
                vec![
                    Field::Count(run_index),
                    Field::label(size_label),
                    Field::label(format!("stride{stride}")),
                ],
                &snapshot,
                vec![Field::Fixed2(ns_per_access)],
            ))?;
            run_index += 1;
        }
        println!("[*] {size_label} done");
    }

    out.finish()?;
    Ok(())
}
