//! False sharing: packed versus cache-line-padded per-thread counters.
//! The ns/op column derives from the slowest worker's self-timed duration,
//! which is what cache-line bouncing actually stretches; the snapshot
//! brackets the fan-out on the main thread.
//!
//! Run counter increments globally. Thread counts above the online CPU
//! set are skipped.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::sched;
use perfprobe::workloads::sharing::{self, Layout};

use crate::{open_writer, record, schema, stop_requested, Config};

const ITERATIONS: u64 = 10_000_000;
const THREADS: [usize; 4] = [1, 2, 4, 8];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "condition_label", "threads"], &["ns_per_operation"]);
    let mut out = open_writer(cfg, "false_sharing", &header)?;

    let online = sched::online_cpus();
    let mut run_index = 0u64;

    for threads in THREADS {
        if threads > online {
            log::warn!("false_sharing: skipping {threads} threads ({online} CPUs online)");
            continue;
        }

        for layout in Layout::ALL {
            if stop_requested("false_sharing") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            let outcome = sharing::run(layout, threads, ITERATIONS)?;
            snapshot.end()?;

            let ns_per_operation = if ITERATIONS == 0 {
                0.0
            } else {
                outcome.max_worker_ns as f64 / ITERATIONS as f64
            };

            out.write_record(&record(
                vec![
                    Field::Count(run_index),
                    Field::label(layout.label()),
                    Field::Count(threads as u64),
                ],
                &snapshot,
                vec![Field::Fixed2(ns_per_operation)],
            ))?;
            println!(
                "[*] {}/{threads}t: {ns_per_operation:.2} ns/op",
                layout.label()
            );
            run_index += 1;
        }
    }

    out.finish()?;
    Ok(())
}
