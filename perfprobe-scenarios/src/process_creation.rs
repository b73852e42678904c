//! Process creation overhead: fork, vfork, thread-like clone, and
//! spawning /bin/true. Every iteration is one create-exit-reap cycle; the
//! spawn variant runs fewer iterations since each one pays an exec.
//!
//! Run counter increments globally; a failed cycle is logged and its
//! record withheld rather than emitted with fabricated fields.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::stats::RunTimes;
use perfprobe::workloads::process::{ProcessWorkload, SpawnKind};

use crate::{open_writer, record, schema, stop_requested, Config};

const ITERATIONS: usize = 1000;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "condition_label"], &["time_microseconds"]);
    let mut out = open_writer(cfg, "process_creation", &header)?;

    let mut run_index = 0u64;

    for kind in SpawnKind::ALL {
        let iterations = match kind {
            // exec + dynamic-loader work per cycle; keep the total bounded.
            SpawnKind::Spawn => ITERATIONS / 10,
            _ => ITERATIONS,
        };
        let mut work = ProcessWorkload::new(kind);
        let mut times = RunTimes::new();

        for _ in 0..iterations {
            if stop_requested("process_creation") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            let outcome = work.run_once();
            snapshot.end()?;

            if let Err(e) = outcome {
                log::warn!("process_creation: {} cycle failed: {e}", kind.label());
                continue;
            }

            times.push(snapshot.runtime_ns);
            let micros = snapshot.runtime_ns as f64 / 1000.0;
            out.write_record(&record(
                vec![Field::Count(run_index), Field::label(kind.label())],
                &snapshot,
                vec![Field::Fixed2(micros)],
            ))?;
            run_index += 1;
        }
        println!("[*] {}: {}", kind.label(), times.summary());
    }

    out.finish()?;
    Ok(())
}
