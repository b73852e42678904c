//! Lock contention scaling: the three counter primitives across thread
//! counts. Reported runtime is the main thread's bracketed wall clock over
//! the whole fan-out/rejoin, and the ops/s column derives from it.
//!
//! Run counter resets per thread count and is shared by the three lock
//! kinds.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::workloads::locks::{LockKind, LockWorkload};

use crate::{open_writer, record, schema, stop_requested, Config};

const ITERATIONS_PER_THREAD: u64 = 1_000_000;
const RUNS: usize = 5;
const THREADS: [usize; 4] = [1, 2, 4, 8];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "threads", "lock_type"], &["ops_per_second"]);
    let mut out = open_writer(cfg, "lock_scaling", &header)?;

    log::info!(
        "lock workload object: {} bytes on the stack",
        LockWorkload::object_size()
    );

    for threads in THREADS {
        for run in 0..RUNS {
            for kind in LockKind::ALL {
                if stop_requested("lock_scaling") {
                    out.finish()?;
                    return Ok(());
                }

                let work = LockWorkload::new(kind, threads, ITERATIONS_PER_THREAD)?;
                let mut snapshot = Snapshot::begin()?;
                work.run(false);
                snapshot.end()?;

                let ops_per_second = if snapshot.runtime_ns == 0 {
                    0.0
                } else {
                    work.total_ops() as f64 / (snapshot.runtime_ns as f64 / 1e9)
                };

                out.write_record(&record(
                    vec![
                        Field::Count(run as u64),
                        Field::Count(threads as u64),
                        Field::label(kind.label()),
                    ],
                    &snapshot,
                    vec![Field::Fixed0(ops_per_second)],
                ))?;
            }
        }
        println!("[*] {threads} thread(s) done");
    }

    out.finish()?;
    Ok(())
}
