//! Reader-writer lock scaling across writer percentages and thread
//! counts. Wall clock of the main thread brackets the fan-out; ops/s and
//! ns/op derive from it.
//!
//! Run counter increments globally across the matrix. Thread counts above
//! the online CPU set are skipped.

use itertools::iproduct;

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::sched;
use perfprobe::workloads::rwlock::RwLockWorkload;

use crate::{open_writer, record, schema, stop_requested, Config};

const TOTAL_ITERATIONS: u64 = 1_000_000;
const THREADS: [usize; 4] = [1, 2, 4, 8];
const WRITE_PERCENTAGES: [u32; 4] = [0, 10, 50, 100];
const SEED: u64 = 0x5eed_0042;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(
        &["run", "condition_label", "threads"],
        &["ops_per_second", "ns_per_operation"],
    );
    let mut out = open_writer(cfg, "rwlock_scaling", &header)?;

    let online = sched::online_cpus();
    let mut run_index = 0u64;

    for (write_pct, threads) in iproduct!(WRITE_PERCENTAGES, THREADS) {
        if threads > online {
            log::warn!("rwlock_scaling: skipping {threads} threads ({online} CPUs online)");
            continue;
        }
        if stop_requested("rwlock_scaling") {
            out.finish()?;
            return Ok(());
        }

        let work = RwLockWorkload::new(threads, write_pct, TOTAL_ITERATIONS)?;
        let mut snapshot = Snapshot::begin()?;
        work.run(SEED ^ run_index);
        snapshot.end()?;

        let total_ops = work.total_ops();
        let (ops_per_second, ns_per_operation) = if snapshot.runtime_ns == 0 || total_ops == 0 {
            (0.0, 0.0)
        } else {
            (
                total_ops as f64 / (snapshot.runtime_ns as f64 / 1e9),
                snapshot.runtime_ns as f64 / (total_ops as f64 / threads as f64),
            )
        };

        out.write_record(&record(
            vec![
                Field::Count(run_index),
                Field::label(format!("rwlock_{write_pct}write")),
                Field::Count(threads as u64),
            ],
            &snapshot,
            vec![
                Field::Fixed0(ops_per_second),
                Field::Fixed2(ns_per_operation),
            ],
        ))?;
        println!("[*] {write_pct}% writes / {threads}t: {ops_per_second:.0} ops/s");
        run_index += 1;
    }

    out.finish()?;
    Ok(())
}
