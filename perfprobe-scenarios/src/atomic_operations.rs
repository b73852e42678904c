//! Atomic operation cost: single-threaded plain / relaxed / CAS loops,
//! then contended and uncontended multi-threaded increments. For the
//! multi-threaded conditions the per-op column derives from the slowest
//! worker's self-timed duration.
//!
//! Run counter increments globally.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::workloads::atomics;
use perfprobe::{clock, sched};

use crate::{open_writer, record, schema, stop_requested, Config};

const ITERATIONS: u64 = 10_000_000;
const SINGLE_RUNS: usize = 5;
const THREADS: [usize; 3] = [2, 4, 8];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "condition_label", "threads"], &["ns_per_operation"]);
    let mut out = open_writer(cfg, "atomic_operations", &header)?;

    let mut run_index = 0u64;

    // Single-threaded kernels.
    let singles: [(&str, fn(u64) -> u64); 3] = [
        ("regular_increment", atomics::plain_increment),
        ("atomic_relaxed", atomics::relaxed_add),
        ("compare_and_swap", atomics::cas_strong),
    ];
    for (label, kernel) in singles {
        for _ in 0..SINGLE_RUNS {
            if stop_requested("atomic_operations") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            kernel(ITERATIONS);
            snapshot.end()?;

            let ns_per_op = snapshot.runtime_ns as f64 / ITERATIONS as f64;
            out.write_record(&record(
                vec![
                    Field::Count(run_index),
                    Field::label(label),
                    Field::Count(1),
                ],
                &snapshot,
                vec![Field::Fixed2(ns_per_op)],
            ))?;
            run_index += 1;
        }
        println!("[*] {label} done");
    }

    // Multi-threaded: one shared counter vs thread-local counters.
    let online = sched::online_cpus();
    for threads in THREADS {
        if threads > online {
            log::warn!("atomic_operations: skipping {threads} threads ({online} CPUs online)");
            continue;
        }
        if stop_requested("atomic_operations") {
            out.finish()?;
            return Ok(());
        }

        let per_thread = ITERATIONS / threads as u64;

        // Contended: relaxed adds bouncing one cache line.
        let mut snapshot = Snapshot::begin()?;
        let outcome = atomics::contended_add(threads, ITERATIONS)?;
        snapshot.end()?;
        let ns_per_op = outcome.max_worker_ns as f64 / outcome.ops_per_thread.max(1) as f64;
        out.write_record(&record(
            vec![
                Field::Count(run_index),
                Field::label("atomic_contended"),
                Field::Count(threads as u64),
            ],
            &snapshot,
            vec![Field::Fixed2(ns_per_op)],
        ))?;
        run_index += 1;

        // Uncontended: each worker increments a register-local counter.
        let mut worker_ns = vec![0u64; threads];
        let mut snapshot = Snapshot::begin()?;
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(threads);
            for worker in 0..threads {
                handles.push(scope.spawn(move || -> perfprobe::Result<u64> {
                    sched::pin_worker(worker);
                    let start = clock::now_ns()?;
                    atomics::plain_increment(per_thread);
                    Ok(clock::now_ns()? - start)
                }));
            }
            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(ns)) => worker_ns[worker] = ns,
                    Ok(Err(e)) => log::warn!("worker {worker}: {e}"),
                    Err(_) => log::warn!("worker {worker} panicked"),
                }
            }
        });
        snapshot.end()?;
        let max_ns = worker_ns.iter().copied().max().unwrap_or(0);
        let ns_per_op = max_ns as f64 / per_thread.max(1) as f64;
        out.write_record(&record(
            vec![
                Field::Count(run_index),
                Field::label("local_no_contention"),
                Field::Count(threads as u64),
            ],
            &snapshot,
            vec![Field::Fixed2(ns_per_op)],
        ))?;
        run_index += 1;

        println!("[*] contention pair at {threads} threads done");
    }

    out.finish()?;
    Ok(())
}
