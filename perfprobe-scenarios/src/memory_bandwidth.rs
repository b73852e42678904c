//! Bandwidth saturation: 1..8 pinned threads streaming private 64 MiB
//! buffers until adding threads stops adding throughput. Workers time
//! themselves; the bandwidth column derives from total bytes over the
//! slowest worker's duration. The snapshot
//! brackets the whole fan-out on the main thread.
//!
//! Run counter increments globally across the whole matrix.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::workloads::{chase, stream};
use perfprobe::{clock, sched};

use crate::{open_writer, record, schema, stop_requested, try_alloc_words, Config};

const BUFFER_SIZE: usize = 64 * 1024 * 1024;
const PASSES: usize = 10;
const RANDOM_ACCESSES: usize = 10_000_000;
const THREADS: [usize; 4] = [1, 2, 4, 8];
const SEED: u64 = 0x00ba_4d01;

#[derive(Clone, Copy, PartialEq)]
enum Pattern {
    SequentialRead,
    SequentialWrite,
    SequentialCopy,
    RandomRead,
}

impl Pattern {
    const ALL: [(Pattern, &'static str); 4] = [
        (Pattern::SequentialRead, "sequential_read"),
        (Pattern::SequentialWrite, "sequential_write"),
        (Pattern::SequentialCopy, "sequential_copy"),
        (Pattern::RandomRead, "random_read"),
    ];
}

struct WorkerBuffers {
    data: Vec<u64>,
    aux: Vec<u64>,
    indices: Vec<u64>,
}

/// Per-worker stream loop; returns (bytes processed, duration).
fn worker_pass(pattern: Pattern, buffers: &mut WorkerBuffers) -> perfprobe::Result<(u64, u64)> {
    let start = clock::now_ns()?;
    let bytes = match pattern {
        Pattern::SequentialRead => {
            for _ in 0..PASSES {
                stream::read(&buffers.data);
            }
            (buffers.data.len() * 8 * PASSES) as u64
        }
        Pattern::SequentialWrite => {
            for _ in 0..PASSES {
                stream::write(&mut buffers.data);
            }
            (buffers.data.len() * 8 * PASSES) as u64
        }
        Pattern::SequentialCopy => {
            for _ in 0..PASSES {
                stream::copy(&mut buffers.aux, &buffers.data);
            }
            // Copy moves each byte twice: one read, one write.
            (buffers.data.len() * 8 * PASSES * 2) as u64
        }
        Pattern::RandomRead => {
            chase::random_read(&buffers.data, &buffers.indices);
            buffers.indices.len() as u64
        }
    };
    Ok((bytes, clock::now_ns()? - start))
}

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "pattern", "threads"], &["bandwidth_gbs"]);
    let mut out = open_writer(cfg, "memory_bandwidth", &header)?;

    let online = sched::online_cpus();
    let mut run_index = 0u64;

    for (pattern, label) in Pattern::ALL {
        for threads in THREADS {
            if threads > online {
                log::warn!("memory_bandwidth: skipping {threads} threads ({online} CPUs online)");
                continue;
            }
            if stop_requested("memory_bandwidth") {
                out.finish()?;
                return Ok(());
            }

            // Setup: every worker gets private buffers, faulted in before
            // the measured region. Aux and index arrays only where the
            // pattern needs them.
            let mut buffers = Vec::with_capacity(threads);
            let words = BUFFER_SIZE / 8;
            let mut failed = false;
            for worker in 0..threads {
                let (data, aux, indices) = match pattern {
                    Pattern::SequentialCopy => (
                        try_alloc_words(words),
                        try_alloc_words(words),
                        Vec::new(),
                    ),
                    Pattern::RandomRead => (
                        try_alloc_words(words),
                        Some(Vec::new()),
                        chase::build_indices(RANDOM_ACCESSES, words, SEED ^ worker as u64),
                    ),
                    _ => (try_alloc_words(words), Some(Vec::new()), Vec::new()),
                };
                match (data, aux) {
                    (Some(mut data), Some(aux)) => {
                        data.fill(0xaaaa_aaaa_aaaa_aaaa);
                        buffers.push(WorkerBuffers { data, aux, indices });
                    }
                    _ => {
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                log::warn!("memory_bandwidth: allocation failed; skipping {label}/{threads}");
                continue;
            }

            let mut worker_bytes = vec![0u64; threads];
            let mut worker_ns = vec![0u64; threads];

            let mut snapshot = Snapshot::begin()?;
            std::thread::scope(|scope| {
                let mut handles = Vec::with_capacity(threads);
                for (worker, bufs) in buffers.iter_mut().enumerate() {
                    handles.push(scope.spawn(move || {
                        sched::pin_worker(worker);
                        worker_pass(pattern, bufs)
                    }));
                }
                for (worker, handle) in handles.into_iter().enumerate() {
                    match handle.join() {
                        Ok(Ok((bytes, ns))) => {
                            worker_bytes[worker] = bytes;
                            worker_ns[worker] = ns;
                        }
                        Ok(Err(e)) => log::warn!("worker {worker}: {e}"),
                        Err(_) => log::warn!("worker {worker} panicked"),
                    }
                }
            });
            snapshot.end()?;

            let total_bytes: u64 = worker_bytes.iter().sum();
            let max_ns = worker_ns.iter().copied().max().unwrap_or(0);
            let bandwidth_gbs = if max_ns == 0 {
                0.0
            } else {
                total_bytes as f64 / max_ns as f64
            };

            out.write_record(&record(
                vec![
                    Field::Count(run_index),
                    Field::label(label),
                    Field::Count(threads as u64),
                ],
                &snapshot,
                vec![Field::Fixed2(bandwidth_gbs)],
            ))?;
            println!("[*] {label}/{threads}t: {bandwidth_gbs:.2} GB/s");
            run_index += 1;
        }
    }

    out.finish()?;
    Ok(())
}
