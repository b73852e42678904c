//! Bandwidth vs latency: sequential streaming and dependent pointer
//! chasing over the same buffer sizes. The chain is rebuilt in the setup
//! phase of each condition, never inside the measured region.
//!
//! Run counter resets per (size, pattern) condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::stats::RunTimes;
use perfprobe::workloads::{chase, stream};

use crate::cache_hierarchy::SIZES;
use crate::{open_writer, record, schema, stop_requested, try_alloc_words, Config};

const RUNS: usize = 10;
const CHASE_ITERATIONS: u64 = 100_000;
const SEED: u64 = 0x1a7e_bacc;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    crate::pin_or_warn("latency_vs_bandwidth", 0);

    let header = schema(&["run", "buffer_size", "access_pattern"], &[]);
    let mut out = open_writer(cfg, "latency_vs_bandwidth", &header)?;

    for (size, size_label) in SIZES {
        let Some(mut buffer) = try_alloc_words(size / 8) else {
            log::warn!("latency_vs_bandwidth: cannot allocate {size} bytes; skipping {size_label}");
            continue;
        };

        for pattern in ["sequential", "random"] {
            // Setup per pattern: a hot sequential buffer, or a permutation
            // chain for the dependent-load walk.
            match pattern {
                "sequential" => buffer.fill(0x4242_4242_4242_4242),
                _ => chase::build_chain(&mut buffer, SEED),
            }

            let mut times = RunTimes::new();
            for run in 0..RUNS {
                if stop_requested("latency_vs_bandwidth") {
                    out.finish()?;
                    return Ok(());
                }

                let mut snapshot = Snapshot::begin()?;
                match pattern {
                    "sequential" => {
                        stream::read(&buffer);
                    }
                    _ => {
                        chase::walk(&buffer, CHASE_ITERATIONS);
                    }
                }
                snapshot.end()?;

                times.push(snapshot.runtime_ns);
                out.write_record(&record(
                    vec![
                        Field::Count(run as u64),
                        Field::label(size_label),
                        Field::label(pattern),
                    ],
                    &snapshot,
                    vec![],
                ))?;
            }
            println!("[*] {size_label}/{pattern}: {}", times.summary());
        }
    }

    out.finish()?;
    Ok(())
}
