//! Measurement-overhead floor: bracket near-empty workloads with the full
//! begin/end machinery. The emitted runtimes bound what the framework
//! itself contributes to every other scenario.
//!
//! Run counter resets per condition.

use std::hint::black_box;

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::stats::RunTimes;

use crate::{open_writer, record, schema, stop_requested, Config};

const RUNS: usize = 100;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    crate::pin_or_warn("null_baseline", 0);

    let header = schema(&["run", "condition_label"], &[]);
    let mut out = open_writer(cfg, "null_baseline", &header)?;

    for condition in ["null_minimal", "empty_loop"] {
        let mut times = RunTimes::new();
        for run in 0..RUNS {
            if stop_requested("null_baseline") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            match condition {
                "null_minimal" => {
                    // The least work that still defeats the optimizer.
                    let mut counter: u64 = 0;
                    counter += 1;
                    black_box(counter);
                }
                _ => {
                    let mut sum: u64 = 0;
                    for i in 0..1000u64 {
                        sum = black_box(sum.wrapping_add(i));
                    }
                    black_box(sum);
                }
            }
            snapshot.end()?;

            times.push(snapshot.runtime_ns);
            out.write_record(&record(
                vec![Field::Count(run as u64), Field::label(condition)],
                &snapshot,
                vec![],
            ))?;
        }
        println!("[*] {condition}: {}", times.summary());
    }

    out.finish()?;
    Ok(())
}
