//! Branch predictor impact: the same conditional sum over sorted input,
//! random input, and the branchless rewrite of both. Input arrays are
//! built once per condition, outside the measured region.
//!
//! Run counter increments globally.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::workloads::branch::{self, BranchMode};

use crate::{open_writer, record, schema, stop_requested, Config};

const ARRAY_LEN: usize = 1_000_000;
const RUNS: usize = 10;
const SEED: u64 = 12345;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "condition_label"], &["ns_per_element"]);
    let mut out = open_writer(cfg, "branch_prediction", &header)?;

    let sorted = branch::sorted_input(ARRAY_LEN);
    let random = branch::random_input(ARRAY_LEN, SEED);

    let mut run_index = 0u64;
    for mode in BranchMode::ALL {
        let values = if mode.wants_sorted() { &sorted } else { &random };

        for _ in 0..RUNS {
            if stop_requested("branch_prediction") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            if mode.branchless() {
                branch::branchless_sum(values);
            } else {
                branch::branchy_sum(values);
            }
            snapshot.end()?;

            let ns_per_element = snapshot.runtime_ns as f64 / ARRAY_LEN as f64;
            out.write_record(&record(
                vec![Field::Count(run_index), Field::label(mode.label())],
                &snapshot,
                vec![Field::Fixed2(ns_per_element)],
            ))?;
            run_index += 1;
        }
        println!("[*] {} done", mode.label());
    }

    out.finish()?;
    Ok(())
}
