//! NUMA locality: pointer chasing through memory bound to the local node
//! versus a remote node, with the thread pinned to the first CPU of node
//! 0. On single-node systems the scenario warns loudly and proceeds; both
//! conditions then exercise identical heap memory and should look alike.
//!
//! Run counter resets per condition.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::numa::{self, NumaBuffer};
use perfprobe::stats::RunTimes;
use perfprobe::workloads::chase;

use crate::{open_writer, record, schema, stop_requested, Config};

const BUFFER_SIZE: usize = 64 * 1024 * 1024;
const ITERATIONS: u64 = 1_000_000;
const RUNS: usize = 10;
const SEED: u64 = 0x40de_0001;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    if !numa::available() {
        log::warn!(
            "numa_locality: single NUMA node (or no sysfs topology); \
             'local' and 'remote' will exercise identical memory"
        );
    } else if let Some(nodes) = numa::node_count() {
        println!("[*] {nodes} NUMA nodes");
        for node in 0..nodes {
            if let Ok(cpus) = numa::node_cpu_list(node) {
                println!("[*] node {node}: {} CPUs", cpus.len());
            }
        }
    }

    let cpu = numa::first_cpu_of_node(0).unwrap_or(0);
    crate::pin_or_warn("numa_locality", cpu);
    println!("[*] pinned to cpu{cpu}");

    let header = schema(&["run", "locality"], &[]);
    let mut out = open_writer(cfg, "numa_locality", &header)?;

    for (node, label) in [(0usize, "local"), (1usize, "remote")] {
        let mut buffer = match NumaBuffer::on_node(BUFFER_SIZE, node) {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("numa_locality: {e}; skipping {label}");
                continue;
            }
        };
        chase::build_chain(buffer.as_mut_words(), SEED);

        let mut times = RunTimes::new();
        for run in 0..RUNS {
            if stop_requested("numa_locality") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            chase::walk(buffer.as_words(), ITERATIONS);
            snapshot.end()?;

            times.push(snapshot.runtime_ns);
            out.write_record(&record(
                vec![Field::Count(run as u64), Field::label(label)],
                &snapshot,
                vec![],
            ))?;
        }
        println!("[*] {label}: {}", times.summary());
    }

    out.finish()?;
    Ok(())
}
