//! Priority experiment: the same CPU spin at several nice levels. Raising
//! priority (nice -10) needs CAP_SYS_NICE; denial skips that condition and
//! the scenario still exits cleanly.
//!
//! Run counter resets per condition. Nice values persist between
//! conditions, so the default level runs first and the lowest runs last.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::sched;
use perfprobe::stats::RunTimes;
use perfprobe::workloads::cpu;

use crate::{open_writer, record, schema, stop_requested, Config};

const ITERATIONS: u64 = 500_000_000;
const RUNS: usize = 10;

const LEVELS: [(i32, &str); 4] = [
    (0, "nice0"),
    (-10, "nice-10"),
    (10, "nice10"),
    (19, "nice19"),
];

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "nice_level"], &[]);
    let mut out = open_writer(cfg, "nice_levels", &header)?;

    for (nice, label) in LEVELS {
        if let Err(e) = sched::set_nice(nice) {
            log::warn!("nice_levels: skipping {label}: {e}");
            continue;
        }

        let mut times = RunTimes::new();
        for run in 0..RUNS {
            if stop_requested("nice_levels") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            cpu::spin(ITERATIONS);
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
