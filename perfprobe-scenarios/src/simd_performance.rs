//! SIMD versus scalar arithmetic: element adds at four widths over 1M
//! floats, then scalar and 128-bit dot products. A kernel the CPU cannot
//! run (no AVX) is skipped with a warning. Throughput normalizes element
//! count by runtime for the GFLOP/s column.
//!
//! Run counter increments globally.

use perfprobe::emit::Field;
use perfprobe::metrics::Snapshot;
use perfprobe::workloads::simd::{self, AddKernel, AlignedFloats};

use crate::{open_writer, record, schema, stop_requested, Config};

const ARRAY_LEN: usize = 1_000_000;
const ADD_RUNS: usize = 100;
const DOT_RUNS: usize = 10;

pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let header = schema(&["run", "condition_label"], &["throughput_gflops"]);
    let mut out = open_writer(cfg, "simd_performance", &header)?;

    let mut a = AlignedFloats::new(ARRAY_LEN)?;
    let mut b = AlignedFloats::new(ARRAY_LEN)?;
    let mut result = AlignedFloats::new(ARRAY_LEN)?;
    a.fill_ramp(0.1);
    b.fill_ramp(0.2);

    let mut run_index = 0u64;

    for kernel in AddKernel::ALL {
        if !kernel.supported() {
            log::warn!("simd_performance: {} unsupported on this CPU", kernel.label());
            continue;
        }

        for _ in 0..ADD_RUNS {
            if stop_requested("simd_performance") {
                out.finish()?;
                return Ok(());
            }

            let mut snapshot = Snapshot::begin()?;
            simd::add(kernel, a.as_slice(), b.as_slice(), result.as_mut_slice());
            snapshot.end()?;

            let gflops = if snapshot.runtime_ns == 0 {
                0.0
            } else {
                ARRAY_LEN as f64 / snapshot.runtime_ns as f64
            };
            out.write_record(&record(
                vec![Field::Count(run_index), Field::label(kernel.label())],
                &snapshot,
                vec![Field::Fixed3(gflops)],
            ))?;
            run_index += 1;
        }
        println!("[*] {} done", kernel.label());
    }

    // Dot products: scalar against the 128-bit reduction.
    for _ in 0..DOT_RUNS {
        if stop_requested("simd_performance") {
            out.finish()?;
            return Ok(());
        }

        let mut snapshot = Snapshot::begin()?;
        let scalar = simd::dot_scalar(a.as_slice(), b.as_slice());
        snapshot.end()?;
        let gflops = ARRAY_LEN as f64 / snapshot.runtime_ns.max(1) as f64;
        out.write_record(&record(
            vec![Field::Count(run_index), Field::label("dot_product_scalar")],
            &snapshot,
            vec![Field::Fixed3(gflops)],
        ))?;
        run_index += 1;

        #[cfg(target_arch = "x86_64")]
        {
            let mut snapshot = Snapshot::begin()?;
            let vector = simd::dot_m128(a.as_slice(), b.as_slice());
            snapshot.end()?;
            // The reductions sum a million f32 terms in different orders;
            // anything beyond percent-level drift means a broken kernel.
            let diff = (scalar - vector).abs();
            if diff / scalar.abs().max(1.0) > 1e-2 {
                log::warn!("simd_performance: dot products diverge ({scalar} vs {vector})");
            }
            let gflops = ARRAY_LEN as f64 / snapshot.runtime_ns.max(1) as f64;
            out.write_record(&record(
                vec![Field::Count(run_index), Field::label("dot_product_sse")],
                &snapshot,
                vec![Field::Fixed3(gflops)],
            ))?;
            run_index += 1;
        }
    }
    println!("[*] dot products done");

    out.finish()?;
    Ok(())
}
