//! Execution-context control: CPU affinity, priority, current-CPU queries.
//!
//! Everything here mutates scheduler state and is meant to run *outside*
//! the measured region; the effects persist until overridden.

use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;

use crate::{Error, Result};

/// Restrict the calling thread to a single CPU.
pub fn pin_to_cpu(cpu: usize) -> Result<()> {
    let mut set = CpuSet::new();
    set.set(cpu).map_err(|e| Error::Affinity { cpu, source: e })?;
    sched_setaffinity(Pid::from_raw(0), &set)
        .map_err(|e| Error::Affinity { cpu, source: e })
}

/// Pin the calling worker thread round-robin across the online set.
///
/// Workers call this in their own prologue, before entering the measured
/// region. Failure is logged and swallowed: an unpinned worker still
/// produces a valid (if noisier) sample.
pub fn pin_worker(index: usize) {
    let cpu = index % online_cpus();
    if let Err(e) = pin_to_cpu(cpu) {
        log::warn!("worker {index}: {e}");
    }
}

/// Adjust the calling process's nice value (-20..=19).
///
/// Raising priority (negative values) may require CAP_SYS_NICE; callers
/// treat the error as a skipped condition, not a failure.
pub fn set_nice(nice: i32) -> Result<()> {
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc == -1 {
        return Err(Error::Nice {
            nice,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// CPU currently executing the caller, or -1 if the kernel cannot say.
#[inline]
pub fn current_cpu() -> i32 {
    unsafe { libc::sched_getcpu() }
}

/// Voluntarily yield the CPU once. Exposed for scenarios that measure
/// reschedule behavior.
#[inline]
pub fn yield_now() {
    std::thread::yield_now();
}

/// Number of online CPUs.
pub fn online_cpus() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 {
        1
    } else {
        n as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn online_cpus_nonzero() {
        assert!(online_cpus() >= 1);
    }

    #[test]
    fn pin_then_query() {
        // CPU 0 is always online. After pinning, the scheduler must report
        // we run there.
        pin_to_cpu(0).unwrap();
        assert_eq!(current_cpu(), 0);
    }

    #[test]
    fn pin_out_of_range_fails() {
        assert!(pin_to_cpu(usize::from(u16::MAX) + 1).is_err());
    }

    #[test]
    fn nice_zero_is_allowed() {
        // Setting the current priority to itself never needs privileges.
        set_nice(0).unwrap();
    }

    #[test]
    fn yield_returns() {
        yield_now();
    }
}
