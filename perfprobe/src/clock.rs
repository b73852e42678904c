//! Monotonic-raw timing primitive.
//!
//! CLOCK_MONOTONIC_RAW is immune to NTP slewing, which would otherwise
//! corrupt runtime deltas. glibc services the read from the VDSO, so a call
//! costs tens of nanoseconds.

use nix::time::{clock_gettime, ClockId};

use crate::{Error, Result};

/// Read the monotonic-raw clock in nanoseconds.
///
/// A failed read is fatal to the calling scenario: a measurement framework
/// must not fall back to a noisier clock.
#[inline]
pub fn now_ns() -> Result<u64> {
    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC_RAW).map_err(Error::Clock)?;
    Ok(ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn monotone() {
        let a = now_ns().unwrap();
        let b = now_ns().unwrap();
        assert!(b >= a);
    }

    #[test]
    fn nanosecond_scale() {
        // Two reads a millisecond apart must differ by roughly that much.
        let a = now_ns().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = now_ns().unwrap();
        assert!(b - a >= 900_000);
    }
}
