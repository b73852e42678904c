//! Syscall overhead kernels: tight loops around a fast syscall, a simple
//! kernel read, and a moderate bookkeeping call, against a no-syscall
//! baseline loop. The /dev/null descriptor is opened at construction so
//! the measured region issues only the syscall under study.

use std::fs::File;
use std::hint::black_box;
use std::io::Read;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallKind {
    /// No syscall at all: a volatile accumulate loop.
    Baseline,
    /// getpid, the classic fast path.
    Getpid,
    /// One-byte read from /dev/null.
    ReadDevNull,
    /// getrusage(RUSAGE_SELF), moderate kernel work.
    Getrusage,
}

impl SyscallKind {
    pub const ALL: [SyscallKind; 4] = [
        SyscallKind::Baseline,
        SyscallKind::Getpid,
        SyscallKind::ReadDevNull,
        SyscallKind::Getrusage,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SyscallKind::Baseline => "baseline",
            SyscallKind::Getpid => "getpid",
            SyscallKind::ReadDevNull => "read_devnull",
            SyscallKind::Getrusage => "getrusage",
        }
    }
}

/// Prepared syscall workload.
pub struct SyscallWorkload {
    kind: SyscallKind,
    devnull: Option<File>,
}

impl SyscallWorkload {
    pub fn new(kind: SyscallKind) -> Result<Self> {
        let devnull = if kind == SyscallKind::ReadDevNull {
            Some(File::open("/dev/null").map_err(Error::Io)?)
        } else {
            None
        };
        Ok(Self { kind, devnull })
    }

    pub fn kind(&self) -> SyscallKind {
        self.kind
    }

    /// Issue `iterations` calls of the selected kind.
    pub fn run(&mut self, iterations: u64) {
        match self.kind {
            SyscallKind::Baseline => {
                let mut sum: u64 = 0;
                for i in 0..iterations {
                    sum = black_box(sum.wrapping_add(i));
                }
                black_box(sum);
            }
            SyscallKind::Getpid => {
                for _ in 0..iterations {
                    black_box(unsafe { libc::getpid() });
                }
            }
            SyscallKind::ReadDevNull => {
                let file = self.devnull.as_mut().expect("opened at construction");
                let mut byte = [0u8; 1];
                for _ in 0..iterations {
                    // /dev/null always returns 0 bytes; the syscall is the
                    // point, not the data.
                    let _ = file.read(&mut byte);
                }
                black_box(byte[0]);
            }
            SyscallKind::Getrusage => {
                let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
                for _ in 0..iterations {
                    unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
                }
                black_box(usage.ru_minflt);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_kinds_run() {
        for kind in SyscallKind::ALL {
            let mut work = SyscallWorkload::new(kind).unwrap();
            work.run(1000);
        }
    }

    #[test]
    fn devnull_only_opened_when_needed() {
        assert!(SyscallWorkload::new(SyscallKind::Baseline)
            .unwrap()
            .devnull
            .is_none());
        assert!(SyscallWorkload::new(SyscallKind::ReadDevNull)
            .unwrap()
            .devnull
            .is_some());
    }
}
