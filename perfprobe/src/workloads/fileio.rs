//! File I/O access patterns over a scratch file: buffered sequential read
//! and write, random-seek reads, page-cache-bypassing direct reads, and
//! memory-mapped sequential and random access.
//!
//! The backing file lives in the system temp directory and is unlinked
//! when the workload drops. Creation, sizing, and index generation all
//! happen at construction, outside any measured region.

use std::fs::{File, OpenOptions};
use std::hint::black_box;
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

pub const BLOCK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPattern {
    SequentialRead,
    SequentialWrite,
    RandomRead,
    DirectRead,
    MmapSequential,
    MmapRandom,
}

impl IoPattern {
    pub const ALL: [IoPattern; 6] = [
        IoPattern::SequentialRead,
        IoPattern::SequentialWrite,
        IoPattern::RandomRead,
        IoPattern::DirectRead,
        IoPattern::MmapSequential,
        IoPattern::MmapRandom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IoPattern::SequentialRead => "sequential_read",
            IoPattern::SequentialWrite => "sequential_write",
            IoPattern::RandomRead => "random_read",
            IoPattern::DirectRead => "direct_io_read",
            IoPattern::MmapSequential => "mmap_sequential",
            IoPattern::MmapRandom => "mmap_random",
        }
    }
}

/// The scratch file plus pre-generated access state for one pattern run.
pub struct IoWorkload {
    file: tempfile::NamedTempFile,
    len: usize,
    seek_offsets: Vec<u64>,
    random_offsets: Vec<usize>,
}

impl IoWorkload {
    /// Create and fill the scratch file, and pre-generate both random
    /// access sequences.
    pub fn new(len: usize, seeks: usize, touches: usize, seed: u64) -> Result<Self> {
        let mut file = tempfile::NamedTempFile::new()?;
        let block = [0xaau8; BLOCK_SIZE];
        for _ in 0..len / BLOCK_SIZE {
            file.write_all(&block)?;
        }
        file.flush()?;

        let blocks = (len / BLOCK_SIZE) as u64;
        let mut rng = SmallRng::seed_from_u64(seed);
        let seek_offsets = (0..seeks)
            .map(|_| rng.gen_range(0..blocks) * BLOCK_SIZE as u64)
            .collect();
        let random_offsets = (0..touches).map(|_| rng.gen_range(0..len)).collect();

        Ok(Self {
            file,
            len,
            seek_offsets,
            random_offsets,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Execute one pattern; returns the number of bytes moved (reads and
    /// writes) or accesses made (mmap random), for throughput columns.
    pub fn run(&mut self, pattern: IoPattern) -> Result<u64> {
        match pattern {
            IoPattern::SequentialRead => self.sequential_read(),
            IoPattern::SequentialWrite => self.sequential_write(),
            IoPattern::RandomRead => self.random_read(),
            IoPattern::DirectRead => self.direct_read(),
            IoPattern::MmapSequential => self.mmap_sequential(),
            IoPattern::MmapRandom => self.mmap_random(),
        }
    }

    fn sequential_read(&self) -> Result<u64> {
        let mut file = File::open(self.file.path())?;
        let mut block = [0u8; BLOCK_SIZE];
        let mut bytes = 0u64;
        loop {
            let n = file.read(&mut block)?;
            if n == 0 {
                break;
            }
            bytes += n as u64;
        }
        black_box(block[0]);
        Ok(bytes)
    }

    fn sequential_write(&mut self) -> Result<u64> {
        let mut file = OpenOptions::new().write(true).open(self.file.path())?;
        let block = [0xaau8; BLOCK_SIZE];
        for _ in 0..self.len / BLOCK_SIZE {
            file.write_all(&block)?;
        }
        file.flush()?;
        Ok(self.len as u64)
    }

    fn random_read(&self) -> Result<u64> {
        let mut file = File::open(self.file.path())?;
        let mut block = [0u8; BLOCK_SIZE];
        let mut bytes = 0u64;
        for &offset in &self.seek_offsets {
            file.seek(SeekFrom::Start(offset))?;
            bytes += file.read(&mut block)? as u64;
        }
        black_box(block[0]);
        Ok(bytes)
    }

    fn direct_read(&self) -> Result<u64> {
        let mut file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECT)
            .open(self.file.path())
            .map_err(|e| Error::Workload(format!("O_DIRECT open failed: {e}")))?;
        // Direct I/O requires a block-aligned buffer.
        let mut block = AlignedBlock::new();
        let mut bytes = 0u64;
        loop {
            let n = file.read(block.as_mut_slice())?;
            if n == 0 {
                break;
            }
            bytes += n as u64;
        }
        Ok(bytes)
    }

    fn mmap_sequential(&self) -> Result<u64> {
        let map = Mapping::of_file(self.file.as_file(), self.len)?;
        let data = map.as_slice();
        let mut sum = 0u64;
        let mut offset = 0;
        while offset < data.len() {
            sum = sum.wrapping_add(unsafe { std::ptr::read_volatile(&data[offset]) } as u64);
            offset += BLOCK_SIZE;
        }
        black_box(sum);
        Ok(self.len as u64)
    }

    fn mmap_random(&self) -> Result<u64> {
        let map = Mapping::of_file(self.file.as_file(), self.len)?;
        let data = map.as_slice();
        let mut sum = 0u64;
        for &offset in &self.random_offsets {
            sum = sum.wrapping_add(unsafe { std::ptr::read_volatile(&data[offset]) } as u64);
        }
        black_box(sum);
        Ok(self.random_offsets.len() as u64)
    }
}

/// Read-only private mapping of the scratch file, unmapped on drop.
struct Mapping {
    ptr: *mut libc::c_void,
    len: usize,
}

impl Mapping {
    fn of_file(file: &File, len: usize) -> Result<Self> {
        let length = NonZeroUsize::new(len).ok_or(Error::Alloc { len })?;
        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ,
                MapFlags::MAP_PRIVATE,
                file.as_raw_fd() as RawFd,
                0,
            )
        }
        .map_err(|e| Error::Map { len, source: e })?;
        Ok(Self { ptr, len })
    }

    fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
            log::warn!("munmap of file mapping failed: {e}");
        }
    }
}

/// Heap block aligned for O_DIRECT transfers.
struct AlignedBlock {
    ptr: *mut u8,
    layout: std::alloc::Layout,
}

impl AlignedBlock {
    fn new() -> Self {
        let layout = std::alloc::Layout::from_size_align(BLOCK_SIZE, BLOCK_SIZE).unwrap();
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        Self { ptr, layout }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, BLOCK_SIZE) }
    }
}

impl Drop for AlignedBlock {
    fn drop(&mut self) {
        unsafe { std::alloc::dealloc(self.ptr, self.layout) };
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const LEN: usize = 1 << 20;

    fn workload() -> IoWorkload {
        IoWorkload::new(LEN, 32, 256, 7).unwrap()
    }

    #[test]
    fn sequential_read_sees_whole_file() {
        let mut work = workload();
        assert_eq!(work.run(IoPattern::SequentialRead).unwrap(), LEN as u64);
    }

    #[test]
    fn sequential_write_rewrites_whole_file() {
        let mut work = workload();
        assert_eq!(work.run(IoPattern::SequentialWrite).unwrap(), LEN as u64);
        // The file keeps its size and stays readable.
        assert_eq!(work.run(IoPattern::SequentialRead).unwrap(), LEN as u64);
    }

    #[test]
    fn random_read_touches_every_seek() {
        let mut work = workload();
        assert_eq!(
            work.run(IoPattern::RandomRead).unwrap(),
            32 * BLOCK_SIZE as u64
        );
    }

    #[test]
    fn mmap_patterns_complete() {
        let mut work = workload();
        assert_eq!(work.run(IoPattern::MmapSequential).unwrap(), LEN as u64);
        assert_eq!(work.run(IoPattern::MmapRandom).unwrap(), 256);
    }

    #[test]
    fn direct_read_when_supported() {
        // tmpfs rejects O_DIRECT; only assert when the open succeeds.
        let mut work = workload();
        if let Ok(bytes) = work.run(IoPattern::DirectRead) {
            assert_eq!(bytes, LEN as u64);
        }
    }

    #[test]
    fn scratch_file_is_removed() {
        let path = {
            let work = workload();
            work.file.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
