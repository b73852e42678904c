//! Page-size comparison buffers: ordinary 4 KiB pages, a transparent
//! huge-page hint, or explicit hugetlb pages. The access kernel strides
//! one byte per page so translation cost dominates.

use std::hint::black_box;
use std::num::NonZeroUsize;
use std::os::unix::io::RawFd;

use nix::sys::mman::{madvise, mmap, munmap, MapFlags, MmapAdvise, ProtFlags};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Normal,
    TransparentHuge,
    ExplicitHuge,
}

impl PageKind {
    pub const ALL: [PageKind; 3] = [
        PageKind::Normal,
        PageKind::TransparentHuge,
        PageKind::ExplicitHuge,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PageKind::Normal => "normal_4KB",
            PageKind::TransparentHuge => "transparent_huge",
            PageKind::ExplicitHuge => "huge_2MB",
        }
    }
}

/// An anonymous mapping allocated with the requested page type.
///
/// Hugetlb pools are often empty; in that case the mapping silently comes
/// from ordinary pages, `degraded` is set, and one warning is logged —
/// the scenario still runs best-effort.
pub struct PageBuffer {
    ptr: *mut u8,
    len: usize,
    pub kind: PageKind,
    pub degraded: bool,
}

unsafe impl Send for PageBuffer {}

impl PageBuffer {
    pub fn alloc(len: usize, kind: PageKind) -> Result<Self> {
        let length = NonZeroUsize::new(len).ok_or(Error::Alloc { len })?;
        let base_flags = MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS;
        let mut degraded = false;

        let ptr = match kind {
            PageKind::ExplicitHuge => {
                let huge = unsafe {
                    mmap(
                        None,
                        length,
                        ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                        base_flags | MapFlags::MAP_HUGETLB,
                        -1 as RawFd,
                        0,
                    )
                };
                match huge {
                    Ok(ptr) => ptr,
                    Err(e) => {
                        log::warn!("hugetlb mapping failed ({e}); falling back to normal pages");
                        degraded = true;
                        Self::map_normal(length, base_flags)?
                    }
                }
            }
            _ => Self::map_normal(length, base_flags)?,
        };

        if kind == PageKind::TransparentHuge {
            if let Err(e) = unsafe { madvise(ptr, len, MmapAdvise::MADV_HUGEPAGE) } {
                log::warn!("MADV_HUGEPAGE rejected ({e}); proceeding with normal pages");
                degraded = true;
            }
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            len,
            kind,
            degraded,
        })
    }

    fn map_normal(length: NonZeroUsize, flags: MapFlags) -> Result<*mut libc::c_void> {
        unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                flags,
                -1 as RawFd,
                0,
            )
        }
        .map_err(|e| Error::Map {
            len: length.get(),
            source: e,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Touch every page once so later measurement sees no allocation
    /// faults. Warmup, not measurement.
    pub fn fault_in(&mut self) {
        self.as_mut_slice().fill(0xaa);
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr as *mut _, self.len) } {
            log::warn!("munmap of page buffer failed: {e}");
        }
    }
}

/// One volatile byte per 4 KiB page, wrapping over the buffer.
pub fn page_strided_access(buffer: &[u8], iterations: u64) -> u64 {
    let len = buffer.len();
    if len == 0 {
        return 0;
    }
    let stride = 4096usize;
    let mut sum: u64 = 0;
    for i in 0..iterations {
        let offset = (i as usize).wrapping_mul(stride) % len;
        sum = sum.wrapping_add(unsafe { std::ptr::read_volatile(&buffer[offset]) } as u64);
    }
    black_box(sum)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normal_pages_allocate() {
        let mut buf = PageBuffer::alloc(1 << 20, PageKind::Normal).unwrap();
        assert!(!buf.degraded);
        buf.fault_in();
        assert_eq!(buf.as_slice()[4096], 0xaa);
    }

    #[test]
    fn thp_hint_allocates() {
        // The madvise may degrade but the memory must be usable either way.
        let mut buf = PageBuffer::alloc(4 << 20, PageKind::TransparentHuge).unwrap();
        buf.fault_in();
        assert_eq!(buf.as_slice()[buf.len() - 1], 0xaa);
    }

    #[test]
    fn explicit_huge_degrades_not_fails() {
        // With an empty hugetlb pool this must still return usable memory.
        let mut buf = PageBuffer::alloc(2 << 20, PageKind::ExplicitHuge).unwrap();
        buf.fault_in();
        assert_eq!(buf.as_slice()[0], 0xaa);
    }

    #[test]
    fn strided_access_counts() {
        let mut buf = PageBuffer::alloc(64 * 4096, PageKind::Normal).unwrap();
        buf.fault_in();
        assert_eq!(page_strided_access(buf.as_slice(), 128), 128 * 0xaa);
    }
}
