//! NUMA topology discovery and node-bound page allocation.
//!
//! Topology comes from `/sys/devices/system/node`; binding goes through the
//! raw `mbind` syscall so the crate does not drag in libnuma. Single-node
//! systems transparently fall back to the heap, which is why [`NumaBuffer`]
//! owns its release path instead of handing pointers to a generic
//! deallocator.

use std::num::NonZeroUsize;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::OnceLock;

use nix::sched::CpuSet;
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use crate::{Error, Result};

const MAX_NODES: usize = 256;

// Memory-policy modes and mbind flags, from linux/mempolicy.h.
const MPOL_BIND: usize = 2;
const MPOL_INTERLEAVE: usize = 3;
const MPOL_MF_STRICT: usize = 1 << 0;
const MPOL_MF_MOVE: usize = 1 << 1;

static NODE_COUNT: OnceLock<Option<usize>> = OnceLock::new();

/// Number of NUMA nodes, or `None` when the sysfs topology is absent.
///
/// The probe runs once per process; the `OnceLock` holds `None` for
/// "probed and unavailable", distinct from the never-probed state.
pub fn node_count() -> Option<usize> {
    *NODE_COUNT.get_or_init(probe_node_count)
}

/// Uncached probe. Tests call this directly to bypass the process-wide
/// cache.
pub fn probe_node_count() -> Option<usize> {
    let mut count = 0;
    for node in 0..MAX_NODES {
        if !Path::new(&format!("/sys/devices/system/node/node{node}")).exists() {
            break;
        }
        count += 1;
    }
    if count > 0 {
        Some(count)
    } else {
        None
    }
}

/// True when the system has more than one node.
pub fn available() -> bool {
    node_count().map_or(false, |n| n > 1)
}

/// CPU indices belonging to a node, ascending, from its `cpulist` file.
pub fn node_cpu_list(node: usize) -> Result<Vec<usize>> {
    let path = format!("/sys/devices/system/node/node{node}/cpulist");
    let text = std::fs::read_to_string(path)?;
    parse_cpulist(text.trim())
}

/// CPUs belonging to a node as an affinity mask.
pub fn node_cpus(node: usize) -> Result<CpuSet> {
    let mut set = CpuSet::new();
    for cpu in node_cpu_list(node)? {
        // CPUs beyond the mask width exist on very large boxes; the mask
        // still covers everything a scenario can pin to.
        let _ = set.set(cpu);
    }
    Ok(set)
}

/// Parse the kernel cpulist grammar: comma-separated singletons ("7") and
/// inclusive ranges ("0-3"), in any mix.
fn parse_cpulist(text: &str) -> Result<Vec<usize>> {
    let mut cpus = Vec::new();
    if text.is_empty() {
        return Ok(cpus);
    }
    for part in text.split(',') {
        let part = part.trim();
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.parse().map_err(|_| bad_cpulist(text))?;
                let hi: usize = hi.parse().map_err(|_| bad_cpulist(text))?;
                if hi < lo {
                    return Err(bad_cpulist(text));
                }
                cpus.extend(lo..=hi);
            }
            None => cpus.push(part.parse().map_err(|_| bad_cpulist(text))?),
        }
    }
    Ok(cpus)
}

fn bad_cpulist(text: &str) -> Error {
    Error::Workload(format!("malformed cpulist {text:?}"))
}

/// First CPU of a node; used to pin onto the node being measured.
pub fn first_cpu_of_node(node: usize) -> Option<usize> {
    node_cpu_list(node).ok()?.into_iter().min()
}

enum Backing {
    /// Page-aligned anonymous mapping, released with munmap.
    Mapped,
    /// Heap block from the single-node fallback path.
    Heap(std::alloc::Layout),
}

/// A buffer whose pages are (best-effort) bound to a NUMA policy.
///
/// Release always matches the allocation path: the drop impl unmaps mapped
/// regions and deallocates heap blocks. Never free these through anything
/// else.
pub struct NumaBuffer {
    ptr: *mut u8,
    len: usize,
    backing: Backing,
}

// The buffer is plain anonymous memory owned by this handle.
unsafe impl Send for NumaBuffer {}

impl NumaBuffer {
    /// Allocate `len` bytes strictly bound to `node`.
    ///
    /// On single-node systems this degrades to a plain heap allocation. A
    /// binding failure still returns the (unbound) memory with one warning,
    /// so scenarios run best-effort.
    pub fn on_node(len: usize, node: usize) -> Result<Self> {
        let nodes = match node_count() {
            Some(n) if n > 1 => n,
            _ => return Self::heap(len),
        };
        if node >= nodes {
            return Err(Error::BadNode { node, nodes });
        }
        let buf = Self::mapped(len)?;
        let mask = [1u64 << node];
        if let Err(e) = mbind(buf.ptr, len, MPOL_BIND, &mask, MPOL_MF_STRICT | MPOL_MF_MOVE) {
            log::warn!("mbind to node {node} failed ({e}); memory left unbound");
        }
        Ok(buf)
    }

    /// Allocate `len` bytes with pages interleaved round-robin across all
    /// nodes.
    pub fn interleaved(len: usize) -> Result<Self> {
        let nodes = match node_count() {
            Some(n) if n > 1 => n,
            _ => return Self::heap(len),
        };
        let buf = Self::mapped(len)?;
        let mut mask = [0u64; MAX_NODES / 64];
        for node in 0..nodes {
            mask[node / 64] |= 1 << (node % 64);
        }
        let words = (nodes + 63) / 64;
        if let Err(e) = mbind(buf.ptr, len, MPOL_INTERLEAVE, &mask[..words], MPOL_MF_MOVE) {
            log::warn!("mbind interleave failed ({e}); memory left unbound");
        }
        Ok(buf)
    }

    fn mapped(len: usize) -> Result<Self> {
        let length = NonZeroUsize::new(len).ok_or(Error::Alloc { len })?;
        let ptr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
                -1 as RawFd,
                0,
            )
            .map_err(|e| Error::Map { len, source: e })?
        };
        Ok(Self {
            ptr: ptr as *mut u8,
            len,
            backing: Backing::Mapped,
        })
    }

    fn heap(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::Alloc { len });
        }
        let layout = std::alloc::Layout::from_size_align(len, page_size())
            .map_err(|_| Error::Alloc { len })?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(Error::Alloc { len });
        }
        Ok(Self {
            ptr,
            len,
            backing: Backing::Heap(layout),
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

    /// View as u64 words, the unit every memory kernel works in.
    pub fn as_mut_words(&mut self) -> &mut [u64] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr as *mut u64, self.len / 8) }
    }

    pub fn as_words(&self) -> &[u64] {
        unsafe { std::slice::from_raw_parts(self.ptr as *const u64, self.len / 8) }
    }
}

impl Drop for NumaBuffer {
    fn drop(&mut self) {
        unsafe {
            match self.backing {
                Backing::Mapped => {
                    if let Err(e) = munmap(self.ptr as *mut _, self.len) {
                        log::warn!("munmap of {} bytes failed: {e}", self.len);
                    }
                }
                Backing::Heap(layout) => std::alloc::dealloc(self.ptr, layout),
            }
        }
    }
}

fn mbind(
    ptr: *mut u8,
    len: usize,
    mode: usize,
    mask: &[u64],
    flags: usize,
) -> std::io::Result<()> {
    // maxnode counts bits, plus one for the kernel's off-by-one convention.
    let maxnode = mask.len() * 64 + 1;
    let rc = unsafe {
        libc::syscall(
            libc::SYS_mbind,
            ptr,
            len,
            mode,
            mask.as_ptr(),
            maxnode,
            flags,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

pub fn page_size() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n < 1 {
        4096
    } else {
        n as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cpulist_singletons_and_ranges() {
        assert_eq!(parse_cpulist("0").unwrap(), vec![0]);
        assert_eq!(parse_cpulist("0-3").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(
            parse_cpulist("0-3,8-11,16").unwrap(),
            vec![0, 1, 2, 3, 8, 9, 10, 11, 16]
        );
        assert_eq!(parse_cpulist("").unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn cpulist_rejects_garbage() {
        assert!(parse_cpulist("3-1").is_err());
        assert!(parse_cpulist("a-b").is_err());
        assert!(parse_cpulist("1,,2").is_err());
    }

    #[test]
    fn probe_agrees_with_cache() {
        assert_eq!(node_count(), probe_node_count());
    }

    #[test]
    fn buffers_allocate_and_release() {
        let mut buf = NumaBuffer::on_node(1 << 20, 0).unwrap();
        buf.as_mut_slice().fill(0x42);
        assert_eq!(buf.as_slice()[12345], 0x42);

        let mut inter = NumaBuffer::interleaved(1 << 20).unwrap();
        inter.as_mut_words().fill(7);
        assert_eq!(inter.as_words()[100], 7);
    }

    #[test]
    fn bad_node_is_rejected_on_multinode() {
        if let Some(nodes) = node_count() {
            if nodes > 1 {
                assert!(NumaBuffer::on_node(4096, nodes + 1).is_err());
            }
        }
    }

    #[test]
    fn page_size_sane() {
        let p = page_size();
        assert!(p >= 4096 && p.is_power_of_two());
    }
}
