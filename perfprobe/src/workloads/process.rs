//! Process creation cost: fork, vfork, a thread-like clone sharing the
//! address space, and spawning a trivial external child. Each iteration is
//! one full create-exit-reap cycle; the clone stack is allocated once at
//! construction so the measured region never touches the allocator.

use nix::sched::{clone, CloneFlags};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};

use crate::{Error, Result};

const CLONE_STACK_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Fork,
    Vfork,
    CloneVm,
    Spawn,
}

impl SpawnKind {
    pub const ALL: [SpawnKind; 4] = [
        SpawnKind::Fork,
        SpawnKind::Vfork,
        SpawnKind::CloneVm,
        SpawnKind::Spawn,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SpawnKind::Fork => "fork",
            SpawnKind::Vfork => "vfork",
            SpawnKind::CloneVm => "clone_vm",
            SpawnKind::Spawn => "spawn",
        }
    }
}

/// Prepared process-creation workload for one spawn variant.
pub struct ProcessWorkload {
    kind: SpawnKind,
    clone_stack: Vec<u8>,
}

impl ProcessWorkload {
    pub fn new(kind: SpawnKind) -> Self {
        let clone_stack = if kind == SpawnKind::CloneVm {
            vec![0u8; CLONE_STACK_SIZE]
        } else {
            Vec::new()
        };
        Self { kind, clone_stack }
    }

    pub fn kind(&self) -> SpawnKind {
        self.kind
    }

    /// One create-exit-reap cycle.
    pub fn run_once(&mut self) -> Result<()> {
        match self.kind {
            SpawnKind::Fork => spawn_fork(),
            SpawnKind::Vfork => spawn_vfork(),
            SpawnKind::CloneVm => spawn_clone_vm(&mut self.clone_stack),
            SpawnKind::Spawn => spawn_child(),
        }
    }
}

fn spawn_fork() -> Result<()> {
    // The child does nothing but exit; _exit avoids running atexit hooks
    // in a forked copy of this process.
    match unsafe { fork() }.map_err(|e| Error::Workload(format!("fork failed: {e}")))? {
        ForkResult::Child => unsafe { libc::_exit(0) },
        ForkResult::Parent { child } => reap(child),
    }
}

fn spawn_vfork() -> Result<()> {
    // vfork suspends the parent until the child exits; the child must not
    // touch the shared address space beyond calling _exit.
    let pid = unsafe { libc::vfork() };
    if pid == 0 {
        unsafe { libc::_exit(0) };
    }
    if pid < 0 {
        return Err(Error::Workload(format!(
            "vfork failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    reap(Pid::from_raw(pid))
}

fn spawn_clone_vm(stack: &mut [u8]) -> Result<()> {
    let flags = CloneFlags::CLONE_VM
        | CloneFlags::CLONE_FS
        | CloneFlags::CLONE_FILES
        | CloneFlags::CLONE_SIGHAND;
    let child = unsafe {
        clone(
            Box::new(|| 0isize),
            stack,
            flags,
            Some(libc::SIGCHLD),
        )
    }
    .map_err(|e| Error::Workload(format!("clone failed: {e}")))?;
    reap(child)
}

fn spawn_child() -> Result<()> {
    let mut child = std::process::Command::new("/bin/true")
        .spawn()
        .map_err(|e| Error::Workload(format!("spawn failed: {e}")))?;
    child
        .wait()
        .map_err(|e| Error::Workload(format!("wait failed: {e}")))?;
    Ok(())
}

fn reap(child: Pid) -> Result<()> {
    waitpid(child, None).map_err(|e| Error::Workload(format!("waitpid failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fork_cycle_completes() {
        ProcessWorkload::new(SpawnKind::Fork).run_once().unwrap();
    }

    #[test]
    fn vfork_cycle_completes() {
        ProcessWorkload::new(SpawnKind::Vfork).run_once().unwrap();
    }

    #[test]
    fn clone_cycle_completes() {
        let mut work = ProcessWorkload::new(SpawnKind::CloneVm);
        work.run_once().unwrap();
        // The stack is reusable across iterations.
        work.run_once().unwrap();
    }

    #[test]
    fn spawn_cycle_completes() {
        ProcessWorkload::new(SpawnKind::Spawn).run_once().unwrap();
    }
}
