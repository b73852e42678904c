//! Scenario-driver support: cooperative interrupt handling.
//!
//! SIGINT does not kill a scenario mid-iteration. The handler raises a
//! flag; drivers poll it at iteration boundaries, join any outstanding
//! workers, flush their record writer, and return cleanly.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::Result;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler. Call once, before the first iteration.
pub fn install_interrupt_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGINT, &action) }
        .map_err(|e| crate::Error::Workload(format!("sigaction failed: {e}")))?;
    Ok(())
}

/// True once the user has asked the scenario to stop. Checked at iteration
/// boundaries only; never inside the measured region.
#[inline]
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Reset the flag. Test hook.
#[doc(hidden)]
pub fn clear_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flag_observes_signal() {
        install_interrupt_handler().unwrap();
        clear_interrupt();
        assert!(!interrupted());
        unsafe { libc::raise(libc::SIGINT) };
        assert!(interrupted());
        clear_interrupt();
    }
}
