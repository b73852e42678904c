//! Per-process kernel counters from the proc pseudo-filesystem.
//!
//! Two files back the metric snapshot: `/proc/self/status` for the labeled
//! context-switch counters and `/proc/self/stat` for the positional fault
//! counts. Reads happen only at iteration boundaries. A missing file or a
//! parse failure yields zeros for that sample; scenarios are long enough
//! that one lost sample never justifies an abort.

/// Raw counter values at one iteration boundary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounters {
    pub voluntary_ctxt_switches: u64,
    pub nonvoluntary_ctxt_switches: u64,
    pub minor_page_faults: u64,
    pub major_page_faults: u64,
}

/// Read the current process's counters. Infallible by design: any read or
/// parse problem degrades the affected fields to zero.
pub fn read_task_counters() -> TaskCounters {
    let mut c = TaskCounters::default();
    match std::fs::read_to_string("/proc/self/status") {
        Ok(text) => {
            let (vol, nonvol) = parse_status(&text);
            c.voluntary_ctxt_switches = vol;
            c.nonvoluntary_ctxt_switches = nonvol;
        }
        Err(e) => log::debug!("/proc/self/status unreadable: {e}"),
    }
    match std::fs::read_to_string("/proc/self/stat") {
        Ok(text) => {
            let (minor, major) = parse_stat(&text);
            c.minor_page_faults = minor;
            c.major_page_faults = major;
        }
        Err(e) => log::debug!("/proc/self/stat unreadable: {e}"),
    }
    c
}

/// Pull the two `*_ctxt_switches` lines out of the status text.
fn parse_status(text: &str) -> (u64, u64) {
    let mut voluntary = 0;
    let mut nonvoluntary = 0;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("voluntary_ctxt_switches:") {
            voluntary = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("nonvoluntary_ctxt_switches:") {
            nonvoluntary = rest.trim().parse().unwrap_or(0);
        }
    }
    (voluntary, nonvoluntary)
}

/// Pull minflt (field 10) and majflt (field 12) out of the stat record.
///
/// The comm field may itself contain spaces and parentheses, so counting
/// starts after the *last* closing parenthesis: the next token is field 3.
fn parse_stat(text: &str) -> (u64, u64) {
    let rest = match text.rfind(')') {
        Some(pos) => &text[pos + 1..],
        None => return (0, 0),
    };
    let mut fields = rest.split_whitespace();
    let minor = fields.nth(7).and_then(|f| f.parse().ok()).unwrap_or(0);
    let major = fields.nth(1).and_then(|f| f.parse().ok()).unwrap_or(0);
    (minor, major)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_parsing() {
        let text = "Name:\tcat\n\
                    Threads:\t1\n\
                    voluntary_ctxt_switches:\t41\n\
                    nonvoluntary_ctxt_switches:\t7\n";
        assert_eq!(parse_status(text), (41, 7));
    }

    #[test]
    fn status_missing_lines_are_zero() {
        assert_eq!(parse_status("Name:\tcat\n"), (0, 0));
    }

    #[test]
    fn stat_field_positions() {
        // pid comm state ppid pgrp sess tty tpgid flags minflt cminflt majflt ...
        let text = "1234 (cat) R 1 1234 1234 0 -1 4194304 161 0 3 0 2 1 0 0 20 0 1 0";
        assert_eq!(parse_stat(text), (161, 3));
    }

    #[test]
    fn stat_hostile_comm() {
        // A comm containing ") R 9 9 9 9 9 9 9" must not shift the fields.
        let text = "99 (a) R 9 9 9 9 9 9 9) S 1 99 99 0 -1 0 55 0 8 0";
        assert_eq!(parse_stat(text), (55, 8));
    }

    #[test]
    fn live_read_is_nonzero() {
        // Any process that got this far has taken at least one minor fault.
        let c = read_task_counters();
        assert!(c.minor_page_faults > 0);
    }
}
