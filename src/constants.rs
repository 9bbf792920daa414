use std::time::Duration;

/// Prefix of the per-test reporting lines emitted by the harness epilogue.
/// A line counts as a marker only when the whole line parses as
/// `<delimiter>:<index>:<PASS|FAIL>`, so submitted code printing the
/// delimiter mid-line cannot forge results.
pub const REPORT_DELIMITER: &str = "@@CODEGRADER@@";

/// Fixed internal symbol the rebinding shim points at the learner's function.
pub const SOLUTION_ALIAS: &str = "__solution";

/// Appended to a captured stream when the capture ceiling was hit.
pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

pub const DEFAULT_CAPTURE_LIMIT_BYTES: usize = 64 * 1024;
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(2);
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 256 * 1024 * 1024;
pub const WATCHDOG_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub const SLOT_ACQUIRE_ERR: &str = "execution slot semaphore closed";
