pub mod local;

pub use local::{ExecutionContext, LocalSandbox};

use crate::constants::REPORT_DELIMITER;
use crate::domain::{ExecutionLimits, HarnessSource, Language, RawResult, TestMarker};
use crate::errors::LaunchError;

/// Runs exactly one harness (or bare script) to completion or forced
/// termination. Implementations never let the submission outlive the
/// time limit or touch another run's filesystem.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute<'a>(
        &self,
        source: &HarnessSource,
        language: &Language,
        stdin: Option<&'a str>,
        limits: &ExecutionLimits,
    ) -> Result<RawResult, LaunchError>;
}

/// Extracts per-test markers from captured stdout.
///
/// Only lines that fully parse as `<delimiter>:<index>:<PASS|FAIL>` count;
/// submitted code printing the delimiter mid-line cannot forge a marker.
pub fn parse_markers(stdout: &str) -> Vec<TestMarker> {
    stdout.lines().filter_map(parse_marker_line).collect()
}

fn parse_marker_line(line: &str) -> Option<TestMarker> {
    let rest = line.trim_end().strip_prefix(REPORT_DELIMITER)?;
    let rest = rest.strip_prefix(':')?;
    let (index, verdict) = rest.split_once(':')?;
    let index = index.parse::<usize>().ok()?;
    let passed = match verdict {
        "PASS" => true,
        "FAIL" => false,
        _ => return None,
    };
    Some(TestMarker { index, passed })
}

/// Drops marker lines from learner-visible stdout; the epilogue channel is
/// internal to the engine.
pub fn strip_marker_lines(stdout: &str) -> String {
    let mut out = String::with_capacity(stdout.len());
    // Terminators travel with their line, so kept lines come through with
    // exactly the newlines they had.
    for line in stdout.split_inclusive('\n') {
        if parse_marker_line(line).is_none() {
            out.push_str(line);
        }
    }
    out
}
