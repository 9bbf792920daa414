use crate::constants::TRUNCATION_MARKER;
use crate::domain::{RawResult, Status, TestMarker};
use crate::executor::strip_marker_lines;

/// Whether the run was a free-form script execution or a graded harness run.
/// Graded mode knows how many verdicts a complete report carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradeMode {
    Bare,
    Graded { expected_tests: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub status: Status,
    pub error_message: Option<String>,
}

/// Maps a raw execution outcome to the public status taxonomy.
///
/// Pure: the same `RawResult` and mode always classify identically. Rules
/// apply in priority order; a timeout wins over everything else because a
/// killed run is not reliably complete, even if every marker printed so
/// far says PASS.
pub fn classify(raw: &RawResult, mode: GradeMode) -> Classification {
    if raw.timed_out {
        return Classification {
            status: Status::Timeout,
            error_message: Some(format!(
                "wall-clock time limit exceeded after {:.1}s",
                raw.wall_time.as_secs_f64()
            )),
        };
    }
    if raw.killed_for_memory {
        return Classification {
            status: Status::Error,
            error_message: Some("memory_limit_exceeded".to_string()),
        };
    }

    match mode {
        GradeMode::Graded { expected_tests } => {
            if raw.markers.iter().any(|m| !m.passed) {
                return Classification {
                    status: Status::Failure,
                    error_message: None,
                };
            }
            if raw.exit_code != 0 {
                // No test ran before the process died, or it exited abnormally.
                return Classification {
                    status: Status::Error,
                    error_message: Some(runtime_fault_message(raw)),
                };
            }
            if !markers_complete(&raw.markers, expected_tests) {
                // A clean exit without exactly one verdict per test in order
                // means the report channel was forged or cut short; an
                // all-PASS subset must not grade as Success.
                return Classification {
                    status: Status::Error,
                    error_message: Some("per-test verdicts missing or inconsistent".to_string()),
                };
            }
            Classification {
                status: Status::Success,
                error_message: None,
            }
        }
        GradeMode::Bare => {
            if raw.exit_code == 0 {
                Classification {
                    status: Status::Success,
                    error_message: None,
                }
            } else {
                Classification {
                    status: Status::Error,
                    error_message: Some(runtime_fault_message(raw)),
                }
            }
        }
    }
}

fn markers_complete(markers: &[TestMarker], expected: usize) -> bool {
    markers.len() == expected && markers.iter().enumerate().all(|(i, m)| m.index == i)
}

fn runtime_fault_message(raw: &RawResult) -> String {
    raw.stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| format!("process exited with code {}", raw.exit_code))
}

/// Learner-visible stdout: marker lines are an internal channel and are
/// stripped in graded mode; a truncation marker distinguishes "produced
/// exactly this" from "produced more".
pub fn learner_stdout(raw: &RawResult, mode: GradeMode) -> String {
    let mut out = match mode {
        GradeMode::Graded { .. } => strip_marker_lines(&raw.stdout),
        GradeMode::Bare => raw.stdout.clone(),
    };
    if raw.stdout_truncated {
        out.push_str(TRUNCATION_MARKER);
    }
    out
}

pub fn learner_stderr(raw: &RawResult) -> String {
    let mut out = raw.stderr.clone();
    if raw.stderr_truncated {
        out.push_str(TRUNCATION_MARKER);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TestMarker;
    use std::time::Duration;

    fn raw() -> RawResult {
        RawResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            wall_time: Duration::from_millis(80),
            timed_out: false,
            killed_for_memory: false,
            markers: Vec::new(),
        }
    }

    fn pass(index: usize) -> TestMarker {
        TestMarker {
            index,
            passed: true,
        }
    }

    fn fail(index: usize) -> TestMarker {
        TestMarker {
            index,
            passed: false,
        }
    }

    fn graded(expected_tests: usize) -> GradeMode {
        GradeMode::Graded { expected_tests }
    }

    #[test]
    fn timeout_wins_even_over_all_pass_markers() {
        let mut raw = raw();
        raw.timed_out = true;
        raw.markers = vec![pass(0), pass(1)];
        raw.wall_time = Duration::from_millis(1040);

        let got = classify(&raw, graded(2));
        assert_eq!(got.status, Status::Timeout);
        assert!(got.error_message.unwrap().contains("1.0s"));
    }

    #[test]
    fn memory_kill_is_an_error_with_reason_code() {
        let mut raw = raw();
        raw.killed_for_memory = true;
        raw.exit_code = 137;

        let got = classify(&raw, graded(2));
        assert_eq!(got.status, Status::Error);
        assert_eq!(got.error_message.as_deref(), Some("memory_limit_exceeded"));
    }

    #[test]
    fn any_fail_marker_means_failure_regardless_of_exit_code() {
        let mut raw = raw();
        raw.markers = vec![pass(0), fail(1), pass(2)];
        raw.exit_code = 1;
        assert_eq!(classify(&raw, graded(3)).status, Status::Failure);
    }

    #[test]
    fn all_pass_and_clean_exit_is_success() {
        let mut raw = raw();
        raw.markers = vec![pass(0), pass(1)];
        assert_eq!(classify(&raw, graded(2)).status, Status::Success);
    }

    #[test]
    fn all_pass_but_dirty_exit_is_an_error() {
        let mut raw = raw();
        raw.markers = vec![pass(0)];
        raw.exit_code = 7;
        raw.stderr = "warning\nsomething broke late\n".to_string();

        let got = classify(&raw, graded(1));
        assert_eq!(got.status, Status::Error);
        assert_eq!(got.error_message.as_deref(), Some("something broke late"));
    }

    #[test]
    fn no_markers_means_error_with_stderr_excerpt() {
        let mut raw = raw();
        raw.exit_code = 1;
        raw.stderr = "Traceback (most recent call last):\nSyntaxError: invalid syntax\n".to_string();

        let got = classify(&raw, graded(2));
        assert_eq!(got.status, Status::Error);
        assert_eq!(
            got.error_message.as_deref(),
            Some("SyntaxError: invalid syntax")
        );
    }

    #[test]
    fn no_markers_and_clean_exit_is_still_an_error_in_graded_mode() {
        let got = classify(&raw(), graded(2));
        assert_eq!(got.status, Status::Error);
        assert_eq!(
            got.error_message.as_deref(),
            Some("per-test verdicts missing or inconsistent")
        );
    }

    #[test]
    fn pass_verdicts_not_matching_the_test_set_cannot_grade_as_success() {
        // Duplicated indices with a clean exit.
        let mut duplicated = raw();
        duplicated.markers = vec![pass(0), pass(1), pass(0), pass(1)];
        assert_eq!(classify(&duplicated, graded(2)).status, Status::Error);

        // A strict all-PASS subset.
        let mut subset = raw();
        subset.markers = vec![pass(0)];
        assert_eq!(classify(&subset, graded(2)).status, Status::Error);

        // Out of order.
        let mut reordered = raw();
        reordered.markers = vec![pass(1), pass(0)];
        assert_eq!(classify(&reordered, graded(2)).status, Status::Error);

        // A genuine FAIL among duplicates still reads as Failure.
        let mut mixed = raw();
        mixed.markers = vec![pass(0), pass(1), fail(0), fail(1)];
        mixed.exit_code = 1;
        assert_eq!(classify(&mixed, graded(2)).status, Status::Failure);
    }

    #[test]
    fn bare_mode_follows_exit_code() {
        assert_eq!(classify(&raw(), GradeMode::Bare).status, Status::Success);

        let mut bad = raw();
        bad.exit_code = 2;
        bad.stderr = "boom\n".to_string();
        let got = classify(&bad, GradeMode::Bare);
        assert_eq!(got.status, Status::Error);
        assert_eq!(got.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn classification_is_deterministic() {
        let mut raw = raw();
        raw.markers = vec![pass(0), fail(1)];
        assert_eq!(classify(&raw, graded(2)), classify(&raw, graded(2)));
        assert_eq!(classify(&raw, GradeMode::Bare), classify(&raw, GradeMode::Bare));
    }

    #[test]
    fn truncation_markers_are_appended() {
        let mut raw = raw();
        raw.stdout = "partial".to_string();
        raw.stdout_truncated = true;
        raw.stderr_truncated = true;

        assert!(learner_stdout(&raw, GradeMode::Bare).ends_with(TRUNCATION_MARKER));
        assert!(learner_stderr(&raw).ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn graded_stdout_hides_marker_lines() {
        let mut raw = raw();
        raw.stdout = "learner print\n@@CODEGRADER@@:0:PASS\n".to_string();
        assert_eq!(learner_stdout(&raw, graded(1)), "learner print\n");
        assert_eq!(
            learner_stdout(&raw, GradeMode::Bare),
            "learner print\n@@CODEGRADER@@:0:PASS\n"
        );
    }
}
