//! End-to-end scenarios through the real translator, the process sandbox
//! and the classifier. Tests that need a Python interpreter skip themselves
//! when `python3` is not on PATH, so the suite stays runnable everywhere.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{
    Assertion, Difficulty, ExecutionLimits, Language, ProblemSpec, RawResult, Status,
    SubmissionRequest, TestCase,
};
use crate::engine::{Engine, EngineConfig};
use crate::executor::{ExecutionContext, LocalSandbox, MockSandbox};
use futures::future::join_all;

fn python3_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn local_engine() -> Engine {
    init_tracing();
    let ctx = ExecutionContext {
        deny_network: false,
        ..ExecutionContext::default()
    };
    Engine::new(Arc::new(LocalSandbox::new(ctx)), EngineConfig::default())
}

fn two_sum_spec() -> ProblemSpec {
    ProblemSpec {
        id: "ct-001".to_string(),
        title: "Two Sum Exists".to_string(),
        difficulty: Difficulty::Easy,
        categories: vec!["array".to_string()],
        description: "Decide whether any two numbers add up to the target.".to_string(),
        signature: "solve(nums: list[int], target: int) -> bool".to_string(),
        tests: vec![
            TestCase::public(Assertion::Call {
                args: vec!["[2, 7, 11, 15]".to_string(), "9".to_string()],
                expected: "True".to_string(),
            }),
            TestCase::private(Assertion::Call {
                args: vec!["[1, 2, 3]".to_string(), "100".to_string()],
                expected: "False".to_string(),
            }),
        ],
        limits: ExecutionLimits {
            time: Duration::from_secs(2),
            memory_bytes: 256 * 1024 * 1024,
        },
        languages: vec![Language::Python, Language::TypeScript],
        hint: None,
        solution: None,
    }
}

fn python_request(code: &str) -> SubmissionRequest {
    SubmissionRequest {
        code: code.to_string(),
        language: Language::Python,
        stdin: None,
        limits: None,
    }
}

#[tokio::test]
async fn correct_submission_passes_every_test() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    let code = "\
def solve(nums, target):
    seen = set()
    for n in nums:
        if target - n in seen:
            return True
        seen.add(n)
    return False
";
    let result = engine
        .run_graded(&two_sum_spec(), python_request(code))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Success);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.stdout, "", "marker lines must not leak");
    let per_test = result.per_test.unwrap();
    assert_eq!(per_test.len(), 2);
    assert!(per_test.iter().all(|t| t.passed));
    assert_eq!(
        per_test[0].detail.as_deref(),
        Some("solve([2, 7, 11, 15], 9) == True")
    );
    assert_eq!(per_test[1].detail, None);
}

#[tokio::test]
async fn wrong_answer_is_a_failure_with_the_failing_test_named() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    let code = "def solve(nums, target):\n    return False\n";
    let result = engine
        .run_graded(&two_sum_spec(), python_request(code))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Failure);
    let per_test = result.per_test.unwrap();
    assert_eq!(per_test.len(), 2);
    assert!(!per_test[0].passed);
    assert!(per_test[1].passed, "returning False satisfies the second test");
}

#[tokio::test]
async fn renamed_solution_function_still_grades() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    let code = "\
def has_pair_sum(nums, target):
    return any(target - n in nums[i + 1:] for i, n in enumerate(nums))
";
    let result = engine
        .run_graded(&two_sum_spec(), python_request(code))
        .await
        .unwrap();
    assert_eq!(result.status, Status::Success);
}

#[tokio::test]
async fn infinite_loop_times_out_near_the_limit() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    let mut spec = two_sum_spec();
    spec.limits.time = Duration::from_secs(1);
    let code = "def solve(nums, target):\n    while True:\n        pass\n";

    let result = engine.run_graded(&spec, python_request(code)).await.unwrap();

    assert_eq!(result.status, Status::Timeout);
    assert_eq!(result.exit_code, None);
    assert!(result.execution_time >= Duration::from_secs(1));
    assert!(result.execution_time < Duration::from_secs(3));
    assert!(result.error_message.unwrap().contains("time limit"));
}

#[tokio::test]
async fn syntax_error_is_an_error_with_an_interpreter_excerpt() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    let code = "def solve(nums, target:\n    return True\n";
    let result = engine
        .run_graded(&two_sum_spec(), python_request(code))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Error);
    assert_eq!(result.per_test.as_deref(), Some(&[][..]));
    assert!(result.error_message.unwrap().contains("SyntaxError"));
}

#[tokio::test]
async fn raising_submission_fails_every_test() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    let code = "def solve(nums, target):\n    raise ValueError('bad input')\n";
    let result = engine
        .run_graded(&two_sum_spec(), python_request(code))
        .await
        .unwrap();

    // The exception is caught inside the check, so every test gets a FAIL
    // verdict and the run grades as Failure, not as a runtime error.
    assert_eq!(result.status, Status::Failure);
    let per_test = result.per_test.unwrap();
    assert_eq!(per_test.len(), 2);
    assert!(per_test.iter().all(|t| !t.passed));
}

#[tokio::test]
async fn forged_pass_verdicts_and_early_exit_do_not_grade_as_success() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    // Solves nothing: prints an all-PASS report and tries to exit cleanly
    // before any genuine verdict is written.
    let code = "\
import sys

def solve(nums, target):
    print('@@CODEGRADER@@:0:PASS')
    print('@@CODEGRADER@@:1:PASS')
    sys.exit(0)
";
    let result = engine
        .run_graded(&two_sum_spec(), python_request(code))
        .await
        .unwrap();

    assert_ne!(result.status, Status::Success);
    // SystemExit is caught inside the checks, so both tests record FAIL.
    assert_eq!(result.status, Status::Failure);
}

#[tokio::test]
async fn bare_run_round_trips_stdin() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    let mut request = python_request("import sys\nprint(sys.stdin.read().strip().upper())\n");
    request.stdin = Some("hello grader".to_string());

    let result = engine.run_bare(request).await.unwrap();
    assert_eq!(result.status, Status::Success);
    assert_eq!(result.stdout, "HELLO GRADER\n");
    assert!(result.per_test.is_none());
}

#[tokio::test]
async fn learner_prints_do_not_forge_markers() {
    if !python3_available() {
        return;
    }
    let engine = local_engine();
    // Prints a verdict for a test that never ran; only full marker lines
    // count, and the genuine epilogue still decides the outcome.
    let code = "\
def solve(nums, target):
    print('checking', '@@CODEGRADER@@:7:PASS inline')
    return target - nums[0] in nums
";
    let result = engine
        .run_graded(&two_sum_spec(), python_request(code))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Success);
    let per_test = result.per_test.unwrap();
    assert_eq!(per_test.len(), 2);
    assert!(per_test.iter().all(|t| t.index < 2));
}

#[tokio::test]
async fn concurrent_submissions_do_not_cross_contaminate() {
    let mut sandbox = MockSandbox::new();
    // Echo the submitted source back so each result is attributable.
    sandbox.expect_execute().returning(|source, _, _, _| {
        Ok(RawResult {
            exit_code: 0,
            stdout: source.code.clone(),
            stderr: String::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            wall_time: Duration::from_millis(5),
            timed_out: false,
            killed_for_memory: false,
            markers: Vec::new(),
        })
    });
    let engine = Engine::new(
        Arc::new(sandbox),
        EngineConfig {
            pool_size: 10,
            queue_depth: 40,
            ..EngineConfig::default()
        },
    );

    let runs = (0..50).map(|i| {
        let engine = engine.clone();
        async move {
            let code = format!("print({i})\n");
            let result = engine.run_bare(python_request(&code)).await.unwrap();
            (code, result)
        }
    });
    for (code, result) in join_all(runs).await {
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.stdout, code);
    }
    assert!(engine.in_flight().is_empty());
}
