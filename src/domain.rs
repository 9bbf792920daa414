use std::time::Duration;

use uuid::Uuid;

/// Execution languages the engine can grade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    TypeScript,
}

impl Language {
    /// Accepts the normalized names plus the `"ts"` alias used by callers.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "python" => Some(Language::Python),
            "typescript" | "ts" => Some(Language::TypeScript),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
        }
    }

    /// Name of the source file a harness (or bare script) is written as.
    pub fn source_file_name(&self) -> &'static str {
        match self {
            Language::Python => "main.py",
            Language::TypeScript => "main.ts",
        }
    }

    /// Extra file the toolchain expects next to the source, if any.
    /// tsx resolves module settings from a package.json in the run directory.
    pub fn manifest(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Language::Python => None,
            Language::TypeScript => Some((
                "package.json",
                "{\"name\":\"codegrader-harness\",\"version\":\"1.0.0\",\"type\":\"module\"}",
            )),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestVisibility {
    Public,
    Private,
}

/// One test assertion in canonical form.
///
/// `Call` is the structured shape: invoke the solution with literal
/// arguments and compare against an expected literal. `Expr` is free-form
/// assertion code, a boolean expression in canonical syntax that gets a
/// token-level rewrite per target language.
#[derive(Clone, Debug, PartialEq)]
pub enum Assertion {
    Call { args: Vec<String>, expected: String },
    Expr { code: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestCase {
    /// Setup lines emitted into the check verbatim (pass-through).
    pub setup: Vec<String>,
    pub assertion: Assertion,
    pub visibility: TestVisibility,
}

impl TestCase {
    pub fn public(assertion: Assertion) -> Self {
        TestCase {
            setup: Vec::new(),
            assertion,
            visibility: TestVisibility::Public,
        }
    }

    pub fn private(assertion: Assertion) -> Self {
        TestCase {
            setup: Vec::new(),
            assertion,
            visibility: TestVisibility::Private,
        }
    }
}

/// Wall-clock and logical memory ceilings for one execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub time: Duration,
    pub memory_bytes: u64,
}

impl ExecutionLimits {
    /// Caller-supplied overrides may only tighten the ceiling, never raise it.
    pub fn clamped_to(&self, ceiling: &ExecutionLimits) -> ExecutionLimits {
        ExecutionLimits {
            time: self.time.min(ceiling.time),
            memory_bytes: self.memory_bytes.min(ceiling.memory_bytes),
        }
    }
}

/// The canonical exercise definition. Owned and validated by content
/// management; the engine only reads it.
#[derive(Clone, Debug)]
pub struct ProblemSpec {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub categories: Vec<String>,
    pub description: String,
    /// Canonical function signature, e.g. `solve(nums: list[int], target: int) -> bool`.
    pub signature: String,
    pub tests: Vec<TestCase>,
    pub limits: ExecutionLimits,
    pub languages: Vec<Language>,
    pub hint: Option<String>,
    pub solution: Option<String>,
}

impl ProblemSpec {
    pub fn supports(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }
}

/// One submission as accepted from the calling layer.
#[derive(Clone, Debug)]
pub struct SubmissionRequest {
    pub code: String,
    pub language: Language,
    pub stdin: Option<String>,
    /// Optional override, clamped to the problem's (or engine's) ceiling.
    pub limits: Option<ExecutionLimits>,
}

/// Runnable source assembled for one execution: either a graded harness or
/// the bare submitted code.
#[derive(Clone, Debug)]
pub struct HarnessSource {
    pub file_name: &'static str,
    pub code: String,
    pub manifest: Option<(&'static str, String)>,
}

impl HarnessSource {
    /// Wraps submitted code unchanged, for ungraded runs.
    pub fn bare(language: Language, code: &str) -> Self {
        HarnessSource {
            file_name: language.source_file_name(),
            code: code.to_string(),
            manifest: language
                .manifest()
                .map(|(name, body)| (name, body.to_string())),
        }
    }
}

/// One PASS/FAIL token parsed from the harness epilogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestMarker {
    pub index: usize,
    pub passed: bool,
}

/// Raw outcome of exactly one sandboxed execution. Immutable; consumed
/// only by the classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub wall_time: Duration,
    pub timed_out: bool,
    pub killed_for_memory: bool,
    pub markers: Vec<TestMarker>,
}

/// Public status taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
    Error,
    Timeout,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Failure => "failure",
            Status::Error => "error",
            Status::Timeout => "timeout",
        }
    }
}

/// Per-test entry of the graded breakdown. `detail` carries the rendered
/// assertion for public tests and is withheld for private ones.
#[derive(Clone, Debug, PartialEq)]
pub struct TestReport {
    pub index: usize,
    pub passed: bool,
    pub detail: Option<String>,
}

/// The engine's sole externally visible artifact. Persisting it (history,
/// drafts) is the caller's concern.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub id: Uuid,
    pub status: Status,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub execution_time: Duration,
    pub error_message: Option<String>,
    pub per_test: Option<Vec<TestReport>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Lifecycle of one submission inside the engine. All paths terminate;
/// retries are a caller concern.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionState {
    Queued,
    Translating,
    Executing,
    Classifying,
    Completed(Status),
    Failed { msg: String },
    Rejected,
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub language: Language,
    pub state: SubmissionState,
}

impl Submission {
    pub fn new(language: Language) -> Self {
        Submission {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            language,
            state: SubmissionState::Queued,
        }
    }

    pub fn change_state(&self, new_state: SubmissionState) -> Self {
        Self {
            state: new_state,
            ..self.clone()
        }
    }
}
