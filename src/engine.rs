use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::classifier::{GradeMode, classify, learner_stderr, learner_stdout};
use crate::constants::{
    DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIME_LIMIT, SLOT_ACQUIRE_ERR,
};
use crate::domain::{
    ExecutionLimits, ExecutionResult, HarnessSource, ProblemSpec, RawResult, Submission,
    SubmissionRequest, SubmissionState, TestReport, TestVisibility,
};
use crate::errors::EngineError;
use crate::executor::Sandbox;
use crate::translator::{describe_assertion, signature::parse_signature, translate};

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Concurrent execution slots; one submission occupies one slot for its
    /// whole translate+execute+classify lifetime.
    pub pool_size: usize,
    /// Submissions allowed to wait for a slot before new arrivals are
    /// rejected as busy.
    pub queue_depth: usize,
    /// Applied to bare runs that carry no override.
    pub default_limits: ExecutionLimits,
    /// Hard ceiling for bare-run overrides (graded runs are ceilinged by
    /// their problem spec instead).
    pub limit_ceiling: ExecutionLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pool_size: 4,
            queue_depth: 8,
            default_limits: ExecutionLimits {
                time: DEFAULT_TIME_LIMIT,
                memory_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            },
            limit_ceiling: ExecutionLimits {
                time: Duration::from_secs(10),
                memory_bytes: 512 * 1024 * 1024,
            },
        }
    }
}

/// Composes translator, sandbox and classifier into the two public
/// operations. Capacity is an owned resource: an admission semaphore of
/// `pool_size + queue_depth` permits rejects overflow immediately, an
/// execution semaphore of `pool_size` permits serializes actual runs in
/// FIFO order. Nothing is shared across slots beyond these counters and the
/// in-flight registry.
#[derive(Clone)]
pub struct Engine {
    sandbox: Arc<dyn Sandbox>,
    admission: Arc<Semaphore>,
    slots: Arc<Semaphore>,
    in_flight: Arc<DashMap<Uuid, SubmissionState>>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: EngineConfig) -> Self {
        Engine {
            sandbox,
            admission: Arc::new(Semaphore::new(config.pool_size + config.queue_depth)),
            slots: Arc::new(Semaphore::new(config.pool_size)),
            in_flight: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Snapshot of submissions currently inside the engine, for operators.
    pub fn in_flight(&self) -> Vec<(Uuid, SubmissionState)> {
        self.in_flight
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Executes submitted code directly, no grading.
    #[tracing::instrument(skip(self, request), fields(language = %request.language))]
    pub async fn run_bare(
        &self,
        request: SubmissionRequest,
    ) -> Result<ExecutionResult, EngineError> {
        let (_admission, submission) = self.admit(&request)?;
        let _slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect(SLOT_ACQUIRE_ERR);

        let limits = request
            .limits
            .map(|l| l.clamped_to(&self.config.limit_ceiling))
            .unwrap_or(self.config.default_limits);

        let submission = self.advance(&submission, SubmissionState::Executing);
        let source = HarnessSource::bare(request.language, &request.code);
        let raw = match self
            .sandbox
            .execute(&source, &request.language, request.stdin.as_deref(), &limits)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(&submission, e)),
        };

        let submission = self.advance(&submission, SubmissionState::Classifying);
        Ok(self.finalize(&submission, &raw, GradeMode::Bare, None))
    }

    /// Translates, executes and classifies a submission against a problem.
    /// Private-test assertion text is withheld from the breakdown.
    #[tracing::instrument(
        skip(self, spec, request),
        fields(problem = %spec.id, language = %request.language)
    )]
    pub async fn run_graded(
        &self,
        spec: &ProblemSpec,
        request: SubmissionRequest,
    ) -> Result<ExecutionResult, EngineError> {
        let (_admission, submission) = self.admit(&request)?;
        let _slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect(SLOT_ACQUIRE_ERR);

        let submission = self.advance(&submission, SubmissionState::Translating);
        let harness = match translate(spec, request.language, &request.code) {
            Ok(harness) => harness,
            Err(e) => {
                // Content defect, not a learner mistake: the problem itself
                // cannot be graded in this language until an operator fixes it.
                tracing::error!(problem = %spec.id, error = %e, "translation failed");
                let failed = self.advance(
                    &submission,
                    SubmissionState::Failed { msg: e.to_string() },
                );
                self.finish(&failed);
                return Err(e.into());
            }
        };

        let limits = request
            .limits
            .map(|l| l.clamped_to(&spec.limits))
            .unwrap_or(spec.limits);

        let submission = self.advance(&submission, SubmissionState::Executing);
        let raw = match self
            .sandbox
            .execute(&harness, &request.language, request.stdin.as_deref(), &limits)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(&submission, e)),
        };

        let submission = self.advance(&submission, SubmissionState::Classifying);
        let per_test = per_test_reports(spec, &raw);
        let mode = GradeMode::Graded {
            expected_tests: spec.tests.len(),
        };
        Ok(self.finalize(&submission, &raw, mode, Some(per_test)))
    }

    /// Admission gate. A rejected arrival goes `Queued -> Rejected` and
    /// terminates right here as `Busy`; it is deliberately never entered
    /// into the in-flight registry, which tracks admitted work only.
    fn admit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<(tokio::sync::OwnedSemaphorePermit, Submission), EngineError> {
        let permit = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let rejected =
                    Submission::new(request.language).change_state(SubmissionState::Rejected);
                tracing::warn!(
                    id = %rejected.id,
                    language = %rejected.language,
                    "pool and queue saturated, rejecting submission"
                );
                return Err(EngineError::Busy);
            }
        };
        let submission = Submission::new(request.language);
        self.in_flight
            .insert(submission.id, submission.state.clone());
        Ok((permit, submission))
    }

    fn advance(&self, submission: &Submission, state: SubmissionState) -> Submission {
        let next = submission.change_state(state);
        self.in_flight.insert(next.id, next.state.clone());
        next
    }

    fn finish(&self, submission: &Submission) {
        self.in_flight.remove(&submission.id);
    }

    fn fail(&self, submission: &Submission, e: crate::errors::LaunchError) -> EngineError {
        tracing::error!(error = %e, "sandbox launch failed");
        let failed = self.advance(
            submission,
            SubmissionState::Failed { msg: e.to_string() },
        );
        self.finish(&failed);
        e.into()
    }

    fn finalize(
        &self,
        submission: &Submission,
        raw: &RawResult,
        mode: GradeMode,
        per_test: Option<Vec<TestReport>>,
    ) -> ExecutionResult {
        let classification = classify(raw, mode);
        let result = ExecutionResult {
            id: submission.id,
            status: classification.status,
            exit_code: (!raw.timed_out && !raw.killed_for_memory).then_some(raw.exit_code),
            stdout: learner_stdout(raw, mode),
            stderr: learner_stderr(raw),
            execution_time: raw.wall_time,
            error_message: classification.error_message,
            per_test,
            created_at: submission.created_at,
        };
        let done = self.advance(submission, SubmissionState::Completed(result.status));
        self.finish(&done);
        tracing::info!(
            id = %result.id,
            status = result.status.as_str(),
            time_ms = result.execution_time.as_millis() as u64,
            "submission completed"
        );
        result
    }
}

fn per_test_reports(spec: &ProblemSpec, raw: &RawResult) -> Vec<TestReport> {
    // Translation already succeeded, so the signature parses.
    let canonical = parse_signature(&spec.signature)
        .map(|sig| sig.name)
        .unwrap_or_default();
    raw.markers
        .iter()
        .map(|marker| TestReport {
            index: marker.index,
            passed: marker.passed,
            detail: spec.tests.get(marker.index).and_then(|test| {
                match test.visibility {
                    TestVisibility::Public => {
                        Some(describe_assertion(&canonical, &test.assertion))
                    }
                    TestVisibility::Private => None,
                }
            }),
        })
        .collect()
}
