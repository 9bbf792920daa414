use crate::domain::Language;

/// Content-level defects: the problem definition cannot be turned into a
/// runnable harness for the requested language. These are operator
/// incidents, never learner mistakes, and are surfaced separately from
/// grading outcomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("malformed canonical signature: {reason}")]
    MalformedSignature { reason: String },

    #[error("malformed assertion in test {index}: {reason}")]
    MalformedAssertion { index: usize, reason: String },

    #[error("no function declaration matching `{name}` found in submitted code")]
    SignatureNotFound { name: String },

    #[error("problem does not support language `{language}`")]
    LanguageNotSupported { language: Language },
}

/// Sandbox infrastructure failures. The submission never started (or could
/// not be supervised), so no grading outcome exists. Fatal from the
/// learner's point of view; should alert operators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to prepare run directory: {msg}")]
    Workspace { msg: String },

    #[error("failed to spawn sandboxed process: {msg}")]
    Spawn { msg: String },

    #[error("failed while supervising sandboxed process: {msg}")]
    Wait { msg: String },
}

/// Errors returned by the engine's public operations. Timeouts, runtime
/// faults and memory kills are *not* errors here: they are normal grading
/// outcomes carried in [`crate::domain::ExecutionResult`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Pool and queue are saturated; the caller should retry with backoff.
    #[error("system busy, retry later")]
    Busy,

    #[error(transparent)]
    Translation(#[from] TranslateError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}
