//! Code execution and grading engine for programming exercises.
//!
//! The engine turns a canonical problem definition plus a learner's
//! submission into a runnable harness ([`translator`]), executes it in an
//! isolated short-lived process ([`executor`]), and maps the raw outcome
//! onto a four-way status taxonomy ([`classifier`]). [`engine::Engine`]
//! ties the stages together behind a bounded execution pool.

pub mod classifier;
pub mod constants;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod translator;

pub use classifier::{Classification, GradeMode, classify};
pub use domain::{
    Assertion, Difficulty, ExecutionLimits, ExecutionResult, HarnessSource, Language,
    ProblemSpec, RawResult, Status, SubmissionRequest, TestCase, TestReport, TestVisibility,
};
pub use engine::{Engine, EngineConfig};
pub use errors::{EngineError, LaunchError, TranslateError};
pub use executor::{ExecutionContext, LocalSandbox, Sandbox};
pub use translator::translate;

#[cfg(test)]
mod integration_test;
