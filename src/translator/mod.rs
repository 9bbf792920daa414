pub mod harness;
pub mod literals;
pub mod signature;
pub mod types;

pub use harness::describe_assertion;
pub use signature::{FunctionSig, render_signature};
pub use types::CanonType;

use crate::domain::{HarnessSource, Language, ProblemSpec};
use crate::errors::TranslateError;

/// Builds a self-contained runnable harness from a problem definition and
/// the learner's submitted code.
///
/// Failures here are content defects (the problem is broken for this
/// language), not learner mistakes; the orchestrator surfaces them as
/// `EngineError::Translation` rather than a graded result.
#[tracing::instrument(skip(spec, submitted_code), fields(problem = %spec.id, %language))]
pub fn translate(
    spec: &ProblemSpec,
    language: Language,
    submitted_code: &str,
) -> Result<HarnessSource, TranslateError> {
    if !spec.supports(language) {
        return Err(TranslateError::LanguageNotSupported { language });
    }

    let sig = signature::parse_signature(&spec.signature)?;
    let bound_name = harness::find_binding(submitted_code, language, &sig.name)?;
    tracing::debug!(function = %sig.name, bound = %bound_name, "rebinding solution alias");

    let code = harness::emit(language, submitted_code, &bound_name, &spec.tests, &sig.name)?;
    Ok(HarnessSource {
        file_name: language.source_file_name(),
        code,
        manifest: language
            .manifest()
            .map(|(name, body)| (name, body.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Assertion, Difficulty, ExecutionLimits, TestCase};
    use std::time::Duration;

    fn two_sum_spec() -> ProblemSpec {
        ProblemSpec {
            id: "ct-001".to_string(),
            title: "Two Sum Exists".to_string(),
            difficulty: Difficulty::Easy,
            categories: vec!["array".to_string(), "hash".to_string()],
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
                memory_bytes: 128 * 1024 * 1024,
            },
            languages: vec![Language::Python, Language::TypeScript],
            hint: None,
            solution: None,
        }
    }

    #[test]
    fn translates_python_submission() {
        let spec = two_sum_spec();
        let code = "def solve(nums, target):\n    return any(target - n in nums for n in nums)\n";
        let harness = translate(&spec, Language::Python, code).unwrap();

        assert_eq!(harness.file_name, "main.py");
        assert!(harness.manifest.is_none());
        assert!(harness.code.starts_with(code));
        assert!(harness.code.contains("__solution = solve"));
        assert!(harness.code.contains("__solution([1, 2, 3], 100) == False"));
    }

    #[test]
    fn translates_typescript_submission_with_literal_mapping() {
        let spec = two_sum_spec();
        let code = "export function solve(nums: number[], target: number): boolean {\n    return nums.some(n => nums.includes(target - n));\n}\n";
        let harness = translate(&spec, Language::TypeScript, code).unwrap();

        assert_eq!(harness.file_name, "main.ts");
        let (manifest_name, manifest_body) = harness.manifest.unwrap();
        assert_eq!(manifest_name, "package.json");
        assert!(manifest_body.contains("\"type\":\"module\""));
        assert!(harness.code.contains("__structEq(__solution([2, 7, 11, 15], 9), true)"));
        assert!(harness.code.contains("__structEq(__solution([1, 2, 3], 100), false)"));
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let mut spec = two_sum_spec();
        spec.languages = vec![Language::Python];
        let err = translate(&spec, Language::TypeScript, "const solve = () => true;")
            .unwrap_err();
        assert_eq!(
            err,
            TranslateError::LanguageNotSupported {
                language: Language::TypeScript
            }
        );
    }

    #[test]
    fn broken_signature_is_rejected_before_looking_at_code() {
        let mut spec = two_sum_spec();
        spec.signature = "solve(nums: list[int], target: int -> bool".to_string();
        let err = translate(&spec, Language::Python, "def solve(nums, target):\n    pass\n")
            .unwrap_err();
        assert!(matches!(err, TranslateError::MalformedSignature { .. }));
    }

    #[test]
    fn missing_declaration_is_signature_not_found() {
        let spec = two_sum_spec();
        let err = translate(&spec, Language::Python, "answer = 42\nprint(answer)\n").unwrap_err();
        assert_eq!(
            err,
            TranslateError::SignatureNotFound {
                name: "solve".to_string()
            }
        );
    }
}
