//! Verdict classification.
//!
//! Turns the captured toolchain and program results into a [`Verdict`].
//!
//! The `semantic` category rests on a text heuristic: toolchain severity
//! levels do not separate "valid but suspicious" code from plain warnings
//! (a format-string mismatch is only a warning in gcc), so any diagnostic
//! containing one of the configured substrings is treated as a semantic
//! finding. Matching is case-insensitive and literal. Results depend on
//! the toolchain's version and locale.

use regex::{Regex, RegexBuilder};

use crate::{ExecutionResult, PipelineError, Status, ToolchainResult, Verdict};

/// Substrings that mark a successful build's diagnostics as semantic.
pub const DEFAULT_WARNING_PATTERNS: &[&str] = &["format", "expects", "warning:"];

/// Compiler message for builds without a semantic finding.
pub const COMPILATION_SUCCESSFUL: &str = "Compilation successful";

const COMPILATION_FAILED: &str = "Compilation failed";
const NOT_EXECUTED: &str = "Program was not executed";

/// Maps toolchain and execution results onto a [`Verdict`].
#[derive(Debug, Clone)]
pub struct Classifier {
    /// `None` when no patterns were configured.
    warnings: Option<Regex>,
}

impl Default for Classifier {
    fn default() -> Self {
        let warnings = RegexBuilder::new(&alternation(DEFAULT_WARNING_PATTERNS))
            .case_insensitive(true)
            .build()
            .ok();
        Self { warnings }
    }
}

impl Classifier {
    /// Creates a classifier matching the given literal substrings.
    ///
    /// Blank patterns are ignored. With no usable pattern, no build is
    /// ever classified as semantic.
    pub fn new<I, S>(patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<S> = patterns
            .into_iter()
            .filter(|p| !p.as_ref().trim().is_empty())
            .collect();
        if patterns.is_empty() {
            return Ok(Self { warnings: None });
        }

        let warnings = RegexBuilder::new(&alternation(&patterns))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            warnings: Some(warnings),
        })
    }

    /// Returns the diagnostic text if it counts as a semantic warning.
    #[must_use]
    pub fn semantic_warning<'a>(&self, stderr: &'a str) -> Option<&'a str> {
        if stderr.is_empty() {
            return None;
        }
        self.warnings
            .as_ref()
            .filter(|re| re.is_match(stderr))
            .map(|_| stderr)
    }

    /// Classifies one compile-and-run cycle.
    ///
    /// `execution` is `None` when the program was not run, which is only
    /// expected after a failed build.
    #[must_use]
    pub fn classify(
        &self,
        toolchain: &ToolchainResult,
        execution: Option<&ExecutionResult>,
    ) -> Verdict {
        if !toolchain.succeeded() {
            let message = [&toolchain.stderr, &toolchain.stdout]
                .into_iter()
                .find(|s| !s.is_empty())
                .map_or(COMPILATION_FAILED, String::as_str);
            return Verdict::new(Status::Syntax, message, "");
        }

        let warning = self.semantic_warning(&toolchain.stderr);
        let compiler_message = warning.unwrap_or(COMPILATION_SUCCESSFUL);

        let Some(execution) = execution else {
            return Verdict::new(Status::Runtime, compiler_message, NOT_EXECUTED);
        };

        if execution.failed() {
            return Verdict::new(Status::Runtime, compiler_message, combined_output(execution));
        }

        let status = if warning.is_some() {
            Status::Semantic
        } else {
            Status::Success
        };
        Verdict::new(status, compiler_message, execution.stdout.as_str())
    }
}

/// Joins escaped patterns into a single alternation.
fn alternation<S: AsRef<str>>(patterns: &[S]) -> String {
    patterns
        .iter()
        .map(|p| regex::escape(p.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Program stdout, followed by stderr on its own line when present.
fn combined_output(execution: &ExecutionResult) -> String {
    match (execution.stdout.is_empty(), execution.stderr.is_empty()) {
        (_, true) => execution.stdout.clone(),
        (true, false) => execution.stderr.clone(),
        (false, false) => format!("{}\n{}", execution.stdout, execution.stderr),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::TIMEOUT_MESSAGE;

    fn built(stderr: &str) -> ToolchainResult {
        ToolchainResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn ran(exit_code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_failed_build_is_syntax_with_stderr() {
        let toolchain = ToolchainResult {
            exit_code: 1,
            stdout: "ignored".to_string(),
            stderr: "main.c:1:27: error: expected ';' before '}' token".to_string(),
        };

        let verdict = Classifier::default().classify(&toolchain, None);

        assert_eq!(verdict.status(), Status::Syntax);
        assert!(verdict.compiler_message().contains("expected ';'"));
        assert!(verdict.program_output().is_empty());
    }

    #[test]
    fn test_failed_build_falls_back_to_stdout_then_generic_message() {
        let classifier = Classifier::default();

        let stdout_only = ToolchainResult {
            exit_code: 1,
            stdout: "ld: cannot find -lfoo".to_string(),
            stderr: String::new(),
        };
        assert_eq!(
            classifier.classify(&stdout_only, None).compiler_message(),
            "ld: cannot find -lfoo"
        );

        let silent = ToolchainResult {
            exit_code: 4,
            ..Default::default()
        };
        assert_eq!(
            classifier.classify(&silent, None).compiler_message(),
            COMPILATION_FAILED
        );
    }

    #[test]
    fn test_failed_build_ignores_execution_result() {
        let toolchain = ToolchainResult {
            exit_code: 1,
            stderr: "error".to_string(),
            ..Default::default()
        };
        let execution = ran(0, "should not appear", "");

        let verdict = Classifier::default().classify(&toolchain, Some(&execution));

        assert_eq!(verdict.status(), Status::Syntax);
        assert!(verdict.program_output().is_empty());
    }

    #[test]
    fn test_clean_build_and_run_is_success() {
        let verdict = Classifier::default().classify(&built(""), Some(&ran(0, "hi", "")));

        assert_eq!(verdict.status(), Status::Success);
        assert_eq!(verdict.compiler_message(), COMPILATION_SUCCESSFUL);
        assert_eq!(verdict.program_output(), "hi");
    }

    #[test]
    fn test_format_warning_with_clean_run_is_semantic() {
        let warning = "main.c:3:12: warning: format '%d' expects argument of type 'int'";

        let verdict = Classifier::default().classify(&built(warning), Some(&ran(0, "42", "")));

        assert_eq!(verdict.status(), Status::Semantic);
        assert_eq!(verdict.compiler_message(), warning);
        assert_eq!(verdict.program_output(), "42");
    }

    #[test]
    fn test_warning_match_is_case_insensitive() {
        let classifier = Classifier::default();
        assert!(classifier.semantic_warning("main.c: WARNING: unused").is_some());
        assert!(classifier.semantic_warning("Format mismatch").is_some());
        assert!(classifier.semantic_warning("note: declared here").is_none());
        assert!(classifier.semantic_warning("").is_none());
    }

    #[test]
    fn test_unmatched_diagnostic_is_not_semantic() {
        let verdict =
            Classifier::default().classify(&built("note: some remark"), Some(&ran(0, "", "")));

        assert_eq!(verdict.status(), Status::Success);
        assert_eq!(verdict.compiler_message(), COMPILATION_SUCCESSFUL);
    }

    #[test]
    fn test_nonzero_exit_is_runtime_with_combined_output() {
        let verdict = Classifier::default()
            .classify(&built(""), Some(&ran(134, "before crash", "Aborted")));

        assert_eq!(verdict.status(), Status::Runtime);
        assert_eq!(verdict.program_output(), "before crash\nAborted");
    }

    #[test]
    fn test_runtime_output_without_stdout_is_just_stderr() {
        let verdict =
            Classifier::default().classify(&built(""), Some(&ran(1, "", "segfault")));
        assert_eq!(verdict.program_output(), "segfault");
    }

    #[test]
    fn test_runtime_takes_precedence_over_semantic_warning() {
        let warning = "warning: format '%s' expects a matching 'char *' argument";

        let verdict = Classifier::default().classify(&built(warning), Some(&ran(1, "", "")));

        assert_eq!(verdict.status(), Status::Runtime);
        assert_eq!(verdict.compiler_message(), warning);
    }

    #[test]
    fn test_timeout_is_runtime_with_timeout_message() {
        let verdict =
            Classifier::default().classify(&built(""), Some(&ExecutionResult::timeout()));

        assert_eq!(verdict.status(), Status::Runtime);
        assert_eq!(verdict.program_output(), TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_missing_execution_after_clean_build_is_runtime() {
        let verdict = Classifier::default().classify(&built(""), None);

        assert_eq!(verdict.status(), Status::Runtime);
        assert_eq!(verdict.program_output(), NOT_EXECUTED);
    }

    #[test]
    fn test_custom_patterns_replace_defaults() {
        let classifier = Classifier::new(["implicit declaration"]).unwrap();

        let implicit = built("warning: implicit declaration of function 'foo'");
        let format = built("warning: format '%d' expects argument");

        assert_eq!(
            classifier.classify(&implicit, Some(&ran(0, "", ""))).status(),
            Status::Semantic
        );
        assert_eq!(
            classifier.classify(&format, Some(&ran(0, "", ""))).status(),
            Status::Success
        );
    }

    #[test]
    fn test_patterns_are_literal_not_regex() {
        let classifier = Classifier::new(["a.c"]).unwrap();
        assert!(classifier.semantic_warning("in a.c here").is_some());
        assert!(classifier.semantic_warning("in abc here").is_none());
    }

    #[test]
    fn test_no_patterns_never_semantic() {
        let classifier = Classifier::new(Vec::<String>::new()).unwrap();
        assert!(classifier.semantic_warning("warning: anything").is_none());

        let blank = Classifier::new(["  ", ""]).unwrap();
        assert!(blank.semantic_warning("warning: anything").is_none());
    }
}
