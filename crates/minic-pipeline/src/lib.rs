//! Mini C Compile Pipeline
//!
//! Builds submitted C source with the system toolchain, runs the produced
//! program under a wall-clock limit, and classifies the outcome.
//!
//! The pipeline performs no analysis of its own. A [`Verdict`] is derived
//! from the toolchain's exit status and diagnostic text and from the
//! program's exit status:
//!
//! - `syntax` - the toolchain exited non-zero
//! - `runtime` - the program exited non-zero or exceeded the run timeout
//! - `semantic` - the program succeeded but the build printed a diagnostic
//!   matching the warning heuristic
//! - `success` - everything else
//!
//! # Example
//!
//! ```no_run
//! use minic_pipeline::{Pipeline, PipelineConfig};
//!
//! # async fn example() -> Result<(), minic_pipeline::PipelineError> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let verdict = pipeline.compile_and_run("int main(){return 0;}").await?;
//! println!("{}: {}", verdict.status(), verdict.compiler_message());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod classifier;
mod pipeline;
mod runner;
mod toolchain;
mod workspace;

pub use classifier::{Classifier, COMPILATION_SUCCESSFUL, DEFAULT_WARNING_PATTERNS};
pub use pipeline::{Pipeline, PipelineConfig};
pub use runner::{ProcessRunner, DEFAULT_OUTPUT_LIMIT, TIMEOUT_MESSAGE, TRUNCATION_MARKER};
pub use toolchain::Toolchain;
pub use workspace::Workspace;

/// Message reported when the submitted source is empty or whitespace-only.
pub const EMPTY_SOURCE_MESSAGE: &str = "Error: Empty source code";

/// Errors that abort a pipeline call instead of producing a [`Verdict`].
///
/// A failing build or a crashing program is not an error: both are
/// reported through the verdict.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Failed to create the scoped temporary workspace.
    #[error("failed to create temporary workspace: {0}")]
    WorkspaceCreate(#[source] std::io::Error),

    /// Failed to write the submitted source into the workspace.
    #[error("failed to write source file '{path}': {source}")]
    SourceWrite {
        /// Path the source was being written to.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The compiler process could not be started.
    #[error("compiler '{program}' could not be started: {source}")]
    ToolchainUnavailable {
        /// Compiler program that failed to launch.
        program: String,
        /// Underlying launch failure.
        #[source]
        source: std::io::Error,
    },

    /// The compiler did not finish within the build timeout.
    #[error("compiler '{program}' did not finish within {timeout_secs}s")]
    ToolchainTimeout {
        /// Compiler program that was killed.
        program: String,
        /// The build timeout in seconds.
        timeout_secs: u64,
    },

    /// The warning patterns could not be compiled into a matcher.
    #[error("invalid warning pattern: {0}")]
    InvalidWarningPattern(#[from] regex::Error),
}

/// Classification of one compile-and-run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Built cleanly and ran to a zero exit code.
    Success,
    /// The toolchain rejected the source.
    Syntax,
    /// Built with a suspicious diagnostic and ran to a zero exit code.
    Semantic,
    /// Built, but the program failed or timed out.
    Runtime,
    /// No classification was possible (empty input or a local fault).
    Error,
}

impl Status {
    /// Returns `true` for [`Status::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Syntax => "syntax",
            Self::Semantic => "semantic",
            Self::Runtime => "runtime",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured result of one toolchain invocation.
///
/// Both streams are trimmed of surrounding whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainResult {
    /// Exit code of the compiler (`-1` if it was killed by a signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolchainResult {
    /// Returns whether the toolchain produced an artifact.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Captured result of running a built program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code of the program; non-zero when it was killed or never started.
    pub exit_code: i32,
    /// Captured standard output, trimmed.
    pub stdout: String,
    /// Captured standard error, trimmed.
    pub stderr: String,
    /// Whether the program was killed for exceeding the run timeout.
    pub timed_out: bool,
    /// Whether either stream hit the output limit and was cut short.
    pub truncated: bool,
}

impl ExecutionResult {
    /// Result for a program killed at the run timeout.
    #[must_use]
    pub fn timeout() -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: TIMEOUT_MESSAGE.to_string(),
            timed_out: true,
            truncated: false,
        }
    }

    /// Result for a program that could not be started at all.
    #[must_use]
    pub fn launch_failure(error: &std::io::Error) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("Runtime error: {error}"),
            timed_out: false,
            truncated: false,
        }
    }

    /// Returns whether the run counts as a runtime failure.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.timed_out || self.exit_code != 0
    }
}

/// The structured outcome of one pipeline call.
///
/// Verdicts are produced by the [`Classifier`] (or [`Verdict::empty_input`])
/// and are immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    status: Status,
    compiler_message: String,
    program_output: String,
}

impl Verdict {
    pub(crate) fn new(
        status: Status,
        compiler_message: impl Into<String>,
        program_output: impl Into<String>,
    ) -> Self {
        Self {
            status,
            compiler_message: compiler_message.into(),
            program_output: program_output.into(),
        }
    }

    /// The verdict for empty or whitespace-only source.
    #[must_use]
    pub fn empty_input() -> Self {
        Self::new(Status::Error, EMPTY_SOURCE_MESSAGE, "")
    }

    /// The classification.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Toolchain diagnostics, or a fixed message when there is nothing to show.
    #[must_use]
    pub fn compiler_message(&self) -> &str {
        &self.compiler_message
    }

    /// What the program printed (empty when it was never run).
    #[must_use]
    pub fn program_output(&self) -> &str {
        &self.program_output
    }
}

/// Decodes captured process output and trims surrounding whitespace.
pub(crate) fn trimmed_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
