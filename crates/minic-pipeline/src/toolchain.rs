//! Toolchain invocation.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::{trimmed_lossy, PipelineError, ToolchainResult, Workspace};

/// An external C compiler invoked as a subprocess.
///
/// The compiler is called as `<program> <flags...> <source> -o <artifact>`
/// with the workspace as its working directory.
#[derive(Debug, Clone)]
pub struct Toolchain {
    program: String,
    flags: Vec<String>,
    timeout: Duration,
}

impl Toolchain {
    /// Creates a toolchain for `program` with the given flags and build timeout.
    #[must_use]
    pub fn new(program: impl Into<String>, flags: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            flags,
            timeout,
        }
    }

    /// The compiler program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Writes `source` into the workspace and builds it.
    ///
    /// A non-zero compiler exit is returned as data. Only local faults
    /// (writing the source, launching the compiler, the build timeout) are
    /// errors; on timeout the compiler is killed.
    #[instrument(skip(self, workspace, source), fields(program = %self.program))]
    pub async fn build(
        &self,
        workspace: &Workspace,
        source: &str,
    ) -> Result<ToolchainResult, PipelineError> {
        tokio::fs::write(workspace.source_path(), source)
            .await
            .map_err(|source| PipelineError::SourceWrite {
                path: workspace.source_path().to_path_buf(),
                source,
            })?;

        // Relative names keep the temp directory out of diagnostics.
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.flags)
            .arg(workspace.source_name())
            .arg("-o")
            .arg(workspace.artifact_name())
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(flags = ?self.flags, "Invoking compiler");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                warn!(error = %source, "Failed to start compiler");
                return Err(PipelineError::ToolchainUnavailable {
                    program: self.program.clone(),
                    source,
                });
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Compiler timed out");
                return Err(PipelineError::ToolchainTimeout {
                    program: self.program.clone(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let result = ToolchainResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: trimmed_lossy(&output.stdout),
            stderr: trimmed_lossy(&output.stderr),
        };
        debug!(
            exit_code = result.exit_code,
            stderr_len = result.stderr.len(),
            "Compiler finished"
        );
        Ok(result)
    }
}
