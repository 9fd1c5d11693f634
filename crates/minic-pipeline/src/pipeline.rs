//! The compile-and-classify facade.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::{
    Classifier, PipelineError, ProcessRunner, Toolchain, Verdict, Workspace,
    DEFAULT_OUTPUT_LIMIT, DEFAULT_WARNING_PATTERNS,
};

/// Settings for a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Compiler program, resolved through `PATH`.
    pub compiler: String,
    /// Flags passed before the source file.
    pub compiler_flags: Vec<String>,
    /// Upper bound on a single build.
    pub build_timeout: Duration,
    /// Upper bound on a single program run.
    pub run_timeout: Duration,
    /// Literal substrings marking a diagnostic as semantic.
    pub warning_patterns: Vec<String>,
    /// Bytes kept from each of the program's output streams.
    pub output_limit: usize,
    /// Parent directory for workspaces (system temp dir when `None`).
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compiler: "gcc".to_string(),
            compiler_flags: vec!["-Wall".to_string(), "-Wformat".to_string()],
            build_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(5),
            warning_patterns: DEFAULT_WARNING_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
            work_dir: None,
        }
    }
}

/// Compiles, runs and classifies C source.
///
/// Calls are independent: every call gets its own [`Workspace`], so a
/// single `Pipeline` can serve concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct Pipeline {
    toolchain: Toolchain,
    runner: ProcessRunner,
    classifier: Classifier,
    work_dir: Option<PathBuf>,
}

impl Pipeline {
    /// Builds a pipeline from its configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let classifier = Classifier::new(&config.warning_patterns)?;
        Ok(Self {
            toolchain: Toolchain::new(
                config.compiler,
                config.compiler_flags,
                config.build_timeout,
            ),
            runner: ProcessRunner::new(config.run_timeout).with_output_limit(config.output_limit),
            classifier,
            work_dir: config.work_dir,
        })
    }

    /// The toolchain used for builds.
    #[must_use]
    pub const fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// The runner used for program execution.
    #[must_use]
    pub const fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Compiles and runs `source`, returning its verdict.
    ///
    /// Empty or whitespace-only input yields [`Verdict::empty_input`]
    /// without launching any process. All temporary files are gone by the
    /// time this returns, whatever the outcome.
    #[instrument(skip_all, fields(source_len = source.len()))]
    pub async fn compile_and_run(&self, source: &str) -> Result<Verdict, PipelineError> {
        let source = source.trim();
        if source.is_empty() {
            debug!("Empty source, skipping toolchain");
            return Ok(Verdict::empty_input());
        }

        let workspace = match &self.work_dir {
            Some(parent) => Workspace::create_in(parent)?,
            None => Workspace::create()?,
        };
        let verdict = self.evaluate(&workspace, source).await;
        workspace.close();

        let verdict = verdict?;
        info!(status = %verdict.status(), "Pipeline finished");
        Ok(verdict)
    }

    async fn evaluate(&self, workspace: &Workspace, source: &str) -> Result<Verdict, PipelineError> {
        let build = self.toolchain.build(workspace, source).await?;
        if !build.succeeded() {
            return Ok(self.classifier.classify(&build, None));
        }

        let execution = self.runner.run(workspace.artifact_path()).await;
        Ok(self.classifier.classify(&build, Some(&execution)))
    }
}
