//! Scoped temporary workspace for one pipeline call.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::PipelineError;

const WORKSPACE_PREFIX: &str = "minic-";
const SOURCE_FILE: &str = "main.c";
const ARTIFACT_STEM: &str = "main";

/// A private temporary directory holding the source file and the built
/// artifact of a single pipeline call.
///
/// The directory and everything in it are removed when the workspace is
/// dropped, so cleanup happens on every exit path. Use [`Workspace::close`]
/// to remove it eagerly and log any cleanup failure.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    source: PathBuf,
    artifact_name: String,
    artifact: PathBuf,
}

impl Workspace {
    /// Creates a workspace under the system temporary directory.
    pub fn create() -> Result<Self, PipelineError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(PipelineError::WorkspaceCreate)?;
        Ok(Self::from_dir(dir))
    }

    /// Creates a workspace under `parent`.
    pub fn create_in(parent: &Path) -> Result<Self, PipelineError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(PipelineError::WorkspaceCreate)?;
        Ok(Self::from_dir(dir))
    }

    fn from_dir(dir: TempDir) -> Self {
        let source = dir.path().join(SOURCE_FILE);
        let artifact_name = format!("{ARTIFACT_STEM}{}", std::env::consts::EXE_SUFFIX);
        let artifact = dir.path().join(&artifact_name);
        debug!(path = %dir.path().display(), "Created workspace");
        Self {
            dir,
            source,
            artifact_name,
            artifact,
        }
    }

    /// The workspace directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the submitted source is written.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Where the toolchain places the executable.
    #[must_use]
    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    /// Source file name relative to the workspace directory.
    #[must_use]
    pub const fn source_name(&self) -> &'static str {
        SOURCE_FILE
    }

    /// Executable name relative to the workspace directory.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    /// Removes the workspace now.
    ///
    /// A failure to remove is logged, never returned: the verdict has
    /// already been decided by the time the workspace is closed.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed workspace"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove workspace"),
        }
    }
}
