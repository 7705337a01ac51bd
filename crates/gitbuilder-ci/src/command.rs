//! Build command definition.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gitbuilder_core::BuilderConfig;
use serde::{Deserialize, Serialize};

/// A shell script run inside the working tree, with an optional deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildCommand {
    /// Script text, run through `sh -c`.
    pub script: String,

    /// Directory the script runs in.
    pub work_dir: PathBuf,

    /// Wall-clock deadline; `None` runs to completion.
    pub timeout: Option<Duration>,
}

impl BuildCommand {
    pub fn new(script: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            work_dir: work_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command for a build root: `build_script` in `build_path`.
    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new(config.build_script.clone(), config.build_path.clone())
            .with_timeout(config.build_timeout())
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Script body with stderr folded into stdout so the log keeps the
    /// interleaving the build produced.
    pub(crate) fn shell_body(&self) -> String {
        format!("exec 2>&1\n{}", self.script)
    }
}
