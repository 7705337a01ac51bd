//! Build root configuration.
//!
//! Loaded from a JSON descriptor:
//!
//! ```json
//! {
//!   "build_path": "/srv/build/work",
//!   "out_path": "/srv/build/out",
//!   "repo": "https://example.com/project.git",
//!   "build_script": "./ci/build.sh",
//!   "build_timeout_secs": 1200,
//!   "ignore_branches": ["^origin/wip/"]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{BuilderError, Result};

/// Default per-build deadline (20 minutes).
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 20 * 60;

/// Which ledger implementation stores verdicts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// `<out_path>/{pass,fail,ignore}/<hash>`
    #[default]
    Fs,
    /// SurrealKV database under `<out_path>/db`
    Surrealkv,
}

/// Configuration for one build root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuilderConfig {
    /// Working tree the repository is cloned into and built in.
    pub build_path: PathBuf,

    /// Root of the verdict ledger.
    pub out_path: PathBuf,

    /// Source repository URL or path.
    pub repo: String,

    /// Build/test command, run through `sh -c` inside `build_path`.
    pub build_script: String,

    /// Per-build deadline in seconds (0 disables it).
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    /// Regular expressions; matching branch names are never built or reported.
    #[serde(default)]
    pub ignore_branches: Vec<String>,

    #[serde(default)]
    pub ledger_backend: LedgerBackend,

    /// Prune and update remotes before each build.
    #[serde(default = "default_true")]
    pub refresh_remotes: bool,
}

fn default_build_timeout_secs() -> u64 {
    DEFAULT_BUILD_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl BuilderConfig {
    /// Read, parse and validate a descriptor from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BuilderError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a descriptor.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| BuilderError::Config(format!("cannot parse descriptor: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.build_path.as_os_str().is_empty() {
            return Err(BuilderError::Config("build_path is empty".to_string()));
        }
        if self.out_path.as_os_str().is_empty() {
            return Err(BuilderError::Config("out_path is empty".to_string()));
        }
        if self.repo.trim().is_empty() {
            return Err(BuilderError::Config("repo is empty".to_string()));
        }
        if self.build_script.trim().is_empty() {
            return Err(BuilderError::Config("build_script is empty".to_string()));
        }
        self.branch_filter()?;
        Ok(())
    }

    /// Per-build deadline, `None` when disabled.
    pub fn build_timeout(&self) -> Option<Duration> {
        (self.build_timeout_secs > 0).then(|| Duration::from_secs(self.build_timeout_secs))
    }

    /// Compiled `ignore_branches` patterns.
    pub fn branch_filter(&self) -> Result<BranchFilter> {
        BranchFilter::new(&self.ignore_branches)
    }

    /// Directory of the SurrealKV ledger.
    pub fn surreal_path(&self) -> PathBuf {
        self.out_path.join("db")
    }
}

/// Name-based branch exclusion.
#[derive(Debug, Clone, Default)]
pub struct BranchFilter {
    patterns: Vec<Regex>,
}

impl BranchFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    BuilderError::Config(format!("bad ignore_branches pattern {p:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "build_path": "work",
        "out_path": "out",
        "repo": "https://example.com/x.git",
        "build_script": "./build.sh"
    }"#;

    #[test]
    fn minimal_descriptor_gets_defaults() {
        let config = BuilderConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.build_path, PathBuf::from("work"));
        assert_eq!(config.build_timeout_secs, DEFAULT_BUILD_TIMEOUT_SECS);
        assert_eq!(config.ledger_backend, LedgerBackend::Fs);
        assert!(config.refresh_remotes);
        assert!(config.ignore_branches.is_empty());
        assert_eq!(
            config.build_timeout(),
            Some(Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS))
        );
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let raw = MINIMAL.replace("\"./build.sh\"", "\"./build.sh\", \"build_timeout_secs\": 0");
        let config = BuilderConfig::from_json(&raw).unwrap();
        assert_eq!(config.build_timeout(), None);
    }

    #[test]
    fn surrealkv_backend_parses() {
        let raw = MINIMAL.replace("\"./build.sh\"", "\"./build.sh\", \"ledger_backend\": \"surrealkv\"");
        let config = BuilderConfig::from_json(&raw).unwrap();
        assert_eq!(config.ledger_backend, LedgerBackend::Surrealkv);
        assert_eq!(config.surreal_path(), PathBuf::from("out").join("db"));
    }

    #[test]
    fn missing_field_is_config_error() {
        let err = BuilderConfig::from_json(r#"{"build_path": "work"}"#).unwrap_err();
        assert!(matches!(err, BuilderError::Config(_)));
    }

    #[test]
    fn empty_script_is_rejected() {
        let raw = MINIMAL.replace("./build.sh", " ");
        assert!(matches!(
            BuilderConfig::from_json(&raw),
            Err(BuilderError::Config(_))
        ));
    }

    #[test]
    fn bad_regex_is_rejected() {
        let raw = MINIMAL.replace("\"./build.sh\"", "\"./build.sh\", \"ignore_branches\": [\"(\"]");
        assert!(matches!(
            BuilderConfig::from_json(&raw),
            Err(BuilderError::Config(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("builder.json");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = BuilderConfig::load(&path).unwrap();
        assert_eq!(config.repo, "https://example.com/x.git");
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = BuilderConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, BuilderError::Config(_)));
    }

    #[test]
    fn branch_filter_matches_patterns() {
        let filter =
            BranchFilter::new(&["^origin/wip/".to_string(), "-old$".to_string()]).unwrap();
        assert!(filter.is_ignored("origin/wip/x"));
        assert!(filter.is_ignored("v1-old"));
        assert!(!filter.is_ignored("origin/main"));
        assert!(!BranchFilter::default().is_ignored("anything"));
    }
}
