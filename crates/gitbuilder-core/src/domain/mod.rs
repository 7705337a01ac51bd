//! Domain models for gitbuilder.
//!
//! Canonical definitions for the core entities:
//! - `Commit`: one first-parent history entry (hash, committer, subject)
//! - `Branch`: a tracked ref and its tip commit
//! - `RevisionWindow`: the Ignore-filtered, Pass-truncated slice of a
//!   branch's history that scheduling and reporting look at

pub mod commit;
pub mod error;
pub mod window;

// Re-export main types and errors
pub use commit::{Branch, Commit, SHORT_HASH_LEN};
pub use error::{BuilderError, Result};
pub use window::{RevisionWindow, WindowEntry};
