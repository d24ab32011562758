#![forbid(unsafe_code)]
//! Changed-path discovery between two revisions, via the `git` CLI.

pub mod diff;
pub mod error;

pub use diff::{GitCli, RevisionDiffProvider};
pub use error::GitError;
