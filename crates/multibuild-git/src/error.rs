//! Error types for multibuild-git.

/// Errors produced while asking git about revisions.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// `git diff` rejected the revision range.
    #[error("cannot diff {from}..{to}: {message}")]
    Diff {
        from: String,
        to: String,
        message: String,
    },

    /// A revision name could not be resolved to a commit.
    #[error("cannot resolve revision `{rev}`: {message}")]
    RevParse { rev: String, message: String },

    /// The current branch could not be determined (e.g. detached HEAD).
    #[error("cannot determine the current branch: {message}")]
    NoCurrentBranch { message: String },

    /// An error propagated from multibuild-util (e.g. git is not installed).
    #[error("{0}")]
    Util(#[from] multibuild_util::error::UtilError),
}
