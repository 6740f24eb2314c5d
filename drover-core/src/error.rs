use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::vcs::VcsError;

/// Everything that can end a review session early.
///
/// Precondition violations are reported before any repository mutation
/// happens, so no cleanup is owed for them. Everything else fires after
/// the review branch exists and routes through the cleanup coordinator
/// before it reaches the caller.
#[derive(Debug)]
pub enum WorkflowError {
    InvalidRoot { path: PathBuf, reason: String },
    DetachedHead,
    OnReviewBranch { branch: String },
    DirtyTree,
    BranchCreateFailed { branch: String, message: String },
    StageFailed { path: String, message: String },
    CommitFailed { message: String },
    CheckoutFailed { branch: String, message: String },
    MergeFailed { message: String },
    MergeAbortedByOperator,
    Io(io::Error),
    Vcs(VcsError),
}

impl WorkflowError {
    /// True for failures that happen before anything was mutated.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            WorkflowError::InvalidRoot { .. }
                | WorkflowError::DetachedHead
                | WorkflowError::OnReviewBranch { .. }
                | WorkflowError::DirtyTree
        )
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::InvalidRoot { path, reason } => {
                write!(f, "{} is not a usable working tree: {}", path.display(), reason)
            }
            WorkflowError::DetachedHead => {
                write!(f, "HEAD is detached; checkout a branch before starting a review")
            }
            WorkflowError::OnReviewBranch { branch } => write!(
                f,
                "already on review branch {branch}; finish or abandon that session first"
            ),
            WorkflowError::DirtyTree => {
                write!(f, "working tree has uncommitted changes; commit or stash them first")
            }
            WorkflowError::BranchCreateFailed { branch, message } => {
                write!(f, "could not create review branch {branch}: {message}")
            }
            WorkflowError::StageFailed { path, message } => {
                write!(f, "staging {path} failed: {message}")
            }
            WorkflowError::CommitFailed { message } => write!(f, "commit failed: {message}"),
            WorkflowError::CheckoutFailed { branch, message } => {
                write!(f, "could not switch to {branch}: {message}")
            }
            WorkflowError::MergeFailed { message } => write!(f, "merge failed: {message}"),
            WorkflowError::MergeAbortedByOperator => {
                write!(f, "merge aborted at the operator's request")
            }
            WorkflowError::Io(err) => write!(f, "{err}"),
            WorkflowError::Vcs(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkflowError::Io(err) => Some(err),
            WorkflowError::Vcs(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkflowError {
    fn from(err: io::Error) -> Self {
        WorkflowError::Io(err)
    }
}

impl From<VcsError> for WorkflowError {
    fn from(err: VcsError) -> Self {
        WorkflowError::Vcs(err)
    }
}
