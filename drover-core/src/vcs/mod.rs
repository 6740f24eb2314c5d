mod git;

pub use git::GitCli;

use std::fmt;
use std::path::Path;

/// How a backend command's stdio is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Discard output entirely; for state probes where only the exit
    /// status matters.
    Silent,
    /// Capture stdout/stderr for programmatic decisions.
    Captured,
    /// Inherit the controlling terminal so the backend's own
    /// interactive UI (hunk staging, mergetool) can drive it.
    Interactive,
}

/// Result of one backend command. Spawn failures and nonzero exits are
/// both reported here rather than raised; the caller decides what is
/// fatal.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutcome {
    /// Best human-readable account of what went wrong: stderr when git
    /// wrote one, stdout otherwise.
    pub fn message(&self) -> String {
        let err = self.stderr.trim();
        if !err.is_empty() {
            return err.to_string();
        }
        self.stdout.trim().to_string()
    }
}

#[derive(Debug)]
pub struct VcsError {
    op: String,
    message: String,
}

impl VcsError {
    pub fn new(op: impl Into<String>, message: impl Into<String>) -> Self {
        VcsError {
            op: op.into(),
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for VcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "git {} failed", self.op)
        } else {
            write!(f, "git {}: {}", self.op, self.message)
        }
    }
}

impl std::error::Error for VcsError {}

/// Result of a non-fast-forward, no-commit merge attempt.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Clean,
    Conflicted(Vec<String>),
}

/// The backend primitives the workflow engine is allowed to issue.
///
/// The engine never inspects backend storage directly; everything goes
/// through this interface, which keeps the state machine testable with
/// a scripted implementation and the backend swappable in principle.
pub trait Vcs {
    /// Working-tree root this adapter is bound to.
    fn root(&self) -> &Path;

    /// Current branch name, or `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>, VcsError>;

    /// Commit id HEAD resolves to. Errors when the repository has no
    /// commits yet.
    fn head_commit(&self) -> Result<String, VcsError>;

    fn branch_exists(&self, name: &str) -> Result<bool, VcsError>;

    fn local_branches(&self) -> Result<Vec<String>, VcsError>;

    /// Create `name` at HEAD and switch to it in one backend call, so
    /// a refused creation leaves the repository untouched.
    fn create_and_checkout(&self, name: &str) -> Result<(), VcsError>;

    /// Forced switch: session-made modifications to tracked files are
    /// discarded, untracked files carry over.
    fn checkout(&self, name: &str) -> Result<(), VcsError>;

    fn delete_branch(&self, name: &str) -> Result<(), VcsError>;

    /// True when tracked content carries no uncommitted changes,
    /// staged or unstaged. Untracked files do not count.
    fn is_clean(&self) -> Result<bool, VcsError>;

    fn is_tracked(&self, path: &str) -> Result<bool, VcsError>;

    /// True when the working copy of `path` differs from its indexed
    /// version; a file with no difference has nothing to review.
    fn worktree_differs(&self, path: &str) -> Result<bool, VcsError>;

    /// Content of `path` as currently staged in the index.
    fn indexed_content(&self, path: &str) -> Result<Vec<u8>, VcsError>;

    /// Stage the whole working copy of `path`.
    fn stage_path(&self, path: &str) -> Result<(), VcsError>;

    /// Hand `path` to the backend's interactive hunk selection.
    fn stage_interactive(&self, path: &str) -> Result<(), VcsError>;

    fn staged_paths(&self) -> Result<Vec<String>, VcsError>;

    /// Unified diff of the index against HEAD.
    fn staged_diff(&self) -> Result<String, VcsError>;

    fn commit(&self, message: &str) -> Result<(), VcsError>;

    /// `git merge --no-ff --no-commit`: reports conflicts instead of
    /// failing, and never auto-commits.
    fn merge_no_commit(&self, branch: &str) -> Result<MergeOutcome, VcsError>;

    /// True when the backend still holds an unresolved merge marker.
    fn merge_in_progress(&self) -> Result<bool, VcsError>;

    fn abort_merge(&self) -> Result<(), VcsError>;

    fn conflicted_paths(&self) -> Result<Vec<String>, VcsError>;

    /// Run the backend's merge-tool protocol, blocking until it exits.
    /// Returns whether the tool reported success.
    fn run_merge_tool(&self, tool: Option<&str>) -> Result<bool, VcsError>;

    /// Discard staged and unstaged modifications to tracked files.
    fn reset_hard(&self) -> Result<(), VcsError>;

    /// Remove exactly the listed untracked paths. Paths that are
    /// tracked (or already gone) are left alone.
    fn clean_untracked(&self, paths: &[&str]) -> Result<(), VcsError>;

    /// Full message bodies of every commit on any branch that mentions
    /// `needle`, concatenated. Used for review-branch numbering, where
    /// deleted branches still count through the trace their merge
    /// commits left behind.
    fn log_messages_matching(&self, needle: &str) -> Result<String, VcsError>;
}

pub(crate) fn normalize_pathspec(path: &str) -> String {
    let mut s = path
        .trim()
        .trim_end_matches('/')
        .trim_end_matches('\\')
        .to_string();

    s = s.replace('\\', "/");
    if let Some(stripped) = s.strip_prefix("./") {
        s = stripped.to_string();
    }

    while s.contains("//") {
        s = s.replace("//", "/");
    }

    s
}
