use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::display;
use crate::error::WorkflowError;
use crate::vcs::{GitCli, Vcs};

/// Lifecycle of one review session. Transitions are monotonic except
/// for the conflict fork: `Conflicted` resolves to `Merged` or is
/// abandoned to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Clean,
    Branched,
    Staged,
    Committed,
    MergeAttempted,
    Conflicted,
    Merged,
    Cleaned,
    Failed,
}

impl SessionState {
    pub fn can_advance(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Clean, Branched)
            | (Branched, Staged)
            | (Branched, Cleaned)
            | (Staged, Committed)
            | (Committed, MergeAttempted)
            | (MergeAttempted, Merged)
            | (MergeAttempted, Conflicted)
            | (Conflicted, Merged)
            | (Conflicted, Failed)
            | (Merged, Cleaned) => true,
            (from, Failed) => !matches!(from, Merged | Cleaned | Failed),
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Cleaned | SessionState::Failed)
    }
}

/// One workflow invocation's worth of session context, passed
/// explicitly to every component. Nothing here is persisted beyond the
/// process; the backend's branch and commit records are the durable
/// log.
#[derive(Debug)]
pub struct ReviewSession {
    pub origin_branch: String,
    pub review_branch: String,
    pub root: PathBuf,
    pub state: SessionState,
    /// Commit id of the review commit, once staging commits. Cleanup
    /// keys its branch-deletion policy off this: a review branch with
    /// an unmerged commit is the only rollback point and must survive.
    pub review_commit: Option<String>,
    /// Untracked paths this session materialized. Candidates the
    /// operator deliberately skipped are removed from the set so they
    /// stay in the tree after cleanup.
    pub churn: BTreeSet<String>,
}

impl ReviewSession {
    pub fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        display::debug(format!("session: {:?} -> {:?}", self.state, next));
        self.state = next;
    }

    /// Mark the session failed unless it already reached a state that
    /// failure cannot retract (the merge landed, or cleanup finished).
    pub fn fail(&mut self) {
        if self.state.can_advance(SessionState::Failed) {
            self.advance(SessionState::Failed);
        }
    }
}

/// Resolve and validate the working tree the session operates on.
pub fn resolve_root(path: &Path) -> Result<GitCli, WorkflowError> {
    if !path.exists() {
        return Err(WorkflowError::InvalidRoot {
            path: path.to_path_buf(),
            reason: "path does not exist".to_string(),
        });
    }
    GitCli::discover(path).map_err(|err| WorkflowError::InvalidRoot {
        path: path.to_path_buf(),
        reason: err.message().to_string(),
    })
}

/// True when `name` is `<prefix>/<digits>`.
pub fn is_review_branch(name: &str, prefix: &str) -> bool {
    branch_suffix(name, prefix).is_some()
}

/// Numeric suffix of a review branch name, if it has the right shape.
pub fn branch_suffix(name: &str, prefix: &str) -> Option<u64> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('/')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Highest `<prefix>/<n>` suffix mentioned anywhere in `text`.
///
/// A mention only counts when the prefix starts at a word boundary and
/// the digits end at one, so `my-prefix/3` never feeds `prefix`'s
/// counter.
pub fn max_suffix_in_text(text: &str, prefix: &str) -> u64 {
    let marker = format!("{prefix}/");
    let mut max = 0u64;

    for (idx, _) in text.match_indices(&marker) {
        if let Some(before) = text[..idx].chars().next_back()
            && (before.is_alphanumeric() || matches!(before, '/' | '-' | '_'))
        {
            continue;
        }

        let tail = &text[idx + marker.len()..];
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        if let Some(after) = tail[digits.len()..].chars().next()
            && after.is_alphanumeric()
        {
            continue;
        }
        if let Ok(n) = digits.parse::<u64>() {
            max = max.max(n);
        }
    }

    max
}

/// Allocate the next collision-free review branch name.
///
/// The counter is the max over two sources: live branches under the
/// prefix, and commit messages across all branches' history. Branches
/// that were merged and deleted left their number in a merge commit
/// message; consulting only live branches would hand their name out
/// again.
pub fn next_review_branch(vcs: &dyn Vcs, prefix: &str) -> Result<String, WorkflowError> {
    let mut max = 0u64;
    for branch in vcs.local_branches()? {
        if let Some(n) = branch_suffix(&branch, prefix) {
            max = max.max(n);
        }
    }

    let history = vcs.log_messages_matching(&format!("{prefix}/"))?;
    max = max.max(max_suffix_in_text(&history, prefix));

    Ok(format!("{prefix}/{}", max + 1))
}

/// Check everything that must hold before the session mutates anything.
/// Returns the branch the operator is on, the eventual merge target.
pub fn assert_preconditions(vcs: &dyn Vcs, prefix: &str) -> Result<String, WorkflowError> {
    let Some(branch) = vcs.current_branch()? else {
        return Err(WorkflowError::DetachedHead);
    };

    if is_review_branch(&branch, prefix) {
        return Err(WorkflowError::OnReviewBranch { branch });
    }

    if let Err(err) = vcs.head_commit() {
        return Err(WorkflowError::InvalidRoot {
            path: vcs.root().to_path_buf(),
            reason: format!("repository has no commits to branch from: {}", err.message()),
        });
    }

    if !vcs.is_clean()? {
        return Err(WorkflowError::DirtyTree);
    }

    Ok(branch)
}

/// Open a review session: run the precondition checks, allocate the
/// branch name, create and switch in one step. A refused creation
/// leaves no state behind.
pub fn open(vcs: &dyn Vcs, prefix: &str) -> Result<ReviewSession, WorkflowError> {
    let origin = assert_preconditions(vcs, prefix)?;
    let review = next_review_branch(vcs, prefix)?;

    vcs.create_and_checkout(&review)
        .map_err(|err| WorkflowError::BranchCreateFailed {
            branch: review.clone(),
            message: err.message().to_string(),
        })?;

    display::info(format!("opened review branch {review} from {origin}"));

    Ok(ReviewSession {
        origin_branch: origin,
        review_branch: review,
        root: vcs.root().to_path_buf(),
        state: SessionState::Branched,
        review_commit: None,
        churn: BTreeSet::new(),
    })
}
