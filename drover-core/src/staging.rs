use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::display;
use crate::error::WorkflowError;
use crate::operator::Operator;
use crate::session::{ReviewSession, SessionState};
use crate::vcs::Vcs;

/// What to do with a candidate the repository does not track yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewFilePolicy {
    AutoAdd,
    AutoSkip,
    Prompt,
}

/// How tracked candidates are reviewed. Chosen once per session, never
/// per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StagingStrategy {
    /// The backend's own interactive hunk selection.
    Patch,
    /// An external diff viewer mediates; the full working copy as the
    /// operator leaves it gets staged.
    ExternalTool,
}

/// One incoming file, as handed over by the batch parser. Paths are
/// relative to the session root; tracked status is probed from the
/// backend index at staging time.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct StagingReport {
    /// Paths with content in the index when the pass finished.
    pub staged: Vec<String>,
    /// Candidates that were deliberately or silently passed over.
    pub skipped: Vec<String>,
}

/// Run the staging pass over `files` in input order, then commit the
/// accepted set.
///
/// Assumptions:
/// - Candidates are already materialized in the working tree and the
///   session holds the review branch.
/// - A vanished file is logged and skipped, not an error.
/// - One backend staging failure aborts the whole pass; whatever ended
///   up in the index stays there for cleanup to discard.
/// - Nothing staged at the end is a no-op, not an error: the commit is
///   skipped and the session stays `Branched`.
pub fn stage_files(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    session: &mut ReviewSession,
    files: &[CandidateFile],
    policy: NewFilePolicy,
    strategy: StagingStrategy,
    commit_message: &str,
) -> Result<StagingReport, WorkflowError> {
    let mut report = StagingReport::default();

    for file in files {
        if !stage_one(vcs, operator, session, file, policy, strategy)? {
            report.skipped.push(file.path.clone());
        }
    }

    report.staged = vcs.staged_paths()?;
    if report.staged.is_empty() {
        display::info("nothing staged; skipping the review commit");
        return Ok(report);
    }

    session.advance(SessionState::Staged);
    vcs.commit(commit_message)
        .map_err(|err| WorkflowError::CommitFailed {
            message: err.message().to_string(),
        })?;
    session.review_commit = Some(vcs.head_commit()?);
    session.advance(SessionState::Committed);

    display::info(format!(
        "committed {} file(s) on {}",
        report.staged.len(),
        session.review_branch
    ));

    Ok(report)
}

fn stage_one(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    session: &mut ReviewSession,
    file: &CandidateFile,
    policy: NewFilePolicy,
    strategy: StagingStrategy,
) -> Result<bool, WorkflowError> {
    let path = file.path.as_str();

    if !session.root.join(path).exists() {
        display::warn(format!("{path} vanished before staging; skipping"));
        return Ok(false);
    }

    if !vcs.is_tracked(path)? {
        return stage_untracked(vcs, operator, session, path, policy);
    }

    if !vcs.worktree_differs(path)? {
        display::info(format!("{path} matches the index; nothing to review"));
        return Ok(false);
    }

    match strategy {
        StagingStrategy::Patch => {
            vcs.stage_interactive(path)
                .map_err(|err| WorkflowError::StageFailed {
                    path: path.to_string(),
                    message: err.message().to_string(),
                })?;
            Ok(true)
        }
        StagingStrategy::ExternalTool => stage_via_tool(vcs, operator, session, path),
    }
}

fn stage_untracked(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    session: &mut ReviewSession,
    path: &str,
    policy: NewFilePolicy,
) -> Result<bool, WorkflowError> {
    let accept = match policy {
        NewFilePolicy::AutoAdd => true,
        NewFilePolicy::AutoSkip => false,
        NewFilePolicy::Prompt => operator.confirm(&format!("Stage new file {path}? [y/N] "))?,
    };

    if !accept {
        display::info(format!("leaving new file {path} untracked"));
        // a deliberate skip means the file stays in the tree after
        // cleanup
        session.churn.remove(path);
        return Ok(false);
    }

    vcs.stage_path(path).map_err(|err| WorkflowError::StageFailed {
        path: path.to_string(),
        message: err.message().to_string(),
    })?;
    display::info(format!("staged new file {path}"));
    Ok(true)
}

/// External-tool staging: the viewer gets (indexed copy, working copy)
/// and may edit the working copy ad hoc. On accept, the working copy
/// as the viewer left it is staged and the tree is put back to its
/// pre-viewer state, so only the index reflects the edit. On abort the
/// tree is restored and the pass continues with the remaining files.
fn stage_via_tool(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    session: &mut ReviewSession,
    path: &str,
) -> Result<bool, WorkflowError> {
    let working = session.root.join(path);

    let indexed = vcs
        .indexed_content(path)
        .map_err(|err| WorkflowError::StageFailed {
            path: path.to_string(),
            message: err.message().to_string(),
        })?;

    let mut builder = tempfile::Builder::new();
    builder.prefix("drover-index-");
    let suffix = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"));
    if let Some(suffix) = &suffix {
        builder.suffix(suffix.as_str());
    }
    let index_copy = builder.tempfile()?;
    fs::write(index_copy.path(), &indexed)?;

    let snapshot = fs::read(&working)?;

    let result = (|| -> Result<bool, WorkflowError> {
        let accepted = operator.view_diff(index_copy.path(), &working)?;
        if !accepted {
            display::warn(format!("viewer declined {path}; leaving it unstaged"));
            return Ok(false);
        }
        vcs.stage_path(path).map_err(|err| WorkflowError::StageFailed {
            path: path.to_string(),
            message: err.message().to_string(),
        })?;
        display::info(format!("staged {path} as edited in the viewer"));
        Ok(true)
    })();

    if let Err(err) = fs::write(&working, &snapshot) {
        display::warn(format!("could not restore {path} after the viewer: {err}"));
    }

    // index_copy drops here and removes itself, on every exit path
    result
}
