use crate::display;
use crate::error::WorkflowError;
use crate::operator::Operator;
use crate::session::{ReviewSession, SessionState};
use crate::vcs::{MergeOutcome, Vcs};

/// Merge the review commit back into the origin branch.
///
/// Entered only once the session holds a review commit. Whatever goes
/// wrong before the merge commit lands, the in-progress merge is
/// aborted before the error surfaces, so origin and review branch are
/// both left intact with no partial merge artifacts.
pub fn integrate(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    session: &mut ReviewSession,
) -> Result<(), WorkflowError> {
    debug_assert_eq!(session.state, SessionState::Committed);

    // a failed switch is fatal to the merge but not to the review
    // branch; the review commit stays put for manual recovery
    vcs.checkout(&session.origin_branch)
        .map_err(|err| WorkflowError::CheckoutFailed {
            branch: session.origin_branch.clone(),
            message: err.message().to_string(),
        })?;

    session.advance(SessionState::MergeAttempted);

    let result = attempt(vcs, operator, session);
    if result.is_err() {
        abort_if_mid_merge(vcs);
    }
    result
}

fn attempt(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    session: &mut ReviewSession,
) -> Result<(), WorkflowError> {
    let message = merge_message(&session.review_branch);

    let outcome = vcs
        .merge_no_commit(&session.review_branch)
        .map_err(|err| WorkflowError::MergeFailed {
            message: err.message().to_string(),
        })?;

    let conflicts = match outcome {
        MergeOutcome::Clean => {
            commit_merge(vcs, session, &message)?;
            display::info(format!(
                "merged {} into {}",
                session.review_branch, session.origin_branch
            ));
            return Ok(());
        }
        MergeOutcome::Conflicted(files) => files,
    };

    session.advance(SessionState::Conflicted);
    display::warn(format!("merge produced {} conflict(s):", conflicts.len()));
    for file in &conflicts {
        display::warn(format!("  {file}"));
    }

    let tool = operator.choose_merge_tool()?;
    let resolved = vcs
        .run_merge_tool(tool.as_deref())
        .map_err(|err| WorkflowError::MergeFailed {
            message: err.message().to_string(),
        })?;

    if !resolved || !vcs.conflicted_paths()?.is_empty() {
        return Err(WorkflowError::MergeFailed {
            message: "conflicts remain after the merge tool".to_string(),
        });
    }

    let diff = vcs.staged_diff()?;
    if diff.trim().is_empty() {
        display::info("conflict resolution leaves origin unchanged");
    } else {
        println!("{diff}");
    }

    if !operator.confirm(&format!(
        "Commit this merge of {}? [y/N] ",
        session.review_branch
    ))? {
        return Err(WorkflowError::MergeAbortedByOperator);
    }

    commit_merge(vcs, session, &message)?;
    display::info(format!(
        "merged {} into {} after conflict resolution",
        session.review_branch, session.origin_branch
    ));
    Ok(())
}

fn commit_merge(
    vcs: &dyn Vcs,
    session: &mut ReviewSession,
    message: &str,
) -> Result<(), WorkflowError> {
    vcs.commit(message).map_err(|err| WorkflowError::CommitFailed {
        message: err.message().to_string(),
    })?;
    session.advance(SessionState::Merged);
    Ok(())
}

/// The generated merge message names the review branch; branch-number
/// allocation later mines history for exactly this trace.
fn merge_message(review_branch: &str) -> String {
    format!("Merge review branch '{review_branch}'")
}

fn abort_if_mid_merge(vcs: &dyn Vcs) {
    match vcs.merge_in_progress() {
        Ok(true) => {
            if let Err(err) = vcs.abort_merge() {
                display::warn(format!("could not abort the in-progress merge: {err}"));
            }
        }
        Ok(false) => {}
        Err(err) => display::warn(format!("could not probe for an in-progress merge: {err}")),
    }
}
