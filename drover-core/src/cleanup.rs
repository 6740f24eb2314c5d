use crate::display;
use crate::session::{ReviewSession, SessionState};
use crate::vcs::Vcs;

/// What the coordinator managed to do. Failures inside cleanup never
/// escalate; they surface here and as warnings, because forcing more
/// automated mutation onto an already-broken repository risks losing
/// the one useful rollback point.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub merge_aborted: bool,
    pub review_branch_deleted: bool,
    pub manual_intervention: Option<String>,
}

/// Restore the repository to a consistent state and dispose of the
/// review branch where that is safe.
///
/// Invoked unconditionally at the end of every session that got past
/// the precondition checks, successful or not, and idempotent: a
/// second run finds nothing left to do.
///
/// The review branch is deleted only when it cannot be the rollback
/// point: the merge landed, or no review commit was ever created. It
/// is never deleted when switching back to origin failed, and never
/// deleted without verifying it exists first. The origin branch is
/// never deleted.
pub fn run(vcs: &dyn Vcs, session: &mut ReviewSession) -> CleanupReport {
    let mut report = CleanupReport::default();

    let keep_review_branch = session.review_commit.is_some()
        && !matches!(
            session.state,
            SessionState::Merged | SessionState::Cleaned
        );

    match vcs.merge_in_progress() {
        Ok(true) => match vcs.abort_merge() {
            Ok(()) => report.merge_aborted = true,
            Err(err) => display::warn(format!("could not abort the in-progress merge: {err}")),
        },
        Ok(false) => {}
        Err(err) => display::warn(format!("could not probe for an in-progress merge: {err}")),
    }

    if let Err(err) = vcs.reset_hard() {
        display::warn(format!("could not discard working-tree changes: {err}"));
    }

    // only the session's own untracked churn goes; pre-existing
    // untracked files and deliberately skipped candidates stay
    let churn: Vec<&str> = session.churn.iter().map(String::as_str).collect();
    if let Err(err) = vcs.clean_untracked(&churn) {
        display::warn(format!("could not remove session artifacts: {err}"));
    }

    let current = match vcs.current_branch() {
        Ok(branch) => branch,
        Err(err) => {
            display::warn(format!("could not determine the current branch: {err}"));
            None
        }
    };

    if current.as_deref() != Some(session.origin_branch.as_str()) {
        if let Err(err) = vcs.checkout(&session.origin_branch) {
            let note = format!(
                "manual intervention required: could not switch back to {} ({}); review branch {} left in place",
                session.origin_branch,
                err.message(),
                session.review_branch
            );
            display::emit(display::LogLevel::Error, &note);
            report.manual_intervention = Some(note);
            return report;
        }
        display::info(format!("switched back to {}", session.origin_branch));
    }

    if keep_review_branch {
        display::warn(format!(
            "keeping review branch {}; it holds the review commit",
            session.review_branch
        ));
    } else {
        match vcs.branch_exists(&session.review_branch) {
            Ok(true) => match vcs.delete_branch(&session.review_branch) {
                Ok(()) => {
                    report.review_branch_deleted = true;
                    display::info(format!("deleted review branch {}", session.review_branch));
                }
                Err(err) => display::warn(format!(
                    "could not delete review branch {}: {err}",
                    session.review_branch
                )),
            },
            Ok(false) => {}
            Err(err) => display::warn(format!(
                "could not verify review branch {} exists; leaving it alone: {err}",
                session.review_branch
            )),
        }
    }

    if matches!(session.state, SessionState::Merged | SessionState::Branched) {
        session.advance(SessionState::Cleaned);
    }

    report
}
