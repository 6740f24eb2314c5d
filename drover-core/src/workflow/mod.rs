
use crate::cleanup;
use crate::display;
use crate::error::WorkflowError;
use crate::intake;
use crate::merge;
use crate::operator::Operator;
use crate::session::{self, SessionState};
use crate::staging::{self, CandidateFile, NewFilePolicy, StagingStrategy};
use crate::vcs::Vcs;

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub branch_prefix: String,
    pub commit_message: String,
    pub policy: NewFilePolicy,
    pub strategy: StagingStrategy,
}

#[derive(Debug)]
pub enum WorkflowOutcome {
    Merged {
        review_branch: String,
        origin_branch: String,
        merge_commit: String,
    },
    /// The operator accepted nothing; no commit was created and the
    /// repository is back where it started.
    NothingToDo { origin_branch: String },
}

/// Drive one full review session over `files`.
///
/// Precondition violations return before anything is mutated. Once the
/// review branch exists, every exit path (merged, nothing-to-do, or
/// any failure) runs the cleanup coordinator before this function
/// returns, so no session leaves stray branches, conflicted merges, or
/// a dirty tree behind.
pub fn run_review(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    files: &[CandidateFile],
    opts: &WorkflowOptions,
) -> Result<WorkflowOutcome, WorkflowError> {
    let mut session = session::open(vcs, &opts.branch_prefix)?;

    let result = drive(vcs, operator, &mut session, files, opts);
    if result.is_err() {
        session.fail();
    }

    let report = cleanup::run(vcs, &mut session);
    if let Some(note) = &report.manual_intervention {
        display::debug(format!("cleanup incomplete: {note}"));
    }

    result
}

fn drive(
    vcs: &dyn Vcs,
    operator: &mut dyn Operator,
    session: &mut session::ReviewSession,
    files: &[CandidateFile],
    opts: &WorkflowOptions,
) -> Result<WorkflowOutcome, WorkflowError> {
    // remember which paths the batch introduces, before writing them:
    // cleanup removes exactly this churn and nothing else
    for file in files {
        if !vcs.is_tracked(&file.path)? {
            session.churn.insert(file.path.clone());
        }
    }
    intake::materialize(&session.root, files)?;

    staging::stage_files(
        vcs,
        operator,
        session,
        files,
        opts.policy,
        opts.strategy,
        &opts.commit_message,
    )?;

    if session.state != SessionState::Committed {
        display::info("no files were staged; nothing to merge");
        return Ok(WorkflowOutcome::NothingToDo {
            origin_branch: session.origin_branch.clone(),
        });
    }

    merge::integrate(vcs, operator, session)?;

    Ok(WorkflowOutcome::Merged {
        review_branch: session.review_branch.clone(),
        origin_branch: session.origin_branch.clone(),
        merge_commit: vcs.head_commit()?,
    })
}
