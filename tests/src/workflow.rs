use std::collections::BTreeSet;

use crate::fixtures::*;
use drover_core::cleanup;
use drover_core::error::WorkflowError;
use drover_core::intake;
use drover_core::merge;
use drover_core::session::{ReviewSession, SessionState};
use drover_core::staging::{NewFilePolicy, StagingStrategy};
use drover_core::vcs::Vcs;
use drover_core::workflow::{self, WorkflowOptions, WorkflowOutcome};

fn opts(policy: NewFilePolicy, strategy: StagingStrategy) -> WorkflowOptions {
    WorkflowOptions {
        branch_prefix: "drover".to_string(),
        commit_message: "Apply generated batch".to_string(),
        policy,
        strategy,
    }
}

#[test]
fn clean_auto_add_batch_lands_on_origin() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let origin = repo.origin_branch();
    let git = repo.git();

    let files = intake::parse("===> a.txt\nhello from the generator\n")?;
    let mut operator = ScriptedOperator::default();
    let outcome = workflow::run_review(
        &git,
        &mut operator,
        &files,
        &opts(NewFilePolicy::AutoAdd, StagingStrategy::Patch),
    )?;

    match outcome {
        WorkflowOutcome::Merged {
            review_branch,
            origin_branch,
            ..
        } => {
            assert_eq!(review_branch, "drover/1");
            assert_eq!(origin_branch, origin);
        }
        other => panic!("expected a merge, got {other:?}"),
    }

    assert_eq!(repo.current_branch().as_deref(), Some(origin.as_str()));
    assert!(!repo.branch_exists("drover/1"), "review branch is disposed of");
    assert!(repo.head_contains("a.txt"));
    assert_eq!(repo.head_blob("a.txt"), "hello from the generator\n");
    assert!(repo.head_message().contains("drover/1"));
    assert!(git.is_clean()?);
    Ok(())
}

#[test]
fn successive_sessions_never_reuse_a_number() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let git = repo.git();
    let options = opts(NewFilePolicy::AutoAdd, StagingStrategy::Patch);

    let first = workflow::run_review(
        &git,
        &mut ScriptedOperator::default(),
        &intake::parse("===> one.txt\n1\n")?,
        &options,
    )?;
    let second = workflow::run_review(
        &git,
        &mut ScriptedOperator::default(),
        &intake::parse("===> two.txt\n2\n")?,
        &options,
    )?;

    let branch_of = |outcome: &WorkflowOutcome| match outcome {
        WorkflowOutcome::Merged { review_branch, .. } => review_branch.clone(),
        other => panic!("expected a merge, got {other:?}"),
    };
    // drover/1 is gone, but its merge commit keeps the number reserved
    assert_eq!(branch_of(&first), "drover/1");
    assert_eq!(branch_of(&second), "drover/2");
    Ok(())
}

#[test]
fn auto_skip_leaves_the_generated_file_untracked() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.write("tracked.txt", "old content\n");
    repo.commit_all("add tracked.txt");
    let origin = repo.origin_branch();
    let git = repo.git();

    let batch = "===> tracked.txt\nnew content\n===> c.txt\ngenerated helper\n";
    let mut operator = ScriptedOperator {
        viewer: Some(repo.script("accept.sh", "#!/bin/sh\nexit 0\n")),
        ..ScriptedOperator::default()
    };

    let outcome = workflow::run_review(
        &git,
        &mut operator,
        &intake::parse(batch)?,
        &opts(NewFilePolicy::AutoSkip, StagingStrategy::ExternalTool),
    )?;

    assert!(matches!(outcome, WorkflowOutcome::Merged { .. }));
    assert_eq!(repo.head_blob("tracked.txt"), "new content\n");
    assert_eq!(repo.current_branch().as_deref(), Some(origin.as_str()));

    // the skipped file is still in the tree, still untracked
    assert_eq!(repo.read("c.txt"), "generated helper\n");
    assert!(!git.is_tracked("c.txt")?);
    assert!(!repo.head_contains("c.txt"));
    Ok(())
}

#[test]
fn pure_auto_skip_batch_is_a_no_op() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let origin = repo.origin_branch();
    let git = repo.git();
    let head_before = repo.head_oid();

    let outcome = workflow::run_review(
        &git,
        &mut ScriptedOperator::default(),
        &intake::parse("===> c.txt\ngenerated\n")?,
        &opts(NewFilePolicy::AutoSkip, StagingStrategy::Patch),
    )?;

    assert!(matches!(outcome, WorkflowOutcome::NothingToDo { .. }));
    assert_eq!(repo.head_oid(), head_before, "no commit was created");
    assert_eq!(repo.current_branch().as_deref(), Some(origin.as_str()));
    assert!(!repo.branch_exists("drover/1"));
    assert_eq!(repo.read("c.txt"), "generated\n");
    assert!(!git.is_tracked("c.txt")?);
    Ok(())
}

#[test]
fn viewer_abort_drops_one_file_and_keeps_the_rest() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.write("d.txt", "keep me\n");
    repo.write("e.txt", "old e\n");
    repo.commit_all("base files");
    let git = repo.git();

    let batch = "===> d.txt\nrejected edit\n===> e.txt\naccepted edit\n";
    let viewer = repo.script(
        "pick.sh",
        "#!/bin/sh\ncase \"$2\" in\n  *d.txt) exit 1 ;;\nesac\nexit 0\n",
    );
    let mut operator = ScriptedOperator {
        viewer: Some(viewer),
        ..ScriptedOperator::default()
    };

    let outcome = workflow::run_review(
        &git,
        &mut operator,
        &intake::parse(batch)?,
        &opts(NewFilePolicy::AutoAdd, StagingStrategy::ExternalTool),
    )?;

    assert!(matches!(outcome, WorkflowOutcome::Merged { .. }));
    assert_eq!(repo.head_blob("d.txt"), "keep me\n", "aborted file stays put");
    assert_eq!(repo.head_blob("e.txt"), "accepted edit\n");
    assert_eq!(repo.read("d.txt"), "keep me\n");
    assert!(git.is_clean()?);
    Ok(())
}

#[test]
fn viewer_edits_land_in_the_commit() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.write("f.txt", "original\n");
    repo.commit_all("base");
    let git = repo.git();

    // the viewer rewrites the working copy before accepting, standing
    // in for an operator doing ad hoc edits in their difftool
    let viewer = repo.script(
        "edit.sh",
        "#!/bin/sh\nprintf 'edited in viewer\\n' > \"$2\"\nexit 0\n",
    );
    let mut operator = ScriptedOperator {
        viewer: Some(viewer),
        ..ScriptedOperator::default()
    };

    let outcome = workflow::run_review(
        &git,
        &mut operator,
        &intake::parse("===> f.txt\ncandidate content\n")?,
        &opts(NewFilePolicy::AutoAdd, StagingStrategy::ExternalTool),
    )?;

    assert!(matches!(outcome, WorkflowOutcome::Merged { .. }));
    assert_eq!(repo.head_blob("f.txt"), "edited in viewer\n");
    assert!(git.is_clean()?);
    Ok(())
}

#[test]
fn identical_candidate_content_is_nothing_to_merge() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.write("same.txt", "unchanged\n");
    repo.commit_all("base");
    let git = repo.git();
    let head_before = repo.head_oid();

    let outcome = workflow::run_review(
        &git,
        &mut ScriptedOperator::default(),
        &intake::parse("===> same.txt\nunchanged\n")?,
        &opts(NewFilePolicy::AutoAdd, StagingStrategy::ExternalTool),
    )?;

    assert!(matches!(outcome, WorkflowOutcome::NothingToDo { .. }));
    assert_eq!(repo.head_oid(), head_before);
    Ok(())
}

#[test]
fn dirty_tracked_state_blocks_the_session_before_mutation() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.write("tracked.txt", "old\n");
    repo.commit_all("base");
    repo.write("tracked.txt", "operator edit in flight\n");
    let git = repo.git();
    let head_before = repo.head_oid();

    let err = workflow::run_review(
        &git,
        &mut ScriptedOperator::default(),
        &intake::parse("===> a.txt\nx\n")?,
        &opts(NewFilePolicy::AutoAdd, StagingStrategy::Patch),
    )
    .unwrap_err();

    assert!(matches!(err, WorkflowError::DirtyTree));
    assert_eq!(repo.head_oid(), head_before);
    assert!(!repo.branch_exists("drover/1"));
    assert_eq!(repo.read("tracked.txt"), "operator edit in flight\n");
    Ok(())
}

#[test]
fn pre_existing_untracked_files_survive_a_session() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.write("scratch.txt", "operator's notes\n");
    let git = repo.git();

    let outcome = workflow::run_review(
        &git,
        &mut ScriptedOperator::default(),
        &intake::parse("===> a.txt\nx\n")?,
        &opts(NewFilePolicy::AutoAdd, StagingStrategy::Patch),
    )?;

    assert!(matches!(outcome, WorkflowOutcome::Merged { .. }));
    assert_eq!(repo.read("scratch.txt"), "operator's notes\n");
    Ok(())
}

fn conflicted_fixture(repo: &IntegrationRepo) -> Result<ReviewSession, Box<dyn std::error::Error>> {
    let origin = repo.origin_branch();
    let git = repo.git();

    repo.write("b.txt", "original\n");
    repo.commit_all("add b.txt");

    git.create_and_checkout("drover/1")?;
    repo.write("b.txt", "review side\n");
    let review_oid = repo.commit_all("review commit");
    git.checkout(&origin)?;
    repo.write("b.txt", "origin side\n");
    repo.commit_all("origin change");

    // headless merge tool: writes a resolution into $MERGED. With
    // trustExitCode=false git decides success by checking whether $MERGED is
    // newer than its backup; under /bin/sh the `-nt` test has one-second
    // granularity, so an instant `echo` leaves git thinking the file is
    // unchanged. Bump the mtime so the write is reliably detected headlessly.
    repo.set_config(
        "mergetool.fake.cmd",
        "echo resolved > \"$MERGED\"; touch -d \"+1 hour\" \"$MERGED\"",
    );
    repo.set_config("mergetool.fake.trustExitCode", "false");

    Ok(ReviewSession {
        origin_branch: origin,
        review_branch: "drover/1".to_string(),
        root: git.root().to_path_buf(),
        state: SessionState::Committed,
        review_commit: Some(review_oid.to_string()),
        churn: BTreeSet::new(),
    })
}

#[test]
fn rejected_conflict_resolution_restores_origin_and_keeps_the_branch() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let mut session = conflicted_fixture(&repo)?;
    let git = repo.git();
    let origin_head = repo.head_oid();

    let mut operator = ScriptedOperator::answering([false]);
    operator.merge_tool = Some("fake".to_string());

    let err = merge::integrate(&git, &mut operator, &mut session).unwrap_err();
    assert!(matches!(err, WorkflowError::MergeAbortedByOperator));

    session.fail();
    let report = cleanup::run(&git, &mut session);
    assert!(report.manual_intervention.is_none());

    assert_eq!(repo.head_oid(), origin_head, "origin is unchanged");
    assert_eq!(repo.read("b.txt"), "origin side\n");
    assert!(repo.branch_exists("drover/1"), "review branch survives");
    assert_eq!(
        repo.current_branch().as_deref(),
        Some(session.origin_branch.as_str())
    );
    assert!(!git.merge_in_progress()?);
    assert!(git.is_clean()?);

    // a second cleanup finds nothing left to do
    let again = cleanup::run(&git, &mut session);
    assert!(again.manual_intervention.is_none());
    assert!(!again.review_branch_deleted);
    assert!(repo.branch_exists("drover/1"));
    assert_eq!(repo.head_oid(), origin_head);
    Ok(())
}

#[test]
fn accepted_conflict_resolution_merges_the_tool_result() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let mut session = conflicted_fixture(&repo)?;
    let git = repo.git();

    let mut operator = ScriptedOperator::answering([true]);
    operator.merge_tool = Some("fake".to_string());

    merge::integrate(&git, &mut operator, &mut session)?;
    assert_eq!(session.state, SessionState::Merged);

    let report = cleanup::run(&git, &mut session);
    assert!(report.review_branch_deleted);

    assert_eq!(repo.read("b.txt"), "resolved\n");
    assert_eq!(repo.head_blob("b.txt"), "resolved\n");
    assert!(repo.head_message().contains("drover/1"));
    assert!(!repo.branch_exists("drover/1"));
    assert!(git.is_clean()?);
    Ok(())
}
