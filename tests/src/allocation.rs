use crate::fixtures::*;
use drover_core::session;
use drover_core::vcs::Vcs;

#[test]
fn allocation_takes_the_dual_source_max() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.branch_from_head("drover/1");
    repo.branch_from_head("drover/3");
    repo.write("note.txt", "x\n");
    repo.commit_all("Merge review branch 'drover/5'");

    let next = session::next_review_branch(&repo.git(), "drover")?;
    assert_eq!(next, "drover/6");
    Ok(())
}

#[test]
fn allocation_ignores_foreign_prefixes() -> TestResult {
    let repo = IntegrationRepo::new()?;
    repo.branch_from_head("other/9");
    repo.branch_from_head("my-drover/12");
    repo.write("note.txt", "x\n");
    repo.commit_all("touch other/7 and my-drover/8");

    let next = session::next_review_branch(&repo.git(), "drover")?;
    assert_eq!(next, "drover/1");
    Ok(())
}

#[test]
fn allocation_survives_branch_deletion_through_history() -> TestResult {
    let repo = IntegrationRepo::new()?;
    let git = repo.git();
    let origin = repo.origin_branch();

    git.create_and_checkout("drover/4")?;
    repo.write("gen.txt", "generated\n");
    repo.commit_all("review commit");
    git.checkout(&origin)?;
    git.merge_no_commit("drover/4")?;
    git.commit("Merge review branch 'drover/4'")?;
    git.delete_branch("drover/4")?;

    let next = session::next_review_branch(&git, "drover")?;
    assert_eq!(next, "drover/5");
    Ok(())
}
