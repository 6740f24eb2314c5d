use std::path::{Path, PathBuf};
use std::process::Command;

use super::{MergeOutcome, RunMode, RunOutcome, Vcs, VcsError, normalize_pathspec};

/// Adapter over the system `git` binary, bound to one working tree.
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GitCli { root: root.into() }
    }

    /// Resolve `path` to the enclosing working-tree root.
    pub fn discover(path: &Path) -> Result<Self, VcsError> {
        let probe = GitCli::new(path);
        let out = probe.run(&["rev-parse", "--show-toplevel"], RunMode::Captured);
        if !out.success {
            return Err(VcsError::new("rev-parse", out.message()));
        }
        Ok(GitCli::new(PathBuf::from(out.stdout.trim())))
    }

    /// Run one git command against the bound tree.
    ///
    /// Assumptions:
    /// - Silent/Captured collect the child's output; Silent then drops
    ///   it, Captured returns it.
    /// - Interactive inherits this process's stdio so the command's
    ///   own UI reaches the terminal; nothing is captured.
    /// - Spawn failures and nonzero exits both come back as a
    ///   non-success outcome. This function itself never fails.
    pub fn run(&self, args: &[&str], mode: RunMode) -> RunOutcome {
        let mut command = Command::new("git");
        command.arg("-C").arg(&self.root).args(args);

        match mode {
            RunMode::Interactive => match command.status() {
                Ok(status) => RunOutcome {
                    success: status.success(),
                    code: status.code(),
                    stdout: String::new(),
                    stderr: String::new(),
                },
                Err(err) => spawn_failure(args, &err),
            },
            RunMode::Silent | RunMode::Captured => match command.output() {
                Ok(output) => {
                    let (stdout, stderr) = if mode == RunMode::Captured {
                        (
                            String::from_utf8_lossy(&output.stdout).into_owned(),
                            String::from_utf8_lossy(&output.stderr).into_owned(),
                        )
                    } else {
                        (String::new(), String::new())
                    };
                    RunOutcome {
                        success: output.status.success(),
                        code: output.status.code(),
                        stdout,
                        stderr,
                    }
                }
                Err(err) => spawn_failure(args, &err),
            },
        }
    }

    fn run_bytes(&self, args: &[&str]) -> Result<Vec<u8>, VcsError> {
        let op = args.first().copied().unwrap_or("git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|err| VcsError::new(op, format!("failed to spawn git: {err}")))?;
        if !output.status.success() {
            return Err(VcsError::new(
                op,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }

    fn expect_ok(&self, args: &[&str], mode: RunMode) -> Result<RunOutcome, VcsError> {
        let out = self.run(args, mode);
        if out.success {
            Ok(out)
        } else {
            Err(VcsError::new(
                args.first().copied().unwrap_or("git"),
                out.message(),
            ))
        }
    }

    /// Probe commands report through their exit code; exit 1 is an
    /// answer, not an error. A missing code means git never ran.
    fn probe(&self, args: &[&str]) -> Result<bool, VcsError> {
        let out = self.run(args, RunMode::Silent);
        if out.success {
            return Ok(true);
        }
        match out.code {
            Some(_) => Ok(false),
            None => Err(VcsError::new(
                args.first().copied().unwrap_or("git"),
                out.message(),
            )),
        }
    }
}

fn spawn_failure(args: &[&str], err: &std::io::Error) -> RunOutcome {
    RunOutcome {
        success: false,
        code: None,
        stdout: String::new(),
        stderr: format!(
            "failed to spawn git {}: {err}",
            args.first().copied().unwrap_or("")
        ),
    }
}

fn lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

impl Vcs for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    fn current_branch(&self) -> Result<Option<String>, VcsError> {
        let out = self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"], RunMode::Captured);
        if out.success {
            return Ok(Some(out.stdout.trim().to_string()));
        }
        // symbolic-ref refuses exactly when HEAD is detached; confirm
        // HEAD still resolves so a broken repo isn't mistaken for one.
        if self.probe(&["rev-parse", "--verify", "HEAD"])? {
            Ok(None)
        } else {
            Err(VcsError::new("symbolic-ref", "unable to resolve HEAD"))
        }
    }

    fn head_commit(&self) -> Result<String, VcsError> {
        let out = self.expect_ok(&["rev-parse", "--verify", "HEAD"], RunMode::Captured)?;
        Ok(out.stdout.trim().to_string())
    }

    fn branch_exists(&self, name: &str) -> Result<bool, VcsError> {
        let refname = format!("refs/heads/{name}");
        self.probe(&["show-ref", "--verify", "--quiet", &refname])
    }

    fn local_branches(&self) -> Result<Vec<String>, VcsError> {
        let out = self.expect_ok(
            &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
            RunMode::Captured,
        )?;
        Ok(lines(&out.stdout))
    }

    fn create_and_checkout(&self, name: &str) -> Result<(), VcsError> {
        self.expect_ok(&["checkout", "-b", name], RunMode::Captured)?;
        Ok(())
    }

    fn checkout(&self, name: &str) -> Result<(), VcsError> {
        self.expect_ok(&["checkout", "-f", name], RunMode::Captured)?;
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<(), VcsError> {
        self.expect_ok(&["branch", "-D", name], RunMode::Captured)?;
        Ok(())
    }

    fn is_clean(&self) -> Result<bool, VcsError> {
        let out = self.expect_ok(
            &["status", "--porcelain", "--untracked-files=no"],
            RunMode::Captured,
        )?;
        Ok(out.stdout.trim().is_empty())
    }

    fn is_tracked(&self, path: &str) -> Result<bool, VcsError> {
        let spec = normalize_pathspec(path);
        self.probe(&["ls-files", "--error-unmatch", "--", &spec])
    }

    fn worktree_differs(&self, path: &str) -> Result<bool, VcsError> {
        let spec = normalize_pathspec(path);
        let out = self.run(&["diff", "--quiet", "--", &spec], RunMode::Captured);
        match out.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(VcsError::new("diff", out.message())),
        }
    }

    fn indexed_content(&self, path: &str) -> Result<Vec<u8>, VcsError> {
        let spec = format!(":{}", normalize_pathspec(path));
        self.run_bytes(&["show", &spec])
    }

    fn stage_path(&self, path: &str) -> Result<(), VcsError> {
        let spec = normalize_pathspec(path);
        self.expect_ok(&["add", "--", &spec], RunMode::Captured)?;
        Ok(())
    }

    fn stage_interactive(&self, path: &str) -> Result<(), VcsError> {
        let spec = normalize_pathspec(path);
        self.expect_ok(&["add", "--patch", "--", &spec], RunMode::Interactive)?;
        Ok(())
    }

    fn staged_paths(&self) -> Result<Vec<String>, VcsError> {
        let out = self.expect_ok(&["diff", "--cached", "--name-only"], RunMode::Captured)?;
        Ok(lines(&out.stdout))
    }

    fn staged_diff(&self) -> Result<String, VcsError> {
        let out = self.expect_ok(&["diff", "--cached"], RunMode::Captured)?;
        Ok(out.stdout)
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.expect_ok(&["commit", "-m", message], RunMode::Captured)?;
        Ok(())
    }

    fn merge_no_commit(&self, branch: &str) -> Result<MergeOutcome, VcsError> {
        let out = self.run(&["merge", "--no-ff", "--no-commit", branch], RunMode::Captured);
        if out.success {
            return Ok(MergeOutcome::Clean);
        }
        let conflicts = self.conflicted_paths()?;
        if conflicts.is_empty() {
            return Err(VcsError::new("merge", out.message()));
        }
        Ok(MergeOutcome::Conflicted(conflicts))
    }

    fn merge_in_progress(&self) -> Result<bool, VcsError> {
        self.probe(&["rev-parse", "-q", "--verify", "MERGE_HEAD"])
    }

    fn abort_merge(&self) -> Result<(), VcsError> {
        self.expect_ok(&["merge", "--abort"], RunMode::Captured)?;
        Ok(())
    }

    fn conflicted_paths(&self) -> Result<Vec<String>, VcsError> {
        let out = self.expect_ok(
            &["diff", "--name-only", "--diff-filter=U"],
            RunMode::Captured,
        )?;
        Ok(lines(&out.stdout))
    }

    fn run_merge_tool(&self, tool: Option<&str>) -> Result<bool, VcsError> {
        // keepBackup off: stray .orig files would otherwise survive as
        // untracked residue the cleanup pass cannot account for.
        let mut args = vec!["-c", "mergetool.keepBackup=false", "mergetool", "--no-prompt"];
        let tool_flag;
        if let Some(tool) = tool {
            tool_flag = format!("--tool={tool}");
            args.push(&tool_flag);
        }
        let out = self.run(&args, RunMode::Interactive);
        if out.code.is_none() {
            return Err(VcsError::new("mergetool", out.message()));
        }
        Ok(out.success)
    }

    fn reset_hard(&self) -> Result<(), VcsError> {
        self.expect_ok(&["reset", "--hard", "HEAD"], RunMode::Captured)?;
        Ok(())
    }

    fn clean_untracked(&self, paths: &[&str]) -> Result<(), VcsError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["clean", "-fd", "--"];
        args.extend_from_slice(paths);
        self.expect_ok(&args, RunMode::Captured)?;
        Ok(())
    }

    fn log_messages_matching(&self, needle: &str) -> Result<String, VcsError> {
        let grep = format!("--grep={needle}");
        let out = self.run(
            &["log", "--all", "--fixed-strings", &grep, "--format=%B"],
            RunMode::Captured,
        );
        if !out.success {
            // An unborn repository has no log to search.
            return Ok(String::new());
        }
        Ok(out.stdout)
    }
}
