use git2::{BranchType, IndexAddOption, Oid, Repository, Signature};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use drover_core::operator::{Operator, spawn_viewer};
use drover_core::vcs::{GitCli, Vcs};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A real repository in a tempdir with one initial commit, plus a
/// scratch directory for fake viewer/merge scripts that must live
/// outside the working tree.
pub struct IntegrationRepo {
    tempdir: TempDir,
    scripts: TempDir,
    pub repo: Repository,
}

impl IntegrationRepo {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let tempdir = TempDir::new()?;
        let scripts = TempDir::new()?;
        let repo = Repository::init(tempdir.path())?;
        {
            let mut config = repo.config()?;
            config.set_str("user.name", "Tester")?;
            config.set_str("user.email", "tester@example.com")?;
            config.set_bool("commit.gpgsign", false)?;
        }
        let fixture = IntegrationRepo {
            tempdir,
            scripts,
            repo,
        };
        fixture.write("README.md", "integration fixture\n");
        fixture.commit_all("initial");
        Ok(fixture)
    }

    pub fn path(&self) -> &Path {
        self.tempdir.path()
    }

    pub fn git(&self) -> GitCli {
        GitCli::new(self.tempdir.path())
    }

    pub fn origin_branch(&self) -> String {
        self.repo.head().unwrap().shorthand().unwrap().to_string()
    }

    pub fn current_branch(&self) -> Option<String> {
        self.git().current_branch().unwrap()
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    pub fn branch_from_head(&self, name: &str) {
        let commit = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo.branch(name, &commit, false).unwrap();
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.tempdir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.sync_all().unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.tempdir.path().join(rel)).unwrap()
    }

    pub fn commit_all(&self, msg: &str) -> Oid {
        let mut idx = self.repo.index().unwrap();
        idx.read(true).unwrap();
        idx.add_all(["."], IndexAddOption::DEFAULT, None).unwrap();
        idx.write().unwrap();
        let tree_id = idx.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = self
            .repo
            .signature()
            .or_else(|_| Signature::now("Tester", "tester@example.com"))
            .unwrap();
        let parent_opt = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent_opt.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, msg, &tree, &parents)
            .unwrap()
    }

    pub fn head_oid(&self) -> Oid {
        self.repo.head().unwrap().peel_to_commit().unwrap().id()
    }

    pub fn head_message(&self) -> String {
        self.repo
            .head()
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .message()
            .unwrap_or_default()
            .to_string()
    }

    pub fn head_contains(&self, rel: &str) -> bool {
        let tree = self.repo.head().unwrap().peel_to_tree().unwrap();
        tree.get_path(Path::new(rel)).is_ok()
    }

    pub fn head_blob(&self, rel: &str) -> String {
        let tree = self.repo.head().unwrap().peel_to_tree().unwrap();
        let entry = tree.get_path(Path::new(rel)).expect("path present in HEAD");
        let blob = self.repo.find_blob(entry.id()).unwrap();
        String::from_utf8_lossy(blob.content()).into_owned()
    }

    pub fn set_config(&self, key: &str, value: &str) {
        self.repo.config().unwrap().set_str(key, value).unwrap();
    }

    /// Drop an executable script into the scratch directory.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.scripts.path().join(name);
        fs::write(&path, body).unwrap();
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).unwrap();
        }
        path
    }
}

/// Operator whose prompt answers are queued up front and whose viewer
/// is an executable script, so the engine's real suspension points run
/// without a terminal.
#[derive(Default)]
pub struct ScriptedOperator {
    pub answers: VecDeque<bool>,
    pub merge_tool: Option<String>,
    pub viewer: Option<PathBuf>,
}

impl ScriptedOperator {
    pub fn answering<const N: usize>(answers: [bool; N]) -> Self {
        ScriptedOperator {
            answers: VecDeque::from(answers.to_vec()),
            ..ScriptedOperator::default()
        }
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(self
            .answers
            .pop_front()
            .expect("unexpected confirmation prompt"))
    }

    fn choose_merge_tool(&mut self) -> io::Result<Option<String>> {
        Ok(self.merge_tool.clone())
    }

    fn view_diff(&mut self, indexed: &Path, working: &Path) -> io::Result<bool> {
        let Some(script) = &self.viewer else {
            return Ok(true);
        };
        spawn_viewer(script.to_str().expect("script path is utf8"), indexed, working)
    }
}
