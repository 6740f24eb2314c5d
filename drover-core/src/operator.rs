use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Command;

/// The blocking-interaction seam. Every point where the engine
/// suspends on a human (confirmation prompts, merge-tool selection,
/// the external diff viewer) is a method here, so the state machine
/// has a defined resumption contract instead of inline blocking calls,
/// and tests can script the answers.
pub trait Operator {
    /// Yes/no question. The default answer is "no".
    fn confirm(&mut self, question: &str) -> io::Result<bool>;

    /// Which merge tool to hand conflicts to; `None` lets the backend
    /// pick its configured default. Asked at most once per session.
    fn choose_merge_tool(&mut self) -> io::Result<Option<String>>;

    /// Launch the external diff viewer against the indexed copy and
    /// the working copy, blocking until it exits. Exit 0 accepts the
    /// working copy's content; nonzero abandons this file's edit.
    fn view_diff(&mut self, indexed: &Path, working: &Path) -> io::Result<bool>;
}

/// Launch `tool left right` and block. Exit 0 means accept.
pub fn spawn_viewer(tool: &str, left: &Path, right: &Path) -> io::Result<bool> {
    let status = Command::new(tool).arg(left).arg(right).status()?;
    Ok(status.success())
}

/// Terminal-backed operator: questions on stderr, answers from stdin.
pub struct ConsoleOperator {
    diff_tool: Option<String>,
    merge_tool: Option<String>,
    chosen_merge_tool: Option<Option<String>>,
}

impl ConsoleOperator {
    pub fn new(diff_tool: Option<String>, merge_tool: Option<String>) -> Self {
        ConsoleOperator {
            diff_tool,
            merge_tool,
            chosen_merge_tool: None,
        }
    }

    fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl Operator for ConsoleOperator {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        eprint!("{question}");
        io::stderr().flush()?;
        let answer = self.read_line()?.to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    fn choose_merge_tool(&mut self) -> io::Result<Option<String>> {
        if let Some(choice) = &self.chosen_merge_tool {
            return Ok(choice.clone());
        }

        let choice = match &self.merge_tool {
            Some(tool) => Some(tool.clone()),
            None => {
                eprint!("Merge tool to use (empty for the git default): ");
                io::stderr().flush()?;
                let answer = self.read_line()?;
                if answer.is_empty() { None } else { Some(answer) }
            }
        };

        self.chosen_merge_tool = Some(choice.clone());
        Ok(choice)
    }

    fn view_diff(&mut self, indexed: &Path, working: &Path) -> io::Result<bool> {
        let Some(tool) = &self.diff_tool else {
            return Err(io::Error::other(
                "no diff viewer configured; set diff_tool or pass --tool",
            ));
        };
        spawn_viewer(tool, indexed, working)
    }
}
