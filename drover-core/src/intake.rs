use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path};

use crate::staging::CandidateFile;
use crate::vcs::normalize_pathspec;

/// Record header of the batch format: `===> relative/path`, body runs
/// until the next header or end of input.
pub const HEADER: &str = "===>";

#[derive(Debug)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch input line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a batch listing into candidate files, preserving input order.
/// Duplicate paths pass through as-is; the writer applies them in
/// order, so the last occurrence wins.
pub fn parse(input: &str) -> Result<Vec<CandidateFile>, ParseError> {
    let mut files = Vec::new();
    let mut current: Option<(String, String)> = None;

    for (idx, line) in input.lines().enumerate() {
        if let Some(raw) = line.strip_prefix(HEADER) {
            let path = normalize_pathspec(raw);
            validate_path(&path).map_err(|message| ParseError {
                line: idx + 1,
                message,
            })?;
            if let Some((path, body)) = current.take() {
                files.push(CandidateFile {
                    path,
                    content: body.into_bytes(),
                });
            }
            current = Some((path, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        } else if !line.trim().is_empty() {
            return Err(ParseError {
                line: idx + 1,
                message: format!("content before the first `{HEADER}` header"),
            });
        }
    }

    if let Some((path, body)) = current.take() {
        files.push(CandidateFile {
            path,
            content: body.into_bytes(),
        });
    }

    Ok(files)
}

fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty file path".to_string());
    }
    let p = Path::new(path);
    if p.is_absolute() {
        return Err(format!("absolute path not allowed: {path}"));
    }
    for component in p.components() {
        if matches!(component, Component::ParentDir) {
            return Err(format!("path escapes the destination root: {path}"));
        }
    }
    Ok(())
}

/// Write each candidate beneath `root`, creating parent directories as
/// needed. Applied in order: later duplicates overwrite earlier ones.
pub fn materialize(root: &Path, files: &[CandidateFile]) -> io::Result<()> {
    for file in files {
        let dest = root.join(&file.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &file.content)?;
    }
    Ok(())
}
