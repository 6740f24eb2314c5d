use colored::*;
use lazy_static::lazy_static;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Debug,
}

lazy_static! {
    static ref VERBOSITY: RwLock<Verbosity> = RwLock::new(Verbosity::Normal);
}

pub fn set_verbosity(verbosity: Verbosity) {
    *VERBOSITY.write().unwrap() = verbosity;
}

pub fn verbosity() -> Verbosity {
    *VERBOSITY.read().unwrap()
}

/// All session reporting funnels through here; stderr only, so piped
/// stdout stays machine-clean.
pub fn emit(level: LogLevel, message: impl AsRef<str>) {
    let visible = match level {
        LogLevel::Debug => verbosity() == Verbosity::Debug,
        LogLevel::Info => verbosity() != Verbosity::Quiet,
        LogLevel::Warn | LogLevel::Error => true,
    };

    if !visible {
        return;
    }

    let message = message.as_ref();
    match level {
        LogLevel::Debug => eprintln!("{} {message}", "debug:".dimmed()),
        LogLevel::Info => eprintln!("{message}"),
        LogLevel::Warn => eprintln!("{} {message}", "warning:".yellow()),
        LogLevel::Error => eprintln!("{} {message}", "error:".red()),
    }
}

pub fn debug(message: impl AsRef<str>) {
    emit(LogLevel::Debug, message);
}

pub fn info(message: impl AsRef<str>) {
    emit(LogLevel::Info, message);
}

pub fn warn(message: impl AsRef<str>) {
    emit(LogLevel::Warn, message);
}

pub fn format_label_value_block(rows: &[(String, String)], indent: usize) -> String {
    let width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);

    let padding = " ".repeat(indent);
    rows.iter()
        .map(|(label, value)| {
            let fill = " ".repeat(width.saturating_sub(label.chars().count()));
            format!("{padding}{label}{fill}  {value}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_block(rows: Vec<(String, String)>) -> String {
    format_label_value_block(&rows, 0)
}
