use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use drover_core::{
    config::Config,
    display::{self, LogLevel, Verbosity},
    intake,
    operator::ConsoleOperator,
    session,
    staging::{NewFilePolicy, StagingStrategy},
    vcs::Vcs,
    workflow::{self, WorkflowOptions, WorkflowOutcome},
};

/// Land generated file batches through a reviewed, revertible git
/// merge.
#[derive(Parser, Debug)]
#[command(
    name = "drover",
    version,
    about,
    // Show help when you forget a subcommand
    arg_required_else_help = true,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug, Default)]
struct GlobalOpts {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Only report warnings and errors
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// TOML config file; defaults to .drover.toml at the repo root
    #[arg(short = 'C', long = "config-file", global = true)]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Review a batch of generated files and merge the accepted subset
    ///
    /// Examples:
    ///   drover apply batch.txt -m "Apply generated API stubs"
    ///   generator | drover apply - --policy auto-add
    Apply(ApplyCmd),

    /// Generate shell completions
    Completions(CompletionsCmd),
}

#[derive(ClapArgs, Debug)]
struct ApplyCmd {
    /// Batch file to read, or '-' for stdin
    #[arg(value_name = "INPUT")]
    input: Option<String>,

    /// Message for the review commit
    #[arg(short = 'm', long = "message")]
    message: Option<String>,

    /// What to do with files the repository does not track yet
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// External diff viewer; selects tool-mediated staging instead of
    /// the backend's hunk selection
    #[arg(long = "tool")]
    diff_tool: Option<String>,

    /// Merge tool for conflict resolution
    #[arg(long = "merge-tool")]
    merge_tool: Option<String>,

    /// Review branch prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Working tree to operate on; defaults to the current directory
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    AutoAdd,
    AutoSkip,
    Prompt,
}

impl From<PolicyArg> for NewFilePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::AutoAdd => NewFilePolicy::AutoAdd,
            PolicyArg::AutoSkip => NewFilePolicy::AutoSkip,
            PolicyArg::Prompt => NewFilePolicy::Prompt,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct CompletionsCmd {
    /// Shell to emit completions for
    #[arg(value_enum)]
    shell: Shell,
}

fn read_all_stdin() -> Result<String, io::Error> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn read_batch(input: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    match input {
        Some("-") => {
            let batch = read_all_stdin()?;
            if batch.trim().is_empty() {
                return Err("stdin is empty; provide INPUT or pipe content".into());
            }
            Ok(batch)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            // No positional; try stdin if it's not a TTY (i.e., piped or redirected)
            if !io::stdin().is_terminal() {
                let batch = read_all_stdin()?;
                if batch.trim().is_empty() {
                    return Err("stdin is empty; provide INPUT or pipe content".into());
                }
                Ok(batch)
            } else {
                Err("no INPUT provided; pass a batch file, use '-', or pipe stdin".into())
            }
        }
    }
}

fn short_hash(hash: &str) -> String {
    const MAX: usize = 8;
    if hash.len() <= MAX {
        hash.to_string()
    } else {
        hash.chars().take(MAX).collect()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.global.debug {
        display::set_verbosity(Verbosity::Debug);
    } else if cli.global.quiet {
        display::set_verbosity(Verbosity::Quiet);
    }

    match cli.command {
        Commands::Completions(cmd) => {
            let mut command = Cli::command();
            clap_complete::generate(cmd.shell, &mut command, "drover", &mut io::stdout());
            Ok(())
        }
        Commands::Apply(cmd) => run_apply(cmd, &cli.global),
    }
}

fn run_apply(cmd: ApplyCmd, global: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let start = match &cmd.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let vcs = session::resolve_root(&start)?;

    let mut cfg = match &global.config_file {
        Some(path) => Config::from_path(path)?,
        None => Config::load(vcs.root())?,
    };

    if let Some(policy) = cmd.policy {
        cfg.new_file_policy = policy.into();
    }
    if let Some(prefix) = &cmd.prefix {
        cfg.branch_prefix = prefix.clone();
    }
    if let Some(tool) = &cmd.diff_tool {
        cfg.diff_tool = Some(tool.clone());
        cfg.staging = StagingStrategy::ExternalTool;
    }
    if let Some(tool) = &cmd.merge_tool {
        cfg.merge_tool = Some(tool.clone());
    }

    if cfg.staging == StagingStrategy::ExternalTool && cfg.diff_tool.is_none() {
        return Err("external-tool staging requires --tool or diff_tool in the config".into());
    }

    let raw = read_batch(cmd.input.as_deref())?;
    let files = intake::parse(&raw)?;
    if files.is_empty() {
        display::info("batch is empty; nothing to do");
        return Ok(());
    }

    let message = cmd
        .message
        .clone()
        .unwrap_or_else(|| format!("Apply {} generated file(s)", files.len()));

    let opts = WorkflowOptions {
        branch_prefix: cfg.branch_prefix.clone(),
        commit_message: message,
        policy: cfg.new_file_policy,
        strategy: cfg.staging,
    };
    let mut operator = ConsoleOperator::new(cfg.diff_tool.clone(), cfg.merge_tool.clone());

    match workflow::run_review(&vcs, &mut operator, &files, &opts) {
        Ok(WorkflowOutcome::Merged {
            review_branch,
            origin_branch,
            merge_commit,
        }) => {
            println!(
                "{}",
                display::format_block(vec![
                    ("Outcome".to_string(), "Merge complete".to_string()),
                    ("Review branch".to_string(), review_branch),
                    ("Target".to_string(), origin_branch),
                    ("Merge commit".to_string(), short_hash(&merge_commit)),
                ])
            );
            Ok(())
        }
        Ok(WorkflowOutcome::NothingToDo { origin_branch }) => {
            println!(
                "{}",
                display::format_block(vec![
                    ("Outcome".to_string(), "Nothing to merge".to_string()),
                    ("Target".to_string(), origin_branch),
                ])
            );
            Ok(())
        }
        Err(err) => {
            display::emit(LogLevel::Error, err.to_string());
            std::process::exit(1);
        }
    }
}
