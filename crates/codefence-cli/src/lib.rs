use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use codefence_config::{Config, ConfigError, LoadOptions};
use codefence_core::{
    AssumeYes, ConfirmationGate, ExitCode, FenceError, FsStore, Operations, Report,
};
use codefence_utils::normalize_store_path;
use serde_json::json;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli) {
        Ok(code) => Ok(code),
        Err(err) => match classify(&err) {
            Some(code) => {
                eprintln!("codefence error: {err}");
                Ok(code as i32)
            }
            None => Err(err),
        },
    }
}

fn execute(cli: Cli) -> Result<i32> {
    let Cli {
        global, command, ..
    } = cli;

    let cwd = std::env::current_dir()?;
    let vault = match &global.vault {
        Some(vault) => cwd.join(vault),
        None => cwd.clone(),
    };
    let mut options = LoadOptions::default().with_working_dir(&vault);
    if let Some(path) = &global.config {
        // Relative to the shell, not the vault.
        options = options.with_override_path(cwd.join(path));
    }
    let mut config = Config::load(options)?;
    tracing::debug!(vault = %vault.display(), root = %config.project.root, "configuration loaded");

    let store = FsStore::new(&vault);
    let gate: &dyn ConfirmationGate = if global.yes {
        &AssumeYes
    } else {
        &TerminalGate
    };
    let ops = Operations::new(&store, gate);

    match command {
        Command::Convert(args) => {
            apply_root(&mut config, args.root)?;
            let report = ops.convert_tree(&config)?;
            emit_report("convert", &report, global.json)
        }
        Command::Undo(args) => {
            let file = store_file_path(&args.file)?;
            let report = ops.undo_single_file(&config, &file)?;
            emit_report("undo", &report, global.json)
        }
        Command::UndoAll(args) => {
            apply_root(&mut config, args.root)?;
            let report = ops.undo_tree(&config)?;
            emit_report("undo-all", &report, global.json)
        }
        Command::Config => emit_config(&config, global.json),
    }
}

/// Exit code for an error that escaped [`run`].
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    classify(err).unwrap_or(ExitCode::Failure) as i32
}

/// Typed failures get a dedicated exit code; anything else falls through to `main`.
fn classify(err: &anyhow::Error) -> Option<ExitCode> {
    if let Some(err) = err.downcast_ref::<FenceError>() {
        return Some(err.exit_code());
    }
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<CliError>().is_some() {
        return Some(ExitCode::Config);
    }
    None
}

#[derive(Debug, Error)]
enum CliError {
    #[error("--root {0:?} escapes the vault")]
    RootOutsideVault(String),
    #[error("{0:?} escapes the vault")]
    FileOutsideVault(String),
}

/// Normalise a user-supplied file path, refusing `..` segments.
fn store_file_path(file: &str) -> Result<String, CliError> {
    let normalized = normalize_store_path(file);
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(CliError::FileOutsideVault(file.to_string()));
    }
    Ok(normalized)
}

fn apply_root(config: &mut Config, root: Option<String>) -> Result<(), CliError> {
    let Some(root) = root else {
        return Ok(());
    };
    let normalized = normalize_store_path(&root);
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(CliError::RootOutsideVault(root));
    }
    config.project.root = normalized;
    Ok(())
}

fn emit_report(operation: &str, report: &Report, json: bool) -> Result<i32> {
    if json {
        let status = if report.is_declined() {
            "declined"
        } else {
            "completed"
        };
        let mut payload = json!({
            "operation": operation,
            "status": status,
            "count": report.count(),
            "notice": report.notice(),
        });
        if let Report::FileRestored { path } = report {
            payload["path"] = json!(path);
        }
        emit(&serde_json::to_string_pretty(&payload)?)?;
    } else {
        emit(&report.notice())?;
    }
    Ok(ExitCode::Success as i32)
}

fn emit_config(config: &Config, json: bool) -> Result<i32> {
    if json {
        let file_types: serde_json::Map<String, serde_json::Value> = config
            .catalog
            .categories()
            .map(|(name, extensions)| (name.to_string(), json!(extensions)))
            .collect();
        let languages: serde_json::Map<String, serde_json::Value> = config
            .languages
            .iter()
            .map(|(extension, tag)| (extension.to_string(), json!(tag)))
            .collect();
        let sources: Vec<String> = config
            .sources
            .layers
            .iter()
            .map(|source| source.describe())
            .collect();
        let payload = json!({
            "root": config.project.root,
            "file_types": file_types,
            "languages": languages,
            "undo": { "rename": config.undo.rename.as_str() },
            "sources": sources,
        });
        emit(&serde_json::to_string_pretty(&payload)?)?;
        return Ok(ExitCode::Success as i32);
    }

    let mut out = String::new();
    out.push_str(&format!("root: {}\n", config.project.root));
    out.push_str(&format!("undo.rename: {}\n", config.undo.rename));
    out.push_str("file_types:\n");
    for (name, extensions) in config.catalog.categories() {
        let joined: Vec<&str> = extensions.iter().map(String::as_str).collect();
        out.push_str(&format!("  {name} = \"{}\"\n", joined.join(", ")));
    }
    out.push_str("languages:\n");
    for (extension, tag) in config.languages.iter() {
        out.push_str(&format!("  {extension} = \"{tag}\"\n"));
    }
    out.push_str("sources:");
    for source in &config.sources.layers {
        out.push_str(&format!("\n  {}", source.describe()));
    }
    emit(&out)?;
    Ok(ExitCode::Success as i32)
}

fn emit(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Asks on stderr and reads one line from stdin. End of input declines.
struct TerminalGate;

impl ConfirmationGate for TerminalGate {
    fn confirm(&self, title: &str, message: &str) -> bool {
        let mut stderr = io::stderr().lock();
        if write!(stderr, "{title}: {message} [y/N] ")
            .and_then(|()| stderr.flush())
            .is_err()
        {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&answer),
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

#[derive(Parser, Debug)]
#[command(
    name = "codefence",
    version,
    about = "Wrap source files in Markdown code fences and unwrap them again"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Configuration file layered over the discovered ones.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory the store is rooted at (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    vault: Option<PathBuf>,

    /// Answer every confirmation with yes.
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Emit machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wrap every cataloged file under the root in a code fence.
    Convert(RootArgs),
    /// Restore a single wrapped file.
    Undo(UndoArgs),
    /// Restore every wrapped file under the root.
    UndoAll(RootArgs),
    /// Print the effective configuration and where it came from.
    Config,
}

#[derive(Args, Debug)]
struct RootArgs {
    /// Store-relative directory overriding `project.root`.
    #[arg(long, value_name = "DIR")]
    root: Option<String>,
}

#[derive(Args, Debug)]
struct UndoArgs {
    /// Store-relative path of the wrapped file.
    #[arg(value_name = "FILE")]
    file: String,
}
