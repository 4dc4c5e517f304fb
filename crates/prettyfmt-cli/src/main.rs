#![deny(unsafe_code)]

//! prettyfmt CLI: format files through the Prettier command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prettyfmt_config::{LayerKind, OptionLayer, SettingsCache};
use prettyfmt_core::eligibility::{self, EligibilityDecision};
use prettyfmt_core::{
    BufferId, FileContext, FormatOutcome, FormatRequest, FormatSession, MemoryBuffer, Prepared,
    SystemRunner, TextRange, Trigger,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// prettyfmt: run Prettier over files and selections.
#[derive(Parser)]
#[command(name = "prettyfmt", version, about, long_about = None)]
struct Cli {
    /// Default settings layer (JSON, .sublime-settings or TOML).
    #[arg(long)]
    default_settings: Option<PathBuf>,

    /// User settings layer.
    #[arg(long)]
    user_settings: Option<PathBuf>,

    /// Project settings layer.
    #[arg(long, default_value = "prettyfmt.toml")]
    project_settings: PathBuf,

    /// Project root; formatter runs here and config lookup stops here.
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a file in place.
    Format {
        file: PathBuf,

        /// Byte range to format instead of the whole file (repeatable).
        #[arg(long = "selection", value_name = "START..END", value_parser = parse_range)]
        selections: Vec<TextRange>,

        /// Behave as if the file were being saved.
        #[arg(long)]
        on_save: bool,

        /// Print the result instead of writing the file.
        #[arg(long)]
        stdout: bool,
    },

    /// Report whether a file would be formatted.
    Check {
        file: PathBuf,

        /// Apply the save-time rules.
        #[arg(long)]
        on_save: bool,
    },

    /// Print the effective settings.
    Settings {
        /// Print TOML instead of JSON.
        #[arg(long)]
        toml: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cache = Arc::new(load_settings(&cli).await?);

    match cli.command {
        Commands::Format {
            ref file,
            ref selections,
            on_save,
            stdout,
        } => {
            let trigger = if on_save { Trigger::Save } else { Trigger::Manual };
            cmd_format(&cli, cache, file, selections, trigger, stdout).await?
        }
        Commands::Check { ref file, on_save } => {
            let trigger = if on_save { Trigger::Save } else { Trigger::Manual };
            cmd_check(&cache, file, trigger).await?
        }
        Commands::Settings { toml } => cmd_settings(&cache, toml)?,
    }

    Ok(())
}

async fn cmd_format(
    cli: &Cli,
    cache: Arc<SettingsCache>,
    file: &Path,
    selections: &[TextRange],
    trigger: Trigger,
    to_stdout: bool,
) -> Result<()> {
    let path = std::path::absolute(file)
        .with_context(|| format!("invalid path {}", file.display()))?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_size = text.len() as u64;

    let mut buffer = selections
        .iter()
        .fold(MemoryBuffer::new(text), |buffer, &range| buffer.with_selection(range));

    let request = FormatRequest {
        buffer_id: BufferId::from(path.as_path()),
        file: file_context(cli, &path),
        file_size,
        trigger,
    };

    let whole_file = selections.is_empty() || trigger == Trigger::Save;
    let session = Arc::new(FormatSession::new(cache, SystemRunner::default()));
    let pending = match session.prepare(&request, &buffer)? {
        Prepared::Done(outcome) => {
            report(&outcome, whole_file);
            if to_stdout {
                print!("{}", buffer.as_str());
            }
            return Ok(());
        }
        Prepared::Pending(pending) => pending,
    };

    info!(path = %path.display(), invocations = pending.invocations(), "Running formatter");
    let mut handle = {
        let session = Arc::clone(&session);
        tokio::task::spawn_blocking(move || session.run(pending))
    };
    let completed = tokio::select! {
        completed = &mut handle => completed?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping formatter");
            session.cancel(&request.buffer_id);
            handle.await?
        }
    };

    let outcome = session.commit(completed, &mut buffer)?;
    report(&outcome, whole_file);

    if to_stdout {
        print!("{}", buffer.as_str());
    } else if let FormatOutcome::Formatted(r) = outcome
        && r.changed
    {
        write_atomic(&path, buffer.as_str())?;
    }
    Ok(())
}

async fn cmd_check(cache: &SettingsCache, file: &Path, trigger: Trigger) -> Result<()> {
    let size = tokio::fs::metadata(file)
        .await
        .with_context(|| format!("failed to stat {}", file.display()))?
        .len();
    let resolved = cache.resolve();
    match eligibility::check(file, size, trigger, &resolved.settings) {
        EligibilityDecision::Eligible => println!("{}: eligible", file.display()),
        EligibilityDecision::Ineligible(rejection) => println!(
            "{}: ineligible ({}): {rejection}",
            file.display(),
            rejection.code()
        ),
    }
    Ok(())
}

fn cmd_settings(cache: &SettingsCache, as_toml: bool) -> Result<()> {
    let resolved = cache.resolve();
    for warning in &resolved.warnings {
        eprintln!("warning: {warning}");
    }
    let rendered = if as_toml {
        toml::to_string_pretty(resolved.options.as_map())
            .map_err(|e| anyhow::anyhow!("TOML error: {e}"))?
    } else {
        serde_json::to_string_pretty(resolved.options.as_map())?
    };
    println!("{rendered}");
    Ok(())
}

fn report(outcome: &FormatOutcome, whole_file: bool) {
    let subject = if whole_file { "File" } else { "Selection(s)" };
    match outcome {
        FormatOutcome::Formatted(r) if r.changed => eprintln!("{subject} formatted."),
        FormatOutcome::Formatted(_) => eprintln!("{subject} already formatted."),
        FormatOutcome::NothingToFormat => eprintln!("Nothing to format in file."),
        FormatOutcome::Skipped(reason) => eprintln!("Skipped: {reason}."),
    }
}

fn file_context(cli: &Cli, path: &Path) -> FileContext {
    let file = FileContext::new(path);
    match &cli.project_root {
        Some(root) => {
            let root = std::path::absolute(root).unwrap_or_else(|_| root.clone());
            file.with_project_root(root)
        }
        None => file,
    }
}

async fn load_settings(cli: &Cli) -> Result<SettingsCache> {
    let default = load_layer(LayerKind::Default, cli.default_settings.as_deref()).await?;
    let user = load_layer(LayerKind::User, cli.user_settings.as_deref()).await?;
    let project = load_layer(LayerKind::Project, Some(&cli.project_settings)).await?;
    Ok(SettingsCache::new(default, user, project))
}

async fn load_layer(kind: LayerKind, path: Option<&Path>) -> Result<OptionLayer> {
    match path {
        Some(path) if path.exists() => OptionLayer::load(kind, path)
            .await
            .with_context(|| format!("failed to load {kind} settings from {}", path.display())),
        Some(path) => {
            info!(layer = %kind, path = %path.display(), "Settings file not found, using defaults");
            Ok(OptionLayer::empty(kind))
        }
        None => Ok(OptionLayer::empty(kind)),
    }
}

/// Replace `path` with `content` without leaving a half-written file,
/// keeping the original permissions.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = std::fs::metadata(path).map(|m| m.permissions()).ok();

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    if let Some(permissions) = permissions {
        std::fs::set_permissions(tmp.path(), permissions)?;
    }
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn parse_range(s: &str) -> Result<TextRange, String> {
    let (start, end) = s
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got {s:?}"))?;
    let start = start
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid start {start:?}: {e}"))?;
    let end = end
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid end {end:?}: {e}"))?;
    Ok(TextRange::new(start, end))
}
