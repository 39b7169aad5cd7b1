//! skiff - a terminal file commander with an asynchronous operation engine.
//!
//! Usage:
//!   skiff cp <SRC>... <DEST>   Copy files or directories into DEST
//!   skiff mv <SRC>... <DEST>   Move files or directories into DEST
//!   skiff rm <TARGET>...       Delete files or directories
//!   skiff --help               Show help

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};

use skiff_core::{EngineConfig, JobId, JobKind, JobRequest, JobState, ProgressSnapshot};
use skiff_ops::{Clipboard, EngineEvent, JobQueue};

#[derive(Parser)]
#[command(
    name = "skiff",
    version,
    about = "A terminal file commander with asynchronous file operations",
    long_about = "skiff runs copy, move, and delete jobs on background workers\n\
                  with live progress, deterministic conflict renaming\n\
                  (file.txt -> file(1).txt), and safe cancellation via Ctrl-C."
)]
struct Cli {
    /// Output format for the final job summary
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy files or directories into a destination directory
    Cp {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Move files or directories into a destination directory
    Mv {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Delete files or directories
    Rm {
        /// Targets to delete
        #[arg(required = true)]
        targets: Vec<PathBuf>,

        /// Send to the OS trash instead of deleting permanently
        #[arg(long)]
        trash: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (queue, mut events) = JobQueue::new(EngineConfig::default());
    let mut clipboard = Clipboard::new();

    let id = match cli.command {
        Command::Cp { paths } => {
            let (sources, dest) = split_sources_dest(paths)?;
            clipboard.set_copy(sources);
            queue.paste(&mut clipboard, dest).context("paste failed")?
        }
        Command::Mv { paths } => {
            let (sources, dest) = split_sources_dest(paths)?;
            clipboard.set_cut(sources);
            queue.paste(&mut clipboard, dest).context("paste failed")?
        }
        Command::Rm { targets, trash } => {
            let targets = targets
                .into_iter()
                .map(|target| std::path::absolute(&target).context("invalid target path"))
                .collect::<Result<Vec<_>>>()?;
            queue.submit(JobRequest::delete(targets, trash))
        }
    };

    watch(&queue, &mut events, id, cli.format).await
}

/// Split a `<SRC>... <DEST>` argument list, making the sources absolute and
/// validating the destination directory.
fn split_sources_dest(mut paths: Vec<PathBuf>) -> Result<(Vec<PathBuf>, PathBuf)> {
    let dest = paths.pop().ok_or_else(|| eyre!("missing destination"))?;
    let dest = dest.canonicalize().context("invalid destination")?;
    if !dest.is_dir() {
        return Err(eyre!("destination is not a directory: {}", dest.display()));
    }

    let sources = paths
        .into_iter()
        .map(|path| std::path::absolute(&path).context("invalid source path"))
        .collect::<Result<Vec<_>>>()?;
    Ok((sources, dest))
}

/// Poll the job to a terminal state, rendering progress and cancelling on
/// Ctrl-C.
async fn watch(
    queue: &JobQueue,
    events: &mut tokio::sync::mpsc::Receiver<EngineEvent>,
    id: JobId,
    format: OutputFormat,
) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if queue.cancel(id) {
                    eprintln!();
                    eprintln!("Cancelling...");
                }
            }
            event = events.recv() => {
                if let Some(EngineEvent::JobTerminal { id: done, .. }) = event {
                    if done == id {
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if let Some(snapshot) = queue.snapshot(id) {
                    render_progress(&snapshot);
                    if snapshot.is_terminal() {
                        break;
                    }
                }
            }
        }
    }

    let snapshot = queue
        .snapshot(id)
        .ok_or_else(|| eyre!("job {id} vanished before completion"))?;
    queue.acknowledge(id);
    eprintln!();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text => print_summary(&snapshot),
    }

    if snapshot.state == JobState::Failed {
        return Err(eyre!("operation failed"));
    }
    Ok(())
}

/// Render a single in-place progress line.
fn render_progress(snapshot: &ProgressSnapshot) {
    let current = snapshot
        .current_file
        .as_deref()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if snapshot.total_bytes > 0 {
        eprint!(
            "\r{} {:>5.1}%  {} / {}  {}/s  {:<40}",
            snapshot.kind,
            snapshot.percentage(),
            format_size(snapshot.processed_bytes),
            format_size(snapshot.total_bytes),
            format_size(snapshot.bytes_per_second() as u64),
            truncate(&current, 40),
        );
    } else {
        eprint!(
            "\r{} {:>5.1}%  {} of {} items  {:<40}",
            snapshot.kind,
            snapshot.percentage(),
            snapshot.processed_items,
            snapshot.total_items,
            truncate(&current, 40),
        );
    }
}

/// Print the terminal outcome and any per-file errors.
fn print_summary(snapshot: &ProgressSnapshot) {
    let verb = match snapshot.kind {
        JobKind::Copy => "Copied",
        JobKind::Move => "Moved",
        JobKind::Delete => "Deleted",
    };

    match snapshot.state {
        JobState::Completed => {
            if snapshot.total_bytes > 0 {
                println!(
                    "{} {} in {:.2}s",
                    verb,
                    format_size(snapshot.processed_bytes),
                    snapshot.elapsed.as_secs_f64()
                );
            } else {
                println!(
                    "{} {} items in {:.2}s",
                    verb,
                    snapshot.processed_items,
                    snapshot.elapsed.as_secs_f64()
                );
            }
        }
        JobState::Cancelled => {
            println!("Cancelled after {}", format_size(snapshot.processed_bytes));
        }
        JobState::PartiallyFailed | JobState::Failed => {
            println!(
                "{} with {} error(s):",
                snapshot.state,
                snapshot.errors.len()
            );
            for error in &snapshot.errors {
                println!("  {error}");
            }
        }
        JobState::Queued | JobState::Running => {
            println!("{}", snapshot.state);
        }
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
