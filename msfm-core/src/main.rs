//! src/main.rs
//! `msfm`: command-line front end for the file manager engine

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use clap::{Parser, Subcommand};
use clipr::ClipboardOperation;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use msfm_core::{
    FileManager, Logger,
    config::Config,
    fs::{DirEntry, SortMode, path::{file_name, parent_path}},
    operators::{Outcome, Progress},
};

#[derive(Parser, Debug)]
#[command(name = "msfm")]
#[command(about = "File manager for memory-card style volumes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory, e.g. `ms0:/PSP/GAME`
    Ls {
        path: String,

        /// 0 name asc, 1 name desc, 2 size desc, 3 size asc
        #[arg(long, short = 's', value_parser = clap::value_parser!(u8).range(0..=3))]
        sort: Option<u8>,
    },

    /// Copy a file or directory into DEST_DIR
    Cp { src: String, dest_dir: String },

    /// Move a file or directory into DEST_DIR (same volume only)
    Mv { src: String, dest_dir: String },

    /// Delete a file or a whole directory tree
    Rm { path: String },

    /// Create a directory
    Mkdir { path: String },

    /// Show capacity of a volume, e.g. `ms0`
    Df { volume: String },
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let cli: Cli = Cli::parse();

    let config: Config = match &cli.config {
        Some(path) => Config::load_from(path).await,
        None => Config::load().await,
    }
    .context("Failed to load configuration")?;

    let _guard = Logger::init(&config.logging, cli.verbose)?;
    debug!(?cli, "Starting");

    let mut fm: FileManager =
        FileManager::from_config(&config).context("Failed to open storage")?;

    match cli.command {
        Command::Ls { path, sort } => {
            if let Some(mode) = sort {
                fm.set_sort_mode(SortMode::try_from(mode).map_err(anyhow::Error::msg)?);
            }

            let entries: Vec<DirEntry> = fm.change_directory(&path)?.to_vec();
            print_listing(&entries);
        }

        Command::Cp { src, dest_dir } => {
            stage(&mut fm, &src, &dest_dir, ClipboardOperation::Copy)?;
            let outcome: Outcome = run_paste(fm).await?;
            report(outcome);
        }

        Command::Mv { src, dest_dir } => {
            stage(&mut fm, &src, &dest_dir, ClipboardOperation::Cut)?;
            let outcome: Outcome = fm.move_pending()?;
            report(outcome);
        }

        Command::Rm { path } => {
            let outcome: Outcome = run_delete(fm, path).await?;
            report(outcome);
        }

        Command::Mkdir { path } => {
            fm.change_directory(&parent_path(&path))?;
            fm.make_dir(file_name(&path))?;
        }

        Command::Df { volume } => {
            let total: u64 = fm.query_total_space(&volume)?;
            let free: u64 = fm.query_free_space(&volume)?;
            let used: u64 = fm.query_used_space(&volume)?;

            println!(
                "{volume}: {} total, {} used, {} free",
                ByteSize::b(total),
                ByteSize::b(used),
                ByteSize::b(free)
            );
        }
    }

    info!("Done");
    Ok(())
}

/// Put `src` on the clipboard and make `dest_dir` the working directory,
/// the same two steps the interactive view performs.
fn stage(fm: &mut FileManager, src: &str, dest_dir: &str, op: ClipboardOperation) -> Result<()> {
    let entry: DirEntry = fm.stat(src)?;

    fm.set_clipboard(&entry, &parent_path(src), op)?;
    fm.change_directory(dest_dir)
        .with_context(|| format!("Cannot open destination {dest_dir}"))?;

    Ok(())
}

/// Ctrl-C trips the token; the engine sees it at the next chunk or entry.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token: CancellationToken = CancellationToken::new();
    let child: CancellationToken = token.clone();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            eprintln!("\nCanceling...");
            child.cancel();
        }
    });

    token
}

async fn run_paste(mut fm: FileManager) -> Result<Outcome> {
    let token: CancellationToken = cancel_on_ctrl_c();

    tokio::task::spawn_blocking(move || -> Result<Outcome> {
        let mut last: Option<(String, u8)> = None;

        let mut sink = |p: &Progress| {
            let pct: u8 = p.percent();
            let changed: bool = last
                .as_ref()
                .is_none_or(|(label, prev)| *prev != pct || label != p.label.as_str());

            if changed {
                eprintln!("{} {pct:>3}%", p.label);
                last = Some((p.label.to_string(), pct));
            }
        };

        Ok(fm.paste(&mut sink, &token)?)
    })
    .await
    .context("Copy task panicked")?
}

async fn run_delete(mut fm: FileManager, path: String) -> Result<Outcome> {
    let token: CancellationToken = cancel_on_ctrl_c();

    tokio::task::spawn_blocking(move || -> Result<Outcome> {
        let entry: DirEntry = fm.stat(&path)?;
        let outcome: Outcome = fm.delete_path(&path, entry.is_dir, &token)?;
        let stats = fm.last_stats();

        info!(
            files = stats.files_removed,
            dirs = stats.dirs_removed,
            "Removed"
        );

        Ok(outcome)
    })
    .await
    .context("Delete task panicked")?
}

fn report(outcome: Outcome) {
    if !outcome.is_completed() {
        println!("Canceled; entries already processed were left in place.");
    }
}

fn print_listing(entries: &[DirEntry]) {
    for e in entries {
        let size: String = if e.is_dir {
            "<DIR>".to_string()
        } else {
            e.size_human()
        };

        println!(
            "{} {:>10} {} {}",
            e.mode.permission_string(),
            size,
            e.modified,
            e.name
        );
    }
}
