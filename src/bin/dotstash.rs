// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotstash::{
    path::{absolutize, default_stash_dir},
    remote::{GitRemote, ProviderKind, RemoteStore},
    stash::Stash,
    store::StoreError,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(about, subcommand_help_heading = "Commands", version)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Storage(StorageCommand::Init(opts)) => run_storage_init(opts),
            command => run_tracked_command(command),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Mark files or directories for syncing.
    #[command(override_usage = "dotstash mark [paths]...")]
    Mark(MarkOptions),

    /// Show the paths of all files currently tracked for syncing.
    Show,

    /// Sync tracked dotfiles to remote storage.
    Sync,

    /// Pull tracked dotfiles from remote storage.
    Pull,

    /// Delete files from sync tracking and remove them from the stash.
    #[command(override_usage = "dotstash delete <paths>...")]
    Delete(DeleteOptions),

    /// Manage dotfile storage backends.
    #[command(subcommand)]
    Storage(StorageCommand),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MarkOptions {
    /// Files or directories to mark for syncing.
    #[arg(value_name = "path")]
    pub paths: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// Tracked files or directories to stop syncing.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Subcommand)]
enum StorageCommand {
    /// Initialize backend storage provider.
    #[command(override_usage = "dotstash storage init [options] --remote-url <url>")]
    Init(InitOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Storage provider to use (git).
    #[arg(short, long, value_name = "kind", default_value = "git")]
    pub provider: String,

    /// Remote address for the storage provider.
    #[arg(short, long, value_name = "url")]
    pub remote_url: String,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

/// Shared setup for every command other than storage initialization.
///
/// Resolves the stash location, opens it, reads the persisted provider
/// configuration, and constructs the gateway that gets passed explicitly
/// into the selected command. A missing provider configuration is fatal
/// here; only `storage init` may run without one.
fn run_tracked_command(command: Command) -> Result<()> {
    let mut stash = Stash::open(default_stash_dir()?)?;
    let (kind, location) = match stash.store().current_provider() {
        Ok(provider) => provider,
        Err(err @ StoreError::NotConfigured) => {
            return Err(anyhow::Error::new(err)
                .context("run 'dotstash storage init' to configure a storage provider"))
        }
        Err(err) => return Err(err.into()),
    };
    let kind: ProviderKind = kind.parse()?;
    let remote = match kind {
        ProviderKind::Git => GitRemote::new(location),
    };
    remote.initialize(stash.root())?;

    match command {
        Command::Mark(opts) => run_mark(&mut stash, opts),
        Command::Show => run_show(&stash),
        Command::Sync => run_sync(&stash, &remote),
        Command::Pull => run_pull(&mut stash, &remote),
        Command::Delete(opts) => run_delete(&mut stash, opts),
        // Storage init never reaches this path.
        Command::Storage(_) => Ok(()),
    }
}

fn run_storage_init(opts: InitOptions) -> Result<()> {
    let kind: ProviderKind = opts.provider.parse()?;
    let stash = Stash::open(default_stash_dir()?)?;
    stash.store().set_provider(kind.as_str(), &opts.remote_url)?;

    let remote = match kind {
        ProviderKind::Git => GitRemote::new(opts.remote_url),
    };
    remote.initialize(stash.root())?;

    println!("Storage initialized successfully.");
    Ok(())
}

fn run_mark(stash: &mut Stash, opts: MarkOptions) -> Result<()> {
    if opts.paths.is_empty() {
        println!("No changes.");
        return Ok(());
    }

    let paths = absolutize_all(&opts.paths)?;
    stash.mark(&paths)?;

    println!("Marked entries for syncing:");
    for path in paths {
        println!("  {}", path.display());
    }

    Ok(())
}

fn run_show(stash: &Stash) -> Result<()> {
    let records = stash.tracked()?;
    if records.is_empty() {
        println!("No files currently tracked for syncing.");
        return Ok(());
    }

    println!("Files currently tracked for syncing ({}):", records.len());
    for record in records {
        println!("  {}", record.path.display());
    }

    Ok(())
}

fn run_sync(stash: &Stash, remote: &impl RemoteStore) -> Result<()> {
    let report = stash.sync(remote)?;
    println!(
        "Sync complete ({} synced, {} failed).",
        report.mirrored.len(),
        report.failed.len()
    );

    Ok(())
}

fn run_pull(stash: &mut Stash, remote: &impl RemoteStore) -> Result<()> {
    println!("Pulling dotfiles...");
    let report = stash.pull(remote)?;

    if report.restored.is_empty() && report.skipped.is_empty() && report.failed.is_empty() {
        println!("No files found in record store. Nothing to pull.");
        return Ok(());
    }

    for path in &report.restored {
        println!("  restored: {}", path.display());
    }
    println!(
        "Pull complete ({} restored, {} skipped, {} failed).",
        report.restored.len(),
        report.skipped.len(),
        report.failed.len()
    );

    Ok(())
}

fn run_delete(stash: &mut Stash, opts: DeleteOptions) -> Result<()> {
    let paths = absolutize_all(&opts.paths)?;
    let report = stash.untrack(&paths)?;

    if report.removed.is_empty() && report.failed.is_empty() {
        println!("No matching files found in record store.");
        return Ok(());
    }

    if !report.removed.is_empty() {
        println!("Deleted {} file(s) from tracking:", report.removed.len());
        for path in &report.removed {
            println!("  {}", path.display());
        }
    }

    if !report.failed.is_empty() {
        println!("Failed to delete {} file(s):", report.failed.len());
        for (path, _) in &report.failed {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

fn absolutize_all(inputs: &[String]) -> Result<Vec<PathBuf>> {
    inputs
        .iter()
        .map(|input| {
            absolutize(input).with_context(|| format!("cannot resolve path {input:?}"))
        })
        .collect()
}
