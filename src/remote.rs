// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote storage gateway.
//!
//! Abstracts "where the stash tree lives remotely" behind a small capability
//! interface: initialize the binding, push the whole tree, pull the whole
//! tree. The rest of the crate depends only on [`RemoteStore`]; which
//! concrete backend gets constructed is decided once at startup from the
//! provider kind persisted in the record store.
//!
//! # Overwrite Semantics
//!
//! There is no merge engine here. A push fully replaces the remote's prior
//! state for the stash tree (last writer wins), and a pull fully replaces
//! the local tree with the remote's current state, discarding local
//! modifications that were never pushed. Equivalent to a hard reset plus
//! removal of untracked local files.
//!
//! # Backends
//!
//! Only a git-backed implementation exists today: local repository setup and
//! remote binding go through libgit2, while the actual network plumbing
//! (push, fetch, reset) shells out to the `git` binary.

use git2::{Repository, RepositoryInitOptions};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Capability interface over a remote stash store.
///
/// Each operation acts on the stash tree as a whole. One conforming
/// implementation exists per backend family.
pub trait RemoteStore {
    /// Prepare the remote-backed store for first use.
    ///
    /// Idempotent: an already-established binding counts as success.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Initialize`] on any backend error.
    fn initialize(&self, tree: &Path) -> Result<()>;

    /// Publish the entire current contents of the stash tree to the remote.
    ///
    /// Fully replaces the remote's prior state. No merge.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Push`] on any backend error.
    fn push(&self, tree: &Path) -> Result<()>;

    /// Replace the local stash tree with the remote's current state.
    ///
    /// Destructive overwrite of local modifications not yet pushed.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Pull`] on any backend error.
    fn pull(&self, tree: &Path) -> Result<()>;
}

/// Supported remote storage backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Git,
}

impl ProviderKind {
    /// Kind name as persisted in the record store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "git",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = RemoteError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "git" => Ok(Self::Git),
            other => Err(RemoteError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// Git-backed remote stash store.
#[derive(Debug, Clone)]
pub struct GitRemote {
    location: String,
}

impl GitRemote {
    /// Construct new git remote gateway bound to target clone address.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Remote clone address this gateway is bound to.
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl RemoteStore for GitRemote {
    /// Initialize the local stash tree as a repository bound to the remote.
    ///
    /// Creates the tree directory if missing, initializes a repository in it
    /// (reinitialization of an existing one is harmless), and binds the
    /// `origin` remote to the configured location. An `origin` that already
    /// exists is refreshed to point at the configured location rather than
    /// treated as an error.
    #[instrument(skip(self, tree), level = "debug")]
    fn initialize(&self, tree: &Path) -> Result<()> {
        info!("initialize remote storage binding at {:?}", tree.display());
        fs::create_dir_all(tree).map_err(RemoteError::CreateTree)?;

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repository = Repository::init_opts(tree, &opts).map_err(RemoteError::Initialize)?;

        match repository.find_remote("origin") {
            Ok(_) => {
                debug!("origin already bound, refreshing url to {}", self.location);
                repository
                    .remote_set_url("origin", &self.location)
                    .map_err(RemoteError::Initialize)?;
            }
            Err(_) => {
                repository
                    .remote("origin", &self.location)
                    .map_err(RemoteError::Initialize)?;
            }
        }

        Ok(())
    }

    #[instrument(skip(self, tree), level = "debug")]
    fn push(&self, tree: &Path) -> Result<()> {
        info!("pushing stash contents to remote storage");
        gitcall(tree, ["add", "-A"]).map_err(RemoteError::Push)?;

        // INVARIANT: A commit with nothing to commit fails, and that is fine.
        if let Err(err) = gitcall(tree, ["commit", "-m", "sync: update dotfiles"]) {
            debug!("commit skipped: {err}");
        }

        let branch = current_branch(tree);
        gitcall(tree, ["push", "--force", "-u", "origin", branch.as_str()])
            .map_err(RemoteError::Push)?;

        Ok(())
    }

    #[instrument(skip(self, tree), level = "debug")]
    fn pull(&self, tree: &Path) -> Result<()> {
        info!("pulling stash contents from remote storage");
        gitcall(tree, ["fetch", "origin"]).map_err(RemoteError::Pull)?;

        let branch = current_branch(tree);
        gitcall(tree, ["reset", "--hard", format!("origin/{branch}").as_str()])
            .map_err(RemoteError::Pull)?;
        gitcall(tree, ["clean", "-fd"]).map_err(RemoteError::Pull)?;

        Ok(())
    }
}

/// Resolve the branch currently checked out in the stash tree.
///
/// Falls back to "main" when the tree has no resolvable head yet, e.g.,
/// before the very first commit.
fn current_branch(tree: &Path) -> String {
    gitcall(tree, ["rev-parse", "--abbrev-ref", "HEAD"])
        .ok()
        .filter(|branch| !branch.is_empty() && branch.as_str() != "HEAD")
        .unwrap_or_else(|| "main".to_string())
}

fn gitcall(
    tree: &Path,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> std::io::Result<String> {
    let output = Command::new("git").current_dir(tree).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(stdout.as_str());
    }

    if !stderr.is_empty() {
        message.push_str(stderr.as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "git command failed:\n{message}"
        )));
    }

    Ok(message)
}

/// Remote storage gateway error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Stash tree directory cannot be created.
    #[error("failed to create stash tree directory")]
    CreateTree(#[source] std::io::Error),

    /// Remote storage binding cannot be established.
    #[error("failed to initialize remote storage binding")]
    Initialize(#[source] git2::Error),

    /// Stash contents cannot be published to the remote.
    #[error("failed to push stash to remote storage")]
    Push(#[source] std::io::Error),

    /// Stash contents cannot be replaced from the remote.
    #[error("failed to pull stash from remote storage")]
    Pull(#[source] std::io::Error),

    /// Provider kind other than the supported ones.
    #[error("unsupported storage provider {0:?}")]
    UnsupportedProvider(String),
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
