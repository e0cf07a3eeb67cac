// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Stash management and manipulation.
//!
//! The __stash__ is the local staging ground for everything dotstash tracks.
//! It is a single directory (default `$HOME/.dotstash`) holding the record
//! store file `state.db` plus a `files/` directory of cache slots, one slot
//! per tracked record id. The whole stash directory doubles as the working
//! tree bound to the remote store, so the record store travels with every
//! push and a fresh machine can restore from nothing but a pull.
//!
//! [`Stash`] glues the record store, the cache slot copy engine, and the
//! remote gateway together. A gateway instance is constructed once at
//! startup and passed explicitly into the operations that need one; there is
//! no ambient context lookup.
//!
//! # Failure Policy
//!
//! Passes over many records (sync-all, pull-all, untrack-all) never abort on
//! a single bad record. Per-record failures are collected into a report for
//! the caller to present, and the pass keeps going. Store-level and
//! gateway-level failures are fatal and surface as errors.

use crate::{
    cache::{self, CacheError},
    remote::{RemoteError, RemoteStore},
    store::{Store, StoreError, TrackedFile},
};

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const STORE_FILE: &str = "state.db";
const FILES_DIR: &str = "files";

/// Local staging ground for tracked dotfiles.
#[derive(Debug)]
pub struct Stash {
    store: Store,
    root: PathBuf,
}

impl Stash {
    /// Open stash at target root directory.
    ///
    /// Creates the root and its cache slot directory if missing, and opens
    /// the record store inside it.
    ///
    /// # Errors
    ///
    /// - Return [`StashError::CreateStashDir`] if the stash layout cannot be
    ///   created.
    /// - Return [`StashError::Store`] if the record store cannot be opened.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(FILES_DIR)).map_err(StashError::CreateStashDir)?;
        let store = Store::open(root.join(STORE_FILE))?;

        Ok(Self { store, root })
    }

    /// Stash root directory, the tree handed to the remote gateway.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one cache slot per tracked record id.
    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    /// Record store backing this stash.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Track a batch of absolute paths.
    ///
    /// Inserted as one all-or-nothing unit. Empty input is a no-op.
    ///
    /// # Errors
    ///
    /// - Return [`StashError::Store`] if the batch insert fails.
    pub fn mark(&mut self, paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<()> {
        Ok(self.store.insert_many(paths)?)
    }

    /// List every tracked record.
    ///
    /// # Errors
    ///
    /// - Return [`StashError::Store`] if the record store cannot be read.
    pub fn tracked(&self) -> Result<Vec<TrackedFile>> {
        Ok(self.store.list_all()?)
    }

    /// Mirror every tracked record into its cache slot, then push.
    ///
    /// Per-record copy failures are reported and skipped; the push still
    /// happens exactly once for the whole stash tree afterwards.
    ///
    /// # Errors
    ///
    /// - Return [`StashError::Store`] if the record listing fails.
    /// - Return [`StashError::Remote`] if the push fails.
    #[instrument(skip(self, remote), level = "debug")]
    pub fn sync<R: RemoteStore>(&self, remote: &R) -> Result<SyncReport> {
        let files_dir = self.files_dir();
        let mut report = SyncReport::default();

        for record in self.store.list_all()? {
            match cache::materialize(&record, &files_dir) {
                Ok(()) => report.mirrored.push(record.path),
                Err(err) => {
                    warn!("failed to mirror {:?}: {err}", record.path.display());
                    report.failed.push((record.path, err));
                }
            }
        }

        remote.push(&self.root)?;
        info!(
            "sync complete: {} mirrored, {} failed",
            report.mirrored.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Pull the stash tree from the remote, then restore every record.
    ///
    /// Records whose cache slot is missing are warned about and skipped;
    /// other per-record copy failures are reported. The pass never aborts on
    /// a single record.
    ///
    /// # Errors
    ///
    /// - Return [`StashError::Remote`] if the pull fails.
    /// - Return [`StashError::Store`] if the record store cannot be reopened
    ///   or read afterwards.
    #[instrument(skip(self, remote), level = "debug")]
    pub fn pull<R: RemoteStore>(&mut self, remote: &R) -> Result<PullReport> {
        remote.pull(&self.root)?;

        // INVARIANT: The pull replaced state.db wholesale; the old connection
        // still sees the pre-pull file, so reopen before reading records.
        self.store = Store::open(self.root.join(STORE_FILE))?;

        let files_dir = self.files_dir();
        let mut report = PullReport::default();

        for record in self.store.list_all()? {
            match cache::restore(&record, &files_dir) {
                Ok(()) => report.restored.push(record.path),
                Err(CacheError::SlotMissing { id, path }) => {
                    warn!(
                        "file with id {id} not found in stash, skipping {:?}",
                        path.display()
                    );
                    report.skipped.push(path);
                }
                Err(err) => {
                    warn!("failed to restore {:?}: {err}", record.path.display());
                    report.failed.push((record.path, err));
                }
            }
        }

        info!(
            "pull complete: {} restored, {} skipped, {} failed",
            report.restored.len(),
            report.skipped.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Stop tracking every record matching one of the given paths.
    ///
    /// Removes each matching record's cache slot, then deletes the surviving
    /// records from the store in one atomic batch. An already-absent slot
    /// still counts as a successful removal; a slot that exists but cannot
    /// be removed keeps its record tracked and lands in the failure list.
    ///
    /// # Errors
    ///
    /// - Return [`StashError::Store`] if the lookup or batch delete fails.
    #[instrument(skip(self, paths), level = "debug")]
    pub fn untrack(
        &mut self,
        paths: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<UntrackReport> {
        let records = self.store.find_by_paths(paths)?;
        let files_dir = self.files_dir();
        let mut report = UntrackReport::default();
        let mut doomed = Vec::new();

        for record in records {
            if !cache::slot_path(&record, &files_dir).exists() {
                warn!(
                    "file with id {} not found in stash: {:?}",
                    record.id,
                    record.path.display()
                );
            }

            match cache::remove_slot(&record, &files_dir) {
                Ok(()) => {
                    doomed.push(record.id);
                    report.removed.push(record.path);
                }
                Err(err) => {
                    warn!("failed to remove slot for {:?}: {err}", record.path.display());
                    report.failed.push((record.path, err));
                }
            }
        }

        self.store.delete_by_ids(&doomed)?;

        Ok(report)
    }
}

/// Outcome of a sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Paths successfully mirrored into their cache slots.
    pub mirrored: Vec<PathBuf>,

    /// Paths that could not be mirrored, with the reason.
    pub failed: Vec<(PathBuf, CacheError)>,
}

/// Outcome of a pull pass.
#[derive(Debug, Default)]
pub struct PullReport {
    /// Paths successfully restored from their cache slots.
    pub restored: Vec<PathBuf>,

    /// Paths skipped because their cache slot was missing.
    pub skipped: Vec<PathBuf>,

    /// Paths that could not be restored, with the reason.
    pub failed: Vec<(PathBuf, CacheError)>,
}

/// Outcome of an untrack pass.
#[derive(Debug, Default)]
pub struct UntrackReport {
    /// Paths removed from tracking.
    pub removed: Vec<PathBuf>,

    /// Paths still tracked because their slot could not be removed.
    pub failed: Vec<(PathBuf, CacheError)>,
}

/// Stash manipulation error types.
#[derive(Debug, thiserror::Error)]
pub enum StashError {
    /// Stash directory layout cannot be created.
    #[error("failed to create stash directory")]
    CreateStashDir(#[source] std::io::Error),

    /// Record store interaction fails.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote gateway interaction fails.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Friendly result alias :3
pub type Result<T, E = StashError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    /// Gateway double that records every tree it gets handed.
    #[derive(Debug, Default)]
    struct FakeRemote {
        pushes: RefCell<Vec<PathBuf>>,
        pulls: RefCell<Vec<PathBuf>>,
    }

    impl RemoteStore for FakeRemote {
        fn initialize(&self, _tree: &Path) -> remote::Result<()> {
            Ok(())
        }

        fn push(&self, tree: &Path) -> remote::Result<()> {
            self.pushes.borrow_mut().push(tree.to_path_buf());
            Ok(())
        }

        fn pull(&self, tree: &Path) -> remote::Result<()> {
            self.pulls.borrow_mut().push(tree.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn sync_mirrors_tracked_file_and_pushes_once() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path().join("stash");
        let source = temp.path().join(".bashrc");
        fs::write(&source, "export EDITOR=nvim\n")?;

        let mut stash = Stash::open(&root)?;
        stash.mark([&source])?;
        let records = stash.tracked()?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, source);

        let fake = FakeRemote::default();
        let report = stash.sync(&fake)?;
        assert_eq!(report.mirrored, vec![source.clone()]);
        assert_eq!(report.failed.len(), 0);

        let slot = stash.files_dir().join(records[0].id.to_string());
        assert_eq!(fs::read_to_string(slot)?, "export EDITOR=nvim\n");
        assert_eq!(*fake.pushes.borrow(), vec![root.clone()]);

        Ok(())
    }

    #[test]
    fn sync_continues_past_missing_sources() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path().join("stash");
        let good = temp.path().join(".vimrc");
        let gone = temp.path().join(".deleted");
        fs::write(&good, "set number\n")?;

        let mut stash = Stash::open(&root)?;
        stash.mark([&good, &gone])?;

        let fake = FakeRemote::default();
        let report = stash.sync(&fake)?;
        assert_eq!(report.mirrored, vec![good]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, gone);
        assert_eq!(fake.pushes.borrow().len(), 1);

        Ok(())
    }

    #[test]
    fn pull_restores_and_skips_missing_slots() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path().join("stash");
        let kept = temp.path().join(".vimrc");
        let lost = temp.path().join(".bashrc");
        fs::write(&kept, "set number\n")?;
        fs::write(&lost, "export SHELL=bash\n")?;

        let mut stash = Stash::open(&root)?;
        stash.mark([&kept, &lost])?;
        let fake = FakeRemote::default();
        stash.sync(&fake)?;

        // Drop one slot and both originals, then pull everything back.
        let records = stash.tracked()?;
        let lost_id = records
            .iter()
            .find(|rec| rec.path == lost)
            .map(|rec| rec.id)
            .unwrap();
        fs::remove_file(stash.files_dir().join(lost_id.to_string()))?;
        fs::remove_file(&kept)?;
        fs::remove_file(&lost)?;

        let report = stash.pull(&fake)?;
        assert_eq!(report.restored, vec![kept.clone()]);
        assert_eq!(report.skipped, vec![lost.clone()]);
        assert_eq!(report.failed.len(), 0);
        assert_eq!(fs::read_to_string(&kept)?, "set number\n");
        assert!(!lost.exists());
        assert_eq!(*fake.pulls.borrow(), vec![root.clone()]);

        Ok(())
    }

    #[test]
    fn untrack_succeeds_despite_missing_slot() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path().join("stash");
        let source = temp.path().join(".bashrc");
        fs::write(&source, "export EDITOR=nvim\n")?;

        let mut stash = Stash::open(&root)?;
        stash.mark([&source])?;
        let fake = FakeRemote::default();
        stash.sync(&fake)?;

        // Slot vanished out from under us before the untrack.
        let records = stash.tracked()?;
        fs::remove_file(stash.files_dir().join(records[0].id.to_string()))?;

        let report = stash.untrack([&source])?;
        assert_eq!(report.removed, vec![source]);
        assert_eq!(report.failed.len(), 0);
        assert_eq!(stash.tracked()?.len(), 0);

        Ok(())
    }

    #[test]
    fn untrack_of_unknown_path_changes_nothing() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path().join("stash");
        let source = temp.path().join(".bashrc");
        fs::write(&source, "export EDITOR=nvim\n")?;

        let mut stash = Stash::open(&root)?;
        stash.mark([&source])?;

        let report = stash.untrack([temp.path().join(".nope")])?;
        assert_eq!(report.removed.len(), 0);
        assert_eq!(report.failed.len(), 0);
        assert_eq!(stash.tracked()?.len(), 1);

        Ok(())
    }

    #[test]
    fn mark_with_empty_input_is_noop() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let mut stash = Stash::open(temp.path().join("stash"))?;
        stash.mark(Vec::<PathBuf>::new())?;
        assert_eq!(stash.tracked()?.len(), 0);

        Ok(())
    }
}
