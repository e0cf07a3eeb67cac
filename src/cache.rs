// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cache slot copy engine.
//!
//! Moves file content between a tracked record's original location and its
//! __cache slot__ inside the stash. A cache slot is the filesystem entry at
//! `<files_dir>/<id>`, mirroring whatever the record's path points at, be it
//! a single file or a whole directory tree. Slots are addressed purely by
//! record identifier; nothing about them is modeled in the record store.
//!
//! Both copy directions are idempotent given an unchanged source: rerunning
//! [`materialize`] overwrites the slot to match the original location, and
//! rerunning [`restore`] overwrites the original location to match the slot.
//!
//! Directory copies walk the whole tree, pruning any `.git` directory they
//! come across so a tracked repository's own history never pollutes the
//! stash. There is no transactional rollback for partial directory copies;
//! failures are reported per record and whatever was copied stays on disk.

use crate::store::TrackedFile;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Compute the cache slot path for a tracked record.
pub fn slot_path(record: &TrackedFile, files_dir: impl AsRef<Path>) -> PathBuf {
    files_dir.as_ref().join(record.id.to_string())
}

/// Mirror a tracked record's content into its cache slot.
///
/// Directory sources are copied recursively with the slot recreated fresh,
/// so entries deleted from the source since the last run do not linger in
/// the slot. File sources are copied singly with parent directories created
/// as needed.
///
/// # Errors
///
/// - Return [`CacheError::SourceNotFound`] if the record's path no longer
///   exists.
/// - Return [`CacheError::Copy`] on any I/O failure while copying.
pub fn materialize(record: &TrackedFile, files_dir: impl AsRef<Path>) -> Result<()> {
    let slot = slot_path(record, &files_dir);
    let metadata = fs::symlink_metadata(&record.path).map_err(|_| CacheError::SourceNotFound {
        path: record.path.clone(),
    })?;

    debug!(
        "materialize {:?} into slot {:?}",
        record.path.display(),
        slot.display()
    );

    if metadata.is_dir() {
        // INVARIANT: Recreate directory slots fresh so stale entries vanish.
        if slot.exists() {
            fs::remove_dir_all(&slot).map_err(|err| CacheError::Copy {
                source: err,
                path: slot.clone(),
            })?;
        }
        copy_tree(&record.path, &slot)
    } else {
        copy_file(&record.path, &slot)
    }
}

/// Copy a tracked record's cache slot back to its original location.
///
/// Inverse of [`materialize`]. Destination parent directories are created
/// before copying, and existing destination content is overwritten.
///
/// # Errors
///
/// - Return [`CacheError::SlotMissing`] if the slot does not exist. Callers
///   treat this as recoverable: warn and move on to the next record.
/// - Return [`CacheError::Copy`] on any I/O failure while copying.
pub fn restore(record: &TrackedFile, files_dir: impl AsRef<Path>) -> Result<()> {
    let slot = slot_path(record, &files_dir);
    let metadata = fs::symlink_metadata(&slot).map_err(|_| CacheError::SlotMissing {
        id: record.id,
        path: record.path.clone(),
    })?;

    debug!(
        "restore slot {:?} to {:?}",
        slot.display(),
        record.path.display()
    );

    if metadata.is_dir() {
        copy_tree(&slot, &record.path)
    } else {
        copy_file(&slot, &record.path)
    }
}

/// Delete a tracked record's cache slot entirely.
///
/// An already-absent slot counts as success, which lets tracking removal
/// proceed even when the cached copy was cleaned up beforehand.
///
/// # Errors
///
/// - Return [`CacheError::RemoveSlot`] if the slot exists but cannot be
///   removed.
pub fn remove_slot(record: &TrackedFile, files_dir: impl AsRef<Path>) -> Result<()> {
    let slot = slot_path(record, &files_dir);
    let metadata = match fs::symlink_metadata(&slot) {
        Ok(metadata) => metadata,
        Err(_) => return Ok(()),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(&slot)
    } else {
        fs::remove_file(&slot)
    };

    result.map_err(|err| CacheError::RemoveSlot {
        source: err,
        slot,
    })
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|err| CacheError::Copy {
            source: err,
            path: dst.to_path_buf(),
        })?;
    }

    fs::copy(src, dst).map_err(|err| CacheError::Copy {
        source: err,
        path: src.to_path_buf(),
    })?;

    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let walker = WalkDir::new(src)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && entry.file_name() == std::ffi::OsStr::new(".git"))
        });

    for entry in walker {
        let entry = entry.map_err(|err| CacheError::Copy {
            source: std::io::Error::other(err),
            path: src.to_path_buf(),
        })?;

        let rel = entry.path().strip_prefix(src).map_err(|err| CacheError::Copy {
            source: std::io::Error::other(err),
            path: entry.path().to_path_buf(),
        })?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| CacheError::Copy {
                source: err,
                path: target.clone(),
            })?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Cache slot copy error types.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Tracked path no longer exists on disk.
    #[error("source path {:?} does not exist", path.display())]
    SourceNotFound { path: PathBuf },

    /// Copying between original location and slot failed.
    #[error("failed to copy {:?}", path.display())]
    Copy {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Cache slot for the record is absent.
    #[error("cache slot for {:?} (id {id}) is missing", path.display())]
    SlotMissing { id: i64, path: PathBuf },

    /// Cache slot exists but cannot be removed.
    #[error("failed to remove cache slot {:?}", slot.display())]
    RemoveSlot {
        #[source]
        source: std::io::Error,
        slot: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(id: i64, path: impl Into<PathBuf>) -> TrackedFile {
        TrackedFile {
            id,
            path: path.into(),
        }
    }

    #[test]
    fn materialize_copies_single_file() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let source = temp.path().join(".bashrc");
        let files_dir = temp.path().join("files");
        fs::write(&source, "export PATH=$PATH:~/bin\n")?;

        let record = record(1, &source);
        materialize(&record, &files_dir)?;

        let slot = files_dir.join("1");
        assert_eq!(fs::read_to_string(slot)?, "export PATH=$PATH:~/bin\n");

        Ok(())
    }

    #[test]
    fn materialize_copies_directory_tree_without_git() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let source = temp.path().join(".config/nvim");
        let files_dir = temp.path().join("files");
        fs::create_dir_all(source.join("lua/plugins"))?;
        fs::create_dir_all(source.join(".git/objects"))?;
        fs::create_dir_all(source.join("lua/.git"))?;
        fs::write(source.join("init.lua"), "require('plugins')\n")?;
        fs::write(source.join("lua/plugins/init.lua"), "return {}\n")?;
        fs::write(source.join(".git/config"), "[core]\n")?;
        fs::write(source.join("lua/.git/config"), "[core]\n")?;

        let record = record(7, &source);
        materialize(&record, &files_dir)?;

        let slot = files_dir.join("7");
        assert_eq!(
            fs::read_to_string(slot.join("init.lua"))?,
            "require('plugins')\n"
        );
        assert_eq!(
            fs::read_to_string(slot.join("lua/plugins/init.lua"))?,
            "return {}\n"
        );
        assert!(!slot.join(".git").exists());
        assert!(!slot.join("lua/.git").exists());

        Ok(())
    }

    #[test]
    fn materialize_recreates_directory_slot_fresh() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let source = temp.path().join(".config/git");
        let files_dir = temp.path().join("files");
        fs::create_dir_all(&source)?;
        fs::write(source.join("config"), "[user]\n")?;

        let record = record(3, &source);
        materialize(&record, &files_dir)?;

        // Plant a stale entry, then rerun.
        let slot = files_dir.join("3");
        fs::write(slot.join("stale"), "old\n")?;
        materialize(&record, &files_dir)?;

        assert!(slot.join("config").exists());
        assert!(!slot.join("stale").exists());

        Ok(())
    }

    #[test]
    fn materialize_missing_source_fails() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let record = record(2, temp.path().join("nope"));

        let result = materialize(&record, temp.path().join("files"));
        assert!(matches!(result, Err(CacheError::SourceNotFound { .. })));

        Ok(())
    }

    #[test]
    fn restore_copies_slot_back_to_origin() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let files_dir = temp.path().join("files");
        let destination = temp.path().join("deep/nested/.vimrc");
        fs::create_dir_all(&files_dir)?;
        fs::write(files_dir.join("4"), "set number\n")?;

        let record = record(4, &destination);
        restore(&record, &files_dir)?;

        assert_eq!(fs::read_to_string(destination)?, "set number\n");

        Ok(())
    }

    #[test]
    fn restore_overwrites_existing_destination() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let files_dir = temp.path().join("files");
        let destination = temp.path().join(".vimrc");
        fs::create_dir_all(&files_dir)?;
        fs::write(files_dir.join("5"), "set number\n")?;
        fs::write(&destination, "set nonumber\n")?;

        let record = record(5, &destination);
        restore(&record, &files_dir)?;

        assert_eq!(fs::read_to_string(destination)?, "set number\n");

        Ok(())
    }

    #[test]
    fn restore_missing_slot_is_recoverable() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let record = record(6, temp.path().join(".bashrc"));

        let result = restore(&record, temp.path().join("files"));
        assert!(matches!(result, Err(CacheError::SlotMissing { id: 6, .. })));

        Ok(())
    }

    #[test]
    fn remove_slot_tolerates_absent_slot() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let files_dir = temp.path().join("files");
        let record = record(8, temp.path().join(".bashrc"));

        remove_slot(&record, &files_dir)?;

        fs::create_dir_all(files_dir.join("8"))?;
        fs::write(files_dir.join("8/file"), "data\n")?;
        remove_slot(&record, &files_dir)?;
        assert!(!files_dir.join("8").exists());

        Ok(())
    }
}
