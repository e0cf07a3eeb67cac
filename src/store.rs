// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tracked file record store.
//!
//! Durable storage for the two pieces of state dotstash keeps between
//! invocations: the set of tracked file records, and the single remote
//! provider configuration. Backed by a SQLite database file that lives
//! inside the stash root so it travels with every push of the stash tree.
//!
//! # Record Layout
//!
//! Each tracked file record pairs a store-assigned identifier with the path
//! being tracked. The identifier is the addressing key for the record's
//! cache slot, and is never reused once assigned. Paths are persisted in
//! portable storage form (see [`crate::path`]), but every public operation
//! accepts and returns absolute machine paths; the codec is applied at the
//! storage boundary only.
//!
//! No uniqueness constraint is placed on tracked paths, so marking the same
//! path twice yields two records with distinct identifiers. Existing
//! behavior, kept as is.

use crate::path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS provider (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        kind TEXT NOT NULL,
        location TEXT NOT NULL
    );
";

/// One tracked file record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// Store-assigned identifier, stable for the record's lifetime.
    pub id: i64,

    /// Absolute machine path of the tracked file or directory.
    pub path: PathBuf,
}

/// Persistent record store for tracked files and provider configuration.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open record store at target database file path.
    ///
    /// Creates the parent directory if missing, and idempotently ensures the
    /// backing tables exist. Safe to call on every startup.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateStoreDir`] if the parent directory
    ///   cannot be created.
    /// - Return [`StoreError::Unavailable`] if the database cannot be opened
    ///   or the schema cannot be ensured.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::CreateStoreDir)?;
        }

        debug!("open record store at {:?}", db_path.display());
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn })
    }

    /// Track one path.
    ///
    /// The path is converted to portable storage form before insertion. No
    /// deduplication is performed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Unavailable`] if the insert fails.
    pub fn insert(&self, path: impl AsRef<Path>) -> Result<()> {
        let storage = storage_form(path);
        self.conn
            .execute("INSERT INTO files (path) VALUES (?1)", [&storage])?;

        Ok(())
    }

    /// Track a batch of paths as a single all-or-nothing unit.
    ///
    /// Empty input is a no-op that succeeds. A failure part way through
    /// rolls the whole batch back.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Unavailable`] if any insert fails.
    pub fn insert_many(
        &mut self,
        paths: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<()> {
        let storage: Vec<String> = paths.into_iter().map(storage_form).collect();
        if storage.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO files (path) VALUES (?1)")?;
            for path in &storage {
                stmt.execute([path])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    /// List every tracked file record.
    ///
    /// Paths come back decoded to absolute machine form. Row order is
    /// incidental, never a contract.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Unavailable`] if the query fails.
    pub fn list_all(&self) -> Result<Vec<TrackedFile>> {
        let mut stmt = self.conn.prepare("SELECT id, path FROM files")?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Find records whose tracked path exactly matches one of the inputs.
    ///
    /// Inputs are re-encoded to storage form and compared verbatim. Inputs
    /// matching no record are simply absent from the result. Empty input
    /// yields an empty result.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Unavailable`] if the query fails.
    pub fn find_by_paths(
        &self,
        paths: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<Vec<TrackedFile>> {
        let storage: Vec<String> = paths.into_iter().map(storage_form).collect();
        if storage.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; storage.len()].join(",");
        let sql = format!("SELECT id, path FROM files WHERE path IN ({placeholders})");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(storage.iter()), record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Remove records by identifier as a single atomic batch.
    ///
    /// Unknown identifiers are ignored without error. Empty input is a
    /// no-op that succeeds.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Unavailable`] if any delete fails.
    pub fn delete_by_ids(&mut self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM files WHERE id = ?1")?;
            for id in ids {
                stmt.execute([id])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    /// Read the current remote provider configuration.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotConfigured`] when no configuration exists.
    /// - Return [`StoreError::Unavailable`] if the query fails.
    pub fn current_provider(&self) -> Result<(String, String)> {
        self.conn
            .query_row(
                "SELECT kind, location FROM provider WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StoreError::NotConfigured)
    }

    /// Establish or overwrite the remote provider configuration.
    ///
    /// The configuration is a keyed singleton. Setting it a second time
    /// replaces the previous kind and location in place.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Unavailable`] if the upsert fails.
    pub fn set_provider(&self, kind: impl AsRef<str>, location: impl AsRef<str>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO provider (id, kind, location) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET kind = excluded.kind, location = excluded.location",
            params![kind.as_ref(), location.as_ref()],
        )?;

        Ok(())
    }
}

fn storage_form(path: impl AsRef<Path>) -> String {
    path::to_storage(path).to_string_lossy().into_owned()
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedFile> {
    let id: i64 = row.get(0)?;
    let storage: String = row.get(1)?;

    Ok(TrackedFile {
        id,
        path: path::from_storage(storage),
    })
}

/// Record store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backing database cannot be reached, read, or written.
    #[error("record store unavailable")]
    Unavailable(#[from] rusqlite::Error),

    /// Directory holding the database file cannot be created.
    #[error("failed to create record store directory")]
    CreateStoreDir(#[source] std::io::Error),

    /// No remote provider configuration exists yet.
    #[error("no storage provider configured")]
    NotConfigured,
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
