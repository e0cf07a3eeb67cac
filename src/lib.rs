// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Track dotfiles, stash copies locally, and sync the stash with a remote
//! store.
//!
//! Dotstash keeps a record of user-selected files and directories, mirrors
//! each of them into a per-record __cache slot__ inside a local stash
//! directory, and synchronizes that stash with a remote store so the same
//! tracked set can be restored on another machine. Tracked paths are
//! persisted in a portable home-relative form, which is what makes restoring
//! onto a machine with a different home directory work at all.
//!
//! The crate splits into a handful of small pieces:
//!
//! - [`path`] — home directory resolution and the storage path codec.
//! - [`store`] — SQLite-backed record store for tracked files and the
//!   remote provider configuration.
//! - [`cache`] — the copy engine moving content between original locations
//!   and cache slots.
//! - [`stash`] — orchestration of store, cache, and remote gateway.
//! - [`remote`] — the remote storage capability interface and its git
//!   backend.

pub mod cache;
pub mod path;
pub mod remote;
pub mod stash;
pub mod store;

pub use remote::{GitRemote, ProviderKind, RemoteStore};
pub use stash::Stash;
pub use store::TrackedFile;
