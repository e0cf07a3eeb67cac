// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution and portability utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way. Also houses the __storage path__
//! codec that keeps tracked paths portable across machines.
//!
//! # Storage Paths
//!
//! A tracked path is persisted in a portable form called a storage path. If
//! an absolute path lies under the user's home directory, then the home
//! prefix is swapped for the literal token `HOME`, e.g.,
//! `/home/user/.bashrc` becomes `HOME/.bashrc`. When the record set is later
//! restored on a different machine, the token is swapped back for _that_
//! machine's home directory. Portability is the whole point here, not
//! reversibility on a single machine alone.

use std::path::{Path, PathBuf};

/// Literal token substituted for the home directory prefix.
const HOME_TOKEN: &str = "HOME";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the stash root.
///
/// The stash root houses the record store file and the cache slot directory.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_stash_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join(".dotstash"))
}

/// Convert an absolute machine path into portable storage form.
///
/// Replaces the home directory prefix with the `HOME` placeholder,
/// preserving the remaining relative segments. The home directory itself
/// becomes exactly the placeholder. Paths outside the home tree, or any path
/// when the home directory cannot be resolved, come back unchanged.
///
/// Prefix matching is done per path component, so redundant separators are
/// normalized away, and exact-prefix semantics keep `/home/user2` from ever
/// being mistaken as living under `/home/user`.
pub fn to_storage(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let Ok(home) = home_dir() else {
        return path.to_path_buf();
    };

    match path.strip_prefix(&home) {
        Ok(rest) if rest.as_os_str().is_empty() => PathBuf::from(HOME_TOKEN),
        Ok(rest) => Path::new(HOME_TOKEN).join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Convert a portable storage path back into an absolute machine path.
///
/// Swaps a leading `HOME` placeholder for the _current_ machine's home
/// directory. Anything that does not start with the placeholder, or any
/// input when the home directory cannot be resolved, comes back unchanged.
pub fn from_storage(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let Ok(home) = home_dir() else {
        return path.to_path_buf();
    };

    match path.strip_prefix(HOME_TOKEN) {
        Ok(rest) if rest.as_os_str().is_empty() => home,
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Normalize a user-supplied CLI path argument into an absolute path.
///
/// Performs tilde expansion first, then resolves relative inputs against the
/// current working directory. Already-absolute inputs pass through untouched.
///
/// # Errors
///
/// - Return [`std::io::Error`] if the working directory cannot be determined.
pub fn absolutize(input: impl AsRef<str>) -> std::io::Result<PathBuf> {
    let expanded = shellexpand::tilde(input.as_ref());
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        std::path::absolute(path)
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/testuser")])]
    fn to_storage_swaps_home_prefix() {
        let cases = [
            ("/home/testuser/.bashrc", "HOME/.bashrc"),
            ("/home/testuser/.config/git/config", "HOME/.config/git/config"),
            ("/home/testuser", "HOME"),
            ("/etc/hosts", "/etc/hosts"),
            ("/", "/"),
            ("/home/testuser///.bashrc", "HOME/.bashrc"),
            ("/home/testuser2/.bashrc", "/home/testuser2/.bashrc"),
        ];

        for (input, expect) in cases {
            assert_eq!(to_storage(input), PathBuf::from(expect), "input: {input}");
        }
    }

    #[sealed_test(env = [("HOME", "/home/testuser")])]
    fn from_storage_swaps_placeholder() {
        let cases = [
            ("HOME/.bashrc", "/home/testuser/.bashrc"),
            ("HOME/.config/git/config", "/home/testuser/.config/git/config"),
            ("HOME", "/home/testuser"),
            ("/etc/hosts", "/etc/hosts"),
            ("some/relative/path", "some/relative/path"),
        ];

        for (input, expect) in cases {
            assert_eq!(from_storage(input), PathBuf::from(expect), "input: {input}");
        }
    }

    #[sealed_test(env = [("HOME", "/home/testuser")])]
    fn storage_path_round_trip() {
        let cases = [
            "/home/testuser/.bashrc",
            "/home/testuser/.config/git/config",
            "/home/testuser",
            "/etc/hosts",
            "/",
        ];

        for input in cases {
            assert_eq!(
                from_storage(to_storage(input)),
                PathBuf::from(input),
                "input: {input}"
            );
        }
    }

    #[sealed_test(env = [("HOME", "/home/testuser")])]
    fn default_stash_dir_lives_under_home() {
        let result = default_stash_dir().unwrap();
        assert_eq!(result, PathBuf::from("/home/testuser/.dotstash"));
    }

    #[sealed_test]
    fn absolutize_resolves_relative_input() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolutize(".bashrc").unwrap(), cwd.join(".bashrc"));
        assert_eq!(
            absolutize("/etc/hosts").unwrap(),
            PathBuf::from("/etc/hosts")
        );
    }
}
