// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use git2::Repository;
use std::path::{Path, PathBuf};

/// Name of optional configuration file at the top-level of the source root.
pub const CONFIG_FILE_NAME: &str = "dotsync.toml";

/// Directory dotsync was built from.
pub const BUILD_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoWayHome)
}

/// Discover the source root that files get synchronized from.
///
/// Walks up from `start` until the work tree of an enclosing Git repository
/// is found. The result is canonicalized, so every later step works with a
/// deterministic absolute root regardless of where the tool was invoked.
///
/// # Errors
///
/// - Return [`PathError::NoSourceRoot`] if no enclosing work tree exists.
/// - Return [`PathError::Canonicalize`] if the root cannot be canonicalized.
pub fn discover_source_root(start: impl AsRef<Path>) -> Result<PathBuf> {
    let repository =
        Repository::discover(start.as_ref()).map_err(|err| PathError::NoSourceRoot {
            source: err,
            start: start.as_ref().to_path_buf(),
        })?;

    // INVARIANT: Bare repositories have nothing to sync from.
    let workdir = repository.workdir().ok_or_else(|| PathError::NoSourceRoot {
        source: git2::Error::from_str("repository has no work tree"),
        start: start.as_ref().to_path_buf(),
    })?;

    canonicalize(workdir)
}

/// Locate the source root of this dotsync installation.
///
/// The source root is the repository dotsync itself lives in, so the result
/// never depends on the directory the tool was invoked from. The directory of
/// the running executable is tried first, then [`BUILD_ROOT`].
///
/// # Errors
///
/// - Return [`PathError::NoSourceRoot`] if neither anchor lies inside a work
///   tree.
pub fn locate_source_root() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    locate_source_root_from(exe_dir.as_deref(), BUILD_ROOT)
}

/// Locate source root from explicit anchors.
///
/// See [`locate_source_root`].
///
/// # Errors
///
/// - Return [`PathError::NoSourceRoot`] if neither anchor lies inside a work
///   tree.
pub fn locate_source_root_from(
    exe_dir: Option<&Path>,
    build_root: impl AsRef<Path>,
) -> Result<PathBuf> {
    if let Some(root) = exe_dir.and_then(|dir| discover_source_root(dir).ok()) {
        return Ok(root);
    }

    discover_source_root(build_root)
}

/// Resolve `path` against `root` when it is relative.
pub fn resolve_against(root: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.as_ref().join(path)
    }
}

/// Canonicalize path with error context.
///
/// # Errors
///
/// - Return [`PathError::Canonicalize`] if the path does not exist or cannot
///   be resolved.
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    path.as_ref()
        .canonicalize()
        .map_err(|err| PathError::Canonicalize {
            source: err,
            path: path.as_ref().to_path_buf(),
        })
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    ///
    /// # See Also
    ///
    /// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// No Git work tree encloses the starting directory.
    #[error("no git work tree found from {:?}", start.display())]
    NoSourceRoot {
        #[source]
        source: git2::Error,
        start: PathBuf,
    },

    /// Path cannot be canonicalized.
    #[error("failed to canonicalize {:?}", path.display())]
    Canonicalize {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn home_dir_follows_environment() -> anyhow::Result<()> {
        assert_eq!(home_dir()?, PathBuf::from("/home/blah"));
        Ok(())
    }

    #[sealed_test]
    fn locate_ignores_working_directory() -> anyhow::Result<()> {
        // Working directory is an unrelated repository.
        Repository::init(".")?;
        let elsewhere = std::env::current_dir()?.canonicalize()?;

        let temp = tempfile::tempdir()?;
        let dots = temp.path().join("dots");
        let bin = dots.join("target").join("release");
        std::fs::create_dir_all(&bin)?;
        Repository::init(&dots)?;
        let expect = dots.canonicalize()?;

        let result = locate_source_root_from(Some(&bin), &dots)?;
        assert_eq!(result, expect);
        assert_ne!(result, elsewhere);

        // Executable installed outside of any work tree.
        let outside = tempfile::tempdir()?;
        let result = locate_source_root_from(Some(outside.path()), &dots)?;
        assert_eq!(result, expect);

        let result = locate_source_root_from(None, &dots)?;
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn resolve_relative_against_root() {
        let result = resolve_against("/home/blah/dotfiles", "lldb/aliases.toml");
        assert_eq!(result, PathBuf::from("/home/blah/dotfiles/lldb/aliases.toml"));
    }

    #[test]
    fn resolve_absolute_stays_absolute() {
        let result = resolve_against("/home/blah/dotfiles", "/etc/aliases.toml");
        assert_eq!(result, PathBuf::from("/etc/aliases.toml"));
    }

    #[test]
    fn discover_nested_source_root() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        Repository::init(temp.path())?;
        let nested = temp.path().join("lldb").join("commands");
        std::fs::create_dir_all(&nested)?;

        let result = discover_source_root(&nested)?;
        assert_eq!(result, temp.path().canonicalize()?);

        Ok(())
    }

    #[test]
    fn discover_fails_outside_work_tree() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        Repository::init_bare(temp.path())?;

        let result = discover_source_root(temp.path());
        assert!(matches!(result, Err(PathError::NoSourceRoot { .. })));

        Ok(())
    }
}
