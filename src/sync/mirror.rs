// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! One-way additive mirror copy.
//!
//! Every file under the source root that is not excluded gets copied to the
//! same relative path under the destination root. The copy is an overlay:
//!
//! - File contents and directory hierarchy are preserved.
//! - Permission bits are _not_ preserved. New files get default permissions,
//!   while existing files keep whatever permissions they already had.
//! - Symbolic links are recreated as symbolic links.
//! - Files that only exist at the destination are never deleted.
//!
//! Exclusion patterns use gitignore syntax. A pattern without a slash
//! matches at any depth, and an excluded directory is skipped entirely.
//!
//! Only regular files and symbolic links are copied. Named pipes, sockets,
//! and device files are skipped.
//!
//! Mirroring a root onto itself is refused, and a file whose target resolves
//! back to the file itself is skipped. Either would truncate the file while
//! reading from it.
//!
//! There is no rollback. If the copy fails halfway through, every file
//! copied before the failure stays copied.

use ignore::{
    gitignore::{Gitignore, GitignoreBuilder},
    WalkBuilder,
};
use std::{
    fs::{remove_file, symlink_metadata, File},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Mirror copy from source root to destination root.
#[derive(Debug, Clone)]
pub struct Mirror {
    source: PathBuf,
    destination: PathBuf,
    excludes: Gitignore,
}

impl Mirror {
    /// Construct new mirror copy.
    ///
    /// # Errors
    ///
    /// - Return [`MirrorError::Pattern`] if an exclusion pattern is invalid.
    /// - Return [`MirrorError::SameRoot`] if source and destination resolve to
    ///   the same directory.
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        patterns: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let source = source.into();
        let mut builder = GitignoreBuilder::new(&source);
        for pattern in patterns {
            builder
                .add_line(None, pattern.as_ref())
                .map_err(|err| MirrorError::Pattern {
                    source: err,
                    pattern: pattern.as_ref().to_string(),
                })?;
        }
        let excludes = builder.build().map_err(|err| MirrorError::Pattern {
            source: err,
            pattern: String::new(),
        })?;

        let destination = destination.into();
        if resolve(&source) == resolve(&destination) {
            return Err(MirrorError::SameRoot { path: destination });
        }

        Ok(Self {
            source,
            destination,
            excludes,
        })
    }

    /// Check if path relative to source root is excluded.
    pub fn is_excluded(&self, relative: impl AsRef<Path>, is_dir: bool) -> bool {
        self.excludes.matched(relative.as_ref(), is_dir).is_ignore()
    }

    /// List every relative path the copy would write, in copy order.
    ///
    /// # Errors
    ///
    /// - Return [`MirrorError::Walk`] if source root cannot be walked.
    pub fn plan(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in self.walk() {
            let entry = entry?;
            if entry.depth() == 0 || is_dir(&entry) {
                continue;
            }

            let relative = self.relative(entry.path());
            if self.should_copy(&entry, &self.destination.join(relative)) {
                paths.push(relative.to_path_buf());
            }
        }

        Ok(paths)
    }

    /// Perform the copy.
    ///
    /// Stops at the first failure without undoing anything.
    ///
    /// # Errors
    ///
    /// - Return [`MirrorError::Walk`] if source root cannot be walked.
    /// - Return [`MirrorError::Copy`] if an entry cannot be copied.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self) -> Result<MirrorReport> {
        info!(
            "mirror {:?} into {:?}",
            self.source.display(),
            self.destination.display()
        );
        mkdirp::mkdirp(&self.destination).map_err(|err| MirrorError::Copy {
            source: err,
            path: self.destination.clone(),
        })?;

        let mut report = MirrorReport::default();
        for entry in self.walk() {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }

            let relative = self.relative(entry.path()).to_path_buf();
            let target = self.destination.join(&relative);
            let copy_err = |err| MirrorError::Copy {
                source: err,
                path: relative.clone(),
            };

            if is_dir(&entry) {
                if mkdirp::mkdirp(&target).map_err(copy_err)?.is_some() {
                    report.directories += 1;
                }
                continue;
            }

            if !self.should_copy(&entry, &target) {
                continue;
            }

            if entry.file_type().is_some_and(|kind| kind.is_symlink()) {
                copy_symlink(entry.path(), &target).map_err(copy_err)?;
            } else {
                copy_contents(entry.path(), &target).map_err(copy_err)?;
            }

            info!("{}", relative.display());
            report.written.push(relative);
        }

        info!(
            "copied {} file(s), created {} directory(ies)",
            report.written.len(),
            report.directories
        );
        Ok(report)
    }

    fn walk(&self) -> ignore::Walk {
        let root = self.source.clone();
        let destination = resolve(&self.destination);
        let excludes = self.excludes.clone();

        // INVARIANT: Walk every entry, including hidden ones and ones that
        //   would be ignored by Git. Only our own exclusions apply.
        WalkBuilder::new(&self.source)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }

                // INVARIANT: Never walk into destination when it is nested in
                //   the source root.
                if entry.path() == destination {
                    return false;
                }

                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                let excluded = excludes.matched(relative, is_dir(entry)).is_ignore();
                if excluded {
                    debug!("exclude {:?}", relative.display());
                }
                !excluded
            })
            .build()
    }

    fn relative<'path>(&self, path: &'path Path) -> &'path Path {
        path.strip_prefix(&self.source).unwrap_or(path)
    }

    fn should_copy(&self, entry: &ignore::DirEntry, target: &Path) -> bool {
        let relative = self.relative(entry.path());
        if !entry
            .file_type()
            .is_some_and(|kind| kind.is_file() || kind.is_symlink())
        {
            debug!("skip {:?}, not a regular file", relative.display());
            return false;
        }

        // INVARIANT: Never copy a file onto itself, e.g., through a symbolic
        //   link at the destination that points back into the source root.
        if resolve_parent(entry.path()).is_some_and(|path| Some(path) == resolve_parent(target)) {
            debug!("skip {:?}, target is the source file", relative.display());
            return false;
        }

        true
    }
}

/// Outcome of a mirror copy.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    /// Files and symbolic links written, relative to destination root.
    pub written: Vec<PathBuf>,

    /// Number of directories that had to be created.
    pub directories: usize,
}

fn is_dir(entry: &ignore::DirEntry) -> bool {
    entry.file_type().is_some_and(|kind| kind.is_dir())
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

// Resolve every component except the last, so links are not followed.
fn resolve_parent(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}

fn copy_contents(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        mkdirp::mkdirp(parent)?;
    }

    // INVARIANT: Replace symbolic link at target instead of writing through it.
    if symlink_metadata(target).is_ok_and(|meta| meta.file_type().is_symlink()) {
        remove_file(target)?;
    }

    let mut reader = File::open(source)?;
    let mut writer = File::create(target)?;
    io::copy(&mut reader, &mut writer)?;

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        mkdirp::mkdirp(parent)?;
    }

    let link = std::fs::read_link(source)?;
    if let Ok(meta) = symlink_metadata(target) {
        if meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "directory in the way of symbolic link",
            ));
        }
        remove_file(target)?;
    }

    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    copy_contents(source, target)
}

/// Mirror copy error types.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// Exclusion pattern cannot be parsed.
    #[error("invalid exclusion pattern {pattern:?}")]
    Pattern {
        #[source]
        source: ignore::Error,
        pattern: String,
    },

    /// Source and destination are the same directory.
    #[error("refusing to mirror {:?} onto itself", path.display())]
    SameRoot { path: PathBuf },

    /// Source root cannot be walked.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Entry cannot be copied.
    #[error("failed to copy {:?}", path.display())]
    Copy {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
