// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile synchronization pipeline.
//!
//! Synchronization brings the local checkout of a dotfile repository up to
//! date, then overlays a safe subset of its files onto the home directory.
//! It runs as an ordered pipeline of fallible steps:
//!
//! 1. __Resolve root__: canonicalize the source root.
//! 2. __Pull__: fetch and merge the upstream revision.
//! 3. __Confirm__: ask the operator, unless running in force mode. The copy
//!    plan is logged first, so the operator knows what is about to change.
//! 4. __Mirror__: copy non-excluded files to the destination root.
//! 5. __Reload profile__: source the shell profile into a new environment
//!    snapshot.
//!
//! The pipeline stops at the first failing step, and the error says which
//! step it was. Declining the confirmation is not an error. Nothing is ever
//! rolled back.
//!
//! # Exclusions
//!
//! Some paths are always excluded so the repository cannot overwrite its own
//! metadata or bootstrap files in the destination: `.git`, `bootstrap.sh`,
//! and `dotsync.toml`. On top of that come the default extra exclusions, which
//! the tool configuration may replace.

pub mod confirm;
pub mod mirror;
pub mod reload;
pub mod upstream;

use crate::{
    config::SyncSettings,
    path::{canonicalize, resolve_against, PathError, CONFIG_FILE_NAME},
    sync::{
        confirm::{Confirm, ConfirmError, InquirePrompt},
        mirror::{Mirror, MirrorError, MirrorReport},
        reload::{Environment, Reload, ReloadError, ShellProfile},
        upstream::{Git2Upstream, PullOutcome, Upstream, UpstreamError},
    },
};

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Exclusions that always apply.
pub const MANDATORY_EXCLUDES: [&str; 3] = [".git", "bootstrap.sh", CONFIG_FILE_NAME];

/// Exclusions that apply unless configuration replaces them.
pub const DEFAULT_EXCLUDES: [&str; 4] = [".DS_Store", ".osx", "README.md", "LICENSE*"];

/// Question asked before anything gets copied.
pub const CONFIRM_QUESTION: &str =
    "This may overwrite existing files in your home directory. Are you sure?";

/// Settings for one synchronization run.
///
/// # Invariant
///
/// - Excluded paths always contain [`MANDATORY_EXCLUDES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    source_root: PathBuf,
    destination_root: PathBuf,
    profile: PathBuf,
    excluded_paths: BTreeSet<String>,
}

impl SyncConfig {
    /// Construct new sync configuration with default exclusions.
    pub fn new(
        source_root: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        profile: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            profile: profile.into(),
            excluded_paths: MANDATORY_EXCLUDES
                .iter()
                .chain(DEFAULT_EXCLUDES.iter())
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Construct sync configuration from tool configuration settings.
    ///
    /// Relative destination and profile paths resolve against source root.
    pub fn from_settings(source_root: impl Into<PathBuf>, settings: &SyncSettings) -> Self {
        let source_root = source_root.into();
        let destination_root = resolve_against(&source_root, &settings.destination);
        let profile = resolve_against(&source_root, &settings.profile);
        let config = Self::new(source_root, destination_root, profile);

        match &settings.exclude {
            Some(patterns) => config.with_excludes(patterns),
            None => config,
        }
    }

    /// Replace extra exclusions. Mandatory exclusions stay.
    pub fn with_excludes(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded_paths = MANDATORY_EXCLUDES
            .iter()
            .map(ToString::to_string)
            .chain(patterns.into_iter().map(Into::into))
            .collect();
        self
    }

    pub fn source_root(&self) -> &Path {
        self.source_root.as_path()
    }

    pub fn destination_root(&self) -> &Path {
        self.destination_root.as_path()
    }

    pub fn profile(&self) -> &Path {
        self.profile.as_path()
    }

    pub fn excluded_paths(&self) -> impl Iterator<Item = &str> {
        self.excluded_paths.iter().map(String::as_str)
    }
}

/// Whether to ask the operator before copying.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Ask for confirmation.
    #[default]
    Interactive,

    /// Skip confirmation entirely.
    Force,
}

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ResolveRoot,
    Pull,
    Confirm,
    Mirror,
    ReloadProfile,
}

impl Display for Step {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ResolveRoot => fmt.write_str("resolve source root"),
            Self::Pull => fmt.write_str("pull upstream"),
            Self::Confirm => fmt.write_str("confirm"),
            Self::Mirror => fmt.write_str("mirror copy"),
            Self::ReloadProfile => fmt.write_str("reload profile"),
        }
    }
}

/// How a synchronization run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Operator declined. Nothing was copied.
    Declined { pull: PullOutcome },

    /// Files were copied and the profile reloaded.
    Completed {
        pull: PullOutcome,
        report: MirrorReport,
        environment: Environment,
    },
}

/// Synchronization pipeline.
#[derive(Debug)]
pub struct Synchronizer<U = Git2Upstream, C = InquirePrompt, R = ShellProfile>
where
    U: Upstream,
    C: Confirm,
    R: Reload,
{
    config: SyncConfig,
    mode: RunMode,
    upstream: U,
    confirmer: C,
    reloader: R,
}

impl<U, C, R> Synchronizer<U, C, R>
where
    U: Upstream,
    C: Confirm,
    R: Reload,
{
    /// Construct new synchronization pipeline.
    pub fn new(config: SyncConfig, mode: RunMode, upstream: U, confirmer: C, reloader: R) -> Self {
        Self {
            config,
            mode,
            upstream,
            confirmer,
            reloader,
        }
    }

    /// Run every step in order.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError`] naming the first step that failed.
    #[instrument(skip(self), level = "debug")]
    pub fn run(mut self) -> Result<SyncOutcome> {
        let root = canonicalize(self.config.source_root()).map_err(SyncError::ResolveRoot)?;
        info!("sync from {:?}", root.display());

        let pull = self.upstream.pull(&root)?;
        info!("{pull}");

        let mirror = Mirror::new(
            &root,
            self.config.destination_root(),
            self.config.excluded_paths(),
        )?;
        let plan = mirror.plan()?;
        for path in &plan {
            debug!("would copy {:?}", path.display());
        }
        info!(
            "{} file(s) to copy into {:?}",
            plan.len(),
            self.config.destination_root().display()
        );

        if !self.confirmed()? {
            info!("sync declined, nothing copied");
            return Ok(SyncOutcome::Declined { pull });
        }

        let report = mirror.run()?;

        let prior = Environment::capture();
        let environment = self.reloader.reload()?;
        let changes = environment.changes_since(&prior);
        if changes.is_empty() {
            info!("profile reloaded, environment unchanged");
        } else {
            info!("profile reloaded, {} variable(s) changed", changes.len());
            warn!("start a new shell session to pick up the changes");
        }

        Ok(SyncOutcome::Completed {
            pull,
            report,
            environment,
        })
    }

    fn confirmed(&mut self) -> Result<bool> {
        match self.mode {
            RunMode::Force => Ok(true),
            RunMode::Interactive => Ok(self.confirmer.confirm(CONFIRM_QUESTION)?),
        }
    }
}

/// Synchronization error types.
///
/// Each variant corresponds to the [`Step`] that failed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to {}", Step::ResolveRoot)]
    ResolveRoot(#[source] PathError),

    #[error("failed to {}", Step::Pull)]
    Pull(#[from] UpstreamError),

    #[error("failed to {}", Step::Confirm)]
    Confirm(#[from] ConfirmError),

    #[error("failed to {}", Step::Mirror)]
    Mirror(#[from] MirrorError),

    #[error("failed to {}", Step::ReloadProfile)]
    ReloadProfile(#[from] ReloadError),
}

impl SyncError {
    /// Step that failed.
    pub fn step(&self) -> Step {
        match self {
            Self::ResolveRoot(_) => Step::ResolveRoot,
            Self::Pull(_) => Step::Pull,
            Self::Confirm(_) => Step::Confirm,
            Self::Mirror(_) => Step::Mirror,
            Self::ReloadProfile(_) => Step::ReloadProfile,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
