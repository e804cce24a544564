// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bring source root up to date with its upstream.
//!
//! The checked out branch is fetched from the remote it tracks, and the
//! fetched revision is merged in. Three things can happen:
//!
//! 1. Nothing, because the branch is already up to date.
//! 2. A fast-forward, when the local branch has no commits of its own.
//! 3. A merge commit, when both sides moved and do not conflict.
//!
//! Conflicts abort the pull before the work tree is touched. Local changes
//! that would be clobbered by the checkout also abort the pull, because the
//! checkout is always performed in safe mode.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::CheckoutBuilder, AnnotatedCommit, BranchType, FetchOptions, Oid, RemoteCallbacks,
    Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    time,
};
use tracing::{debug, info, instrument};

/// Layer of indirection for pulling the latest upstream revision.
pub trait Upstream {
    /// Fetch and merge upstream revision of source root's current branch.
    fn pull(&self, root: &Path) -> Result<PullOutcome>;
}

/// What a pull did to the source root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local branch already contains upstream revision.
    UpToDate,

    /// Local branch moved forward to upstream revision.
    FastForward { from: Oid, to: Oid },

    /// Local and upstream revisions were joined by a new merge commit.
    Merged { commit: Oid },
}

impl Display for PullOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::UpToDate => fmt.write_str("already up to date"),
            Self::FastForward { from, to } => write!(fmt, "fast-forward {from:.7}..{to:.7}"),
            Self::Merged { commit } => write!(fmt, "merged as {commit:.7}"),
        }
    }
}

/// Upstream access through libgit2.
///
/// Transfer progress is shown on the given progress bar. Credentials are
/// prompted for when the remote asks for them, with the progress bar
/// suspended while the user types.
#[derive(Debug, Clone)]
pub struct Git2Upstream {
    bar: ProgressBar,
}

impl Git2Upstream {
    /// Construct new upstream puller.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    fn fetch(&self, repository: &Repository, remote_name: &str, refspec: &str) -> Result<()> {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        self.bar.set_style(style);
        self.bar.set_message(format!("fetch {remote_name}"));
        self.bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(self.bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
        let config = repository.config()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                prompter.bar.set_length(stats.total_objects() as u64);
                prompter.bar.set_position(stats.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);

        let mut remote = repository.find_remote(remote_name)?;
        let result = remote.fetch(&[refspec], Some(&mut fo), None);
        self.bar.finish_and_clear();
        result?;

        Ok(())
    }
}

impl Default for Git2Upstream {
    fn default() -> Self {
        Self::new(ProgressBar::new(0))
    }
}

impl Upstream for Git2Upstream {
    #[instrument(skip(self, root), level = "debug")]
    fn pull(&self, root: &Path) -> Result<PullOutcome> {
        let repository = Repository::open(root)?;
        let head = repository.head()?;
        if !head.is_branch() {
            return Err(UpstreamError::DetachedHead);
        }

        // INVARIANT: Branch reference names are always valid UTF-8 here, or
        //   libgit2 would not have resolved them.
        let head_name = head.name().ok_or(UpstreamError::DetachedHead)?.to_string();
        let branch_name = head.shorthand().unwrap_or(head_name.as_str()).to_string();
        let branch = repository.find_branch(&branch_name, BranchType::Local)?;
        if branch.upstream().is_err() {
            return Err(UpstreamError::NoUpstream {
                branch: branch_name,
            });
        }

        let remote_name = repository.branch_upstream_remote(&head_name)?;
        let remote_name = remote_name.as_str().ok_or(UpstreamError::NoUpstream {
            branch: branch_name.clone(),
        })?;
        let merge_ref = repository.branch_upstream_merge(&head_name)?;
        let merge_ref = merge_ref.as_str().ok_or(UpstreamError::NoUpstream {
            branch: branch_name.clone(),
        })?;

        info!("fetch {merge_ref} from {remote_name}");
        self.fetch(&repository, remote_name, merge_ref)?;

        let fetch_head = repository.find_reference("FETCH_HEAD")?;
        let incoming = repository.reference_to_annotated_commit(&fetch_head)?;
        merge_incoming(&repository, &head_name, &incoming)
    }
}

fn merge_incoming(
    repository: &Repository,
    head_name: &str,
    incoming: &AnnotatedCommit<'_>,
) -> Result<PullOutcome> {
    let (analysis, _) = repository.merge_analysis(&[incoming])?;

    if analysis.is_up_to_date() {
        debug!("nothing to merge");
        return Ok(PullOutcome::UpToDate);
    }

    let local = repository.head()?.peel_to_commit()?;

    // INVARIANT: Check out the new tree before moving HEAD, so checkout still
    //   compares against the old tree and refuses to clobber local changes.
    if analysis.is_fast_forward() {
        let target = repository.find_object(incoming.id(), None)?;
        repository.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        let mut reference = repository.find_reference(head_name)?;
        reference.set_target(incoming.id(), "dotsync: fast-forward")?;
        return Ok(PullOutcome::FastForward {
            from: local.id(),
            to: incoming.id(),
        });
    }

    // INVARIANT: Merge in memory first, so a conflict never leaves the work
    //   tree or repository state half merged.
    let remote = repository.find_commit(incoming.id())?;
    let mut index = repository.merge_commits(&local, &remote, None)?;
    if index.has_conflicts() {
        let paths = index
            .conflicts()?
            .filter_map(|conflict| conflict.ok())
            .filter_map(|conflict| conflict.our.or(conflict.their))
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect::<Vec<_>>();
        return Err(UpstreamError::MergeConflict { paths });
    }

    let tree = repository.find_tree(index.write_tree_to(repository)?)?;
    repository.checkout_tree(tree.as_object(), Some(CheckoutBuilder::new().safe()))?;
    let signature = repository.signature()?;
    let commit = repository.commit(
        Some("HEAD"),
        &signature,
        &signature,
        &format!("Merge upstream into {}", head_name.trim_start_matches("refs/heads/")),
        &tree,
        &[&local, &remote],
    )?;

    Ok(PullOutcome::Merged { commit })
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Upstream pull error types.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// HEAD does not point at a local branch.
    #[error("HEAD is detached, no branch to pull into")]
    DetachedHead,

    /// Current branch does not track a remote branch.
    #[error("branch {branch:?} has no upstream to pull from")]
    NoUpstream { branch: String },

    /// Local and upstream revisions conflict.
    #[error("merge conflict in {}", paths.join(", "))]
    MergeConflict { paths: Vec<String> },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = UpstreamError> = std::result::Result<T, E>;
