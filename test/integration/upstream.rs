// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{RepoFixture, RepoKind};

use anyhow::Result;
use dotsync::sync::upstream::{Git2Upstream, PullOutcome, Upstream, UpstreamError};
use pretty_assertions::assert_eq;
use std::fs::read_to_string;
use tempfile::TempDir;

struct Remote {
    temp: TempDir,
    origin: RepoFixture,
    local: RepoFixture,
}

impl Remote {
    fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let origin = RepoFixture::new(temp.path().join("origin.git"), RepoKind::Bare)?;
        origin.stage_and_commit(".bashrc", "export A=1\n")?;
        let local = RepoFixture::clone_from(&origin, temp.path().join("local"))?;

        Ok(Self {
            temp,
            origin,
            local,
        })
    }

    fn pull(&self) -> dotsync::sync::upstream::Result<PullOutcome> {
        let root = self.local.repo().workdir().expect("clone has work tree");
        Git2Upstream::default().pull(root)
    }

    fn read_local(&self, name: &str) -> Result<String> {
        let root = self.local.repo().workdir().expect("clone has work tree");
        Ok(read_to_string(root.join(name))?)
    }
}

#[test]
fn pull_up_to_date() -> Result<()> {
    let remote = Remote::new()?;
    assert_eq!(remote.pull()?, PullOutcome::UpToDate);

    Ok(())
}

#[test]
fn pull_fast_forward() -> Result<()> {
    let remote = Remote::new()?;
    let from = remote.local.head_id()?;
    let to = remote.origin.stage_and_commit(".vimrc", "set nu\n")?;

    assert_eq!(remote.pull()?, PullOutcome::FastForward { from, to });
    assert_eq!(remote.local.head_id()?, to);
    assert_eq!(remote.read_local(".vimrc")?, "set nu\n");

    Ok(())
}

#[test]
fn pull_merges_diverged_branches() -> Result<()> {
    let remote = Remote::new()?;
    let theirs = remote.origin.stage_and_commit(".vimrc", "set nu\n")?;
    let ours = remote.local.stage_and_commit(".inputrc", "set editing-mode vi\n")?;

    let outcome = remote.pull()?;
    let PullOutcome::Merged { commit } = outcome else {
        panic!("expected merge commit, got {outcome:?}");
    };

    let merge = remote.local.repo().find_commit(commit)?;
    assert_eq!(merge.parent_ids().collect::<Vec<_>>(), vec![ours, theirs]);
    assert_eq!(remote.local.head_id()?, commit);
    assert_eq!(remote.read_local(".vimrc")?, "set nu\n");
    assert_eq!(remote.read_local(".inputrc")?, "set editing-mode vi\n");

    Ok(())
}

#[test]
fn pull_conflict_leaves_local_untouched() -> Result<()> {
    let remote = Remote::new()?;
    remote.origin.stage_and_commit(".bashrc", "export A=2\n")?;
    let ours = remote.local.stage_and_commit(".bashrc", "export A=3\n")?;

    let result = remote.pull();
    assert!(
        matches!(&result, Err(UpstreamError::MergeConflict { paths }) if paths == &[".bashrc"]),
        "unexpected result {result:?}"
    );
    assert_eq!(remote.local.head_id()?, ours);
    assert_eq!(remote.read_local(".bashrc")?, "export A=3\n");

    Ok(())
}

#[test]
fn pull_without_upstream_fails() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let repo = RepoFixture::new(temp.path(), RepoKind::Normal)?;
    repo.stage_and_commit(".bashrc", "export A=1\n")?;

    let result = Git2Upstream::default().pull(temp.path());
    assert!(matches!(result, Err(UpstreamError::NoUpstream { branch }) if branch == "main"));

    Ok(())
}

#[test]
fn pull_detached_head_fails() -> Result<()> {
    let remote = Remote::new()?;
    let head = remote.local.head_id()?;
    remote.local.repo().set_head_detached(head)?;

    let result = remote.pull();
    assert!(matches!(result, Err(UpstreamError::DetachedHead)));

    Ok(())
}

#[test]
fn pull_unreachable_remote_fails() -> Result<()> {
    let remote = Remote::new()?;
    let gone = remote.temp.path().join("gone.git");
    remote.local.repo().remote_set_url("origin", &gone.to_string_lossy())?;
    let head = remote.local.head_id()?;

    let result = remote.pull();
    assert!(matches!(result, Err(UpstreamError::Git2(_))), "unexpected result {result:?}");
    assert_eq!(remote.local.head_id()?, head);

    Ok(())
}
