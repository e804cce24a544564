// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{RepoFixture, RepoKind};

use anyhow::Result;
use dotsync::{
    config::ToolConfig,
    sync::{
        confirm::StreamPrompt,
        reload::ShellProfile,
        upstream::{Git2Upstream, PullOutcome},
        RunMode, Step, SyncConfig, SyncOutcome, Synchronizer,
    },
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{
    fs::{read_dir, read_to_string, write},
    io::Cursor,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

struct Dotfiles {
    temp: TempDir,
    origin: RepoFixture,
    local: RepoFixture,
}

impl Dotfiles {
    fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let origin = RepoFixture::new(temp.path().join("origin.git"), RepoKind::Bare)?;
        origin.stage_and_commit(".bashrc", "export A=1\n")?;
        origin.stage_and_commit(".config/git/config", "[user]\n")?;
        origin.stage_and_commit("bootstrap.sh", "#!/bin/sh\n")?;
        origin.stage_and_commit("README.md", "# dots\n")?;
        origin.stage_and_commit("notes.swp", "junk\n")?;
        origin.stage_and_commit(
            "dotsync.toml",
            indoc! {r#"
                [sync]
                destination = "home"
                profile = "home/.profile"
                exclude = ["*.swp"]
            "#},
        )?;
        let local = RepoFixture::clone_from(&origin, temp.path().join("local"))?;

        let home = temp.path().join("local").join("home");
        std::fs::create_dir_all(&home)?;
        write(home.join(".profile"), "export DOTSYNC_SYNCED=yes\n")?;

        Ok(Self {
            temp,
            origin,
            local,
        })
    }

    fn root(&self) -> &Path {
        self.local.repo().workdir().expect("clone has work tree")
    }

    fn config(&self) -> Result<SyncConfig> {
        let tool: ToolConfig = read_to_string(self.root().join("dotsync.toml"))?.parse()?;
        Ok(SyncConfig::from_settings(self.root(), &tool.sync))
    }

    fn home(&self) -> PathBuf {
        self.root().join("home")
    }

    fn home_entries(&self) -> Result<Vec<String>> {
        let mut entries = read_dir(self.home())?
            .map(|entry| -> Result<String> {
                Ok(entry?.file_name().to_string_lossy().into_owned())
            })
            .collect::<Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }
}

#[test]
fn declined_sync_pulls_but_copies_nothing() -> Result<()> {
    let dots = Dotfiles::new()?;
    let to = dots.origin.stage_and_commit(".vimrc", "set nu\n")?;
    let from = dots.local.head_id()?;

    let mut output = Vec::new();
    let prompt = StreamPrompt::new(Cursor::new("nope\n"), &mut output);
    let sync = Synchronizer::new(
        dots.config()?,
        RunMode::Interactive,
        Git2Upstream::default(),
        prompt,
        ShellProfile::new(dots.home().join(".profile")).with_shell("sh"),
    );

    let outcome = sync.run()?;
    assert_eq!(
        outcome,
        SyncOutcome::Declined {
            pull: PullOutcome::FastForward { from, to }
        }
    );
    assert_eq!(dots.home_entries()?, vec![".profile"]);
    assert!(String::from_utf8(output)?.ends_with("(y/n) "));

    Ok(())
}

#[cfg(unix)]
#[test]
fn forced_sync_mirrors_and_reloads() -> Result<()> {
    let dots = Dotfiles::new()?;
    let sync = Synchronizer::new(
        dots.config()?,
        RunMode::Force,
        Git2Upstream::default(),
        StreamPrompt::new(Cursor::new(""), Vec::new()),
        ShellProfile::new(dots.home().join(".profile")).with_shell("sh"),
    );

    let SyncOutcome::Completed {
        pull,
        report,
        environment,
    } = sync.run()?
    else {
        panic!("forced sync must complete");
    };

    assert_eq!(pull, PullOutcome::UpToDate);
    assert_eq!(
        report.written,
        vec![PathBuf::from(".bashrc"), PathBuf::from(".config/git/config")]
    );
    assert_eq!(
        dots.home_entries()?,
        vec![".bashrc", ".config", ".profile"]
    );
    assert_eq!(read_to_string(dots.home().join(".bashrc"))?, "export A=1\n");
    assert_eq!(environment.get("DOTSYNC_SYNCED"), Some("yes"));

    Ok(())
}

#[test]
fn unreachable_remote_aborts_before_copy() -> Result<()> {
    let dots = Dotfiles::new()?;
    let gone = dots.temp.path().join("gone.git");
    dots.local
        .repo()
        .remote_set_url("origin", &gone.to_string_lossy())?;

    let sync = Synchronizer::new(
        dots.config()?,
        RunMode::Force,
        Git2Upstream::default(),
        StreamPrompt::new(Cursor::new(""), Vec::new()),
        ShellProfile::new(dots.home().join(".profile")).with_shell("sh"),
    );

    let result = sync.run();
    assert!(
        matches!(&result, Err(err) if err.step() == Step::Pull),
        "unexpected result {result:?}"
    );
    assert_eq!(dots.home_entries()?, vec![".profile"]);

    Ok(())
}
