// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell profile reloading.
//!
//! A child process cannot change the environment of the shell that started
//! it. Instead of pretending otherwise, reloading the profile produces a new
//! immutable [`Environment`] snapshot of what the profile sets up, which the
//! caller can inspect, diff, or hand to child processes.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, instrument};

// Source profile with stdout silenced, then dump environment NUL separated.
const RELOAD_SCRIPT: &str = r#". "$1" >/dev/null || exit $?; env -0"#;

/// Produce fresh environment snapshot from shell configuration.
pub trait Reload {
    fn reload(&self) -> Result<Environment>;
}

/// Reload by sourcing a profile in a shell subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellProfile {
    shell: PathBuf,
    profile: PathBuf,
}

impl ShellProfile {
    /// Construct new shell profile reloader that uses bash.
    pub fn new(profile: impl Into<PathBuf>) -> Self {
        Self {
            shell: PathBuf::from("bash"),
            profile: profile.into(),
        }
    }

    /// Use a different shell to source the profile.
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn profile(&self) -> &Path {
        self.profile.as_path()
    }
}

impl Reload for ShellProfile {
    #[instrument(skip(self), level = "debug")]
    fn reload(&self) -> Result<Environment> {
        if !self.profile.is_file() {
            return Err(ReloadError::ProfileMissing {
                path: self.profile.clone(),
            });
        }

        debug!("source {:?} with {:?}", self.profile.display(), self.shell.display());
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(RELOAD_SCRIPT)
            .arg("dotsync")
            .arg(&self.profile)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|err| ReloadError::Spawn {
                source: err,
                shell: self.shell.clone(),
            })?;

        if !output.status.success() {
            return Err(ReloadError::Source {
                path: self.profile.clone(),
                code: output.status.code(),
            });
        }

        Ok(Environment::from_env_block(&output.stdout))
    }
}

/// Immutable snapshot of environment variables.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Snapshot environment of current process.
    pub fn capture() -> Self {
        std::env::vars_os()
            .map(|(key, value)| (lossy(&key), lossy(&value)))
            .collect()
    }

    /// Parse NUL separated `KEY=VALUE` block, as printed by `env -0`.
    ///
    /// Entries without `=` are skipped.
    pub fn from_env_block(block: &[u8]) -> Self {
        block
            .split(|byte| *byte == 0)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let entry = String::from_utf8_lossy(entry);
                entry
                    .split_once('=')
                    .map(|(key, value)| (key.to_string(), value.to_string()))
            })
            .collect()
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.vars.get(key.as_ref()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// List variables that differ from a prior snapshot, sorted by name.
    pub fn changes_since(&self, prior: &Environment) -> Vec<EnvChange> {
        let mut changes = Vec::new();
        for (key, value) in &self.vars {
            match prior.vars.get(key) {
                None => changes.push(EnvChange::Added(key.clone())),
                Some(old) if old != value => changes.push(EnvChange::Modified(key.clone())),
                Some(_) => {}
            }
        }

        for key in prior.vars.keys() {
            if !self.vars.contains_key(key) {
                changes.push(EnvChange::Removed(key.clone()));
            }
        }
        changes.sort_by(|a, b| a.key().cmp(b.key()));

        changes
    }
}

impl FromIterator<(String, String)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Difference of one variable between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange {
    Added(String),
    Modified(String),
    Removed(String),
}

impl EnvChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Added(key) | Self::Modified(key) | Self::Removed(key) => key.as_str(),
        }
    }
}

fn lossy(value: &OsStr) -> String {
    value.to_string_lossy().into_owned()
}

/// Profile reload error types.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    /// Profile does not exist.
    #[error("shell profile {:?} does not exist", path.display())]
    ProfileMissing { path: PathBuf },

    /// Shell cannot be spawned.
    #[error("failed to spawn shell {:?}", shell.display())]
    Spawn {
        #[source]
        source: std::io::Error,
        shell: PathBuf,
    },

    /// Sourcing profile exited with failure.
    #[error("sourcing {:?} failed with exit code {code:?}", path.display())]
    Source { path: PathBuf, code: Option<i32> },
}

/// Friendly result alias :3
pub type Result<T, E = ReloadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_env_block() {
        let result = Environment::from_env_block(b"HOME=/home/blah\0EMPTY=\0JUNK\0EQ=a=b\0");
        let expect = Environment::from_iter([
            ("EMPTY".to_string(), String::new()),
            ("EQ".to_string(), "a=b".to_string()),
            ("HOME".to_string(), "/home/blah".to_string()),
        ]);
        assert_eq!(result, expect);
        assert_eq!(result.get("EQ"), Some("a=b"));
    }

    #[test]
    fn diff_environment_snapshots() {
        let prior = Environment::from_iter([
            ("KEEP".to_string(), "1".to_string()),
            ("GONE".to_string(), "1".to_string()),
            ("EDIT".to_string(), "1".to_string()),
        ]);
        let next = Environment::from_iter([
            ("KEEP".to_string(), "1".to_string()),
            ("EDIT".to_string(), "2".to_string()),
            ("ADDED".to_string(), "1".to_string()),
        ]);

        let result = next.changes_since(&prior);
        let expect = vec![
            EnvChange::Added("ADDED".into()),
            EnvChange::Modified("EDIT".into()),
            EnvChange::Removed("GONE".into()),
        ];
        assert_eq!(result, expect);
    }

    #[test]
    fn missing_profile_fails() {
        let result = ShellProfile::new("/definitely/not/here/.bash_profile").reload();
        assert!(matches!(result, Err(ReloadError::ProfileMissing { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn reload_profile_into_snapshot() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let profile = temp.path().join("profile");
        std::fs::write(&profile, "export DOTSYNC_RELOADED=yes\necho noise\n")?;

        let environment = ShellProfile::new(&profile).with_shell("sh").reload()?;
        assert_eq!(environment.get("DOTSYNC_RELOADED"), Some("yes"));
        assert_eq!(std::env::var("DOTSYNC_RELOADED").ok(), None);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn failing_profile_fails_reload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let profile = temp.path().join("profile");
        std::fs::write(&profile, "return 3\n")?;

        let result = ShellProfile::new(&profile).with_shell("sh").reload();
        assert!(matches!(result, Err(ReloadError::Source { code: Some(3), .. })));

        Ok(())
    }
}
