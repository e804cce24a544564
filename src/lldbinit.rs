// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! LLDB init file rendering.
//!
//! LLDB reads `~/.lldbinit` at startup. Dotsync renders that file from two
//! sources: the alias table, and a directory of command scripts. Python
//! scripts get imported through `command script import`, and plain text
//! command files get sourced through `command source -e0 -s1` so a failing
//! line neither stops the rest of the file nor echoes anything.

use crate::alias::AliasTable;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_dir,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Command script that LLDB loads at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    path: PathBuf,
    kind: ScriptKind,
}

impl CommandScript {
    /// Classify path as command script by extension.
    ///
    /// Returns `None` for anything LLDB cannot load, hidden files, and
    /// package markers like `__init__.py`.
    pub fn classify(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') || file_name.starts_with("__init__") {
            return None;
        }

        let kind = match path.extension()?.to_str()? {
            "py" => ScriptKind::Python,
            "txt" => ScriptKind::CommandFile,
            _ => return None,
        };

        Some(Self { path, kind })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }
}

impl Display for CommandScript {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let path = self.path.to_string_lossy();
        let path = if path.contains(char::is_whitespace) {
            format!("\"{path}\"")
        } else {
            path.into_owned()
        };

        match self.kind {
            ScriptKind::Python => write!(fmt, "command script import {path}"),
            ScriptKind::CommandFile => write!(fmt, "command source -e0 -s1 {path}"),
        }
    }
}

/// How LLDB loads a command script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Python module imported into the script interpreter.
    Python,

    /// Plain list of LLDB commands.
    CommandFile,
}

/// Scan directory for command scripts.
///
/// Only the top-level of the directory is scanned. Results are sorted by
/// path so the rendered init file is stable. A missing directory yields an
/// empty listing.
///
/// # Errors
///
/// - Return [`InitError::ReadCommandDir`] if directory exists but cannot be
///   read.
#[instrument(skip(dir), level = "debug")]
pub fn scan_commands(dir: impl AsRef<Path>) -> Result<Vec<CommandScript>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        warn!("command script directory {:?} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let read_err = |err| InitError::ReadCommandDir {
        source: err,
        path: dir.to_path_buf(),
    };

    let mut scripts = Vec::new();
    for entry in read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if !entry.file_type().map_err(read_err)?.is_file() {
            continue;
        }

        match CommandScript::classify(entry.path()) {
            Some(script) => scripts.push(script),
            None => debug!("skip {:?}", entry.path().display()),
        }
    }
    scripts.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(scripts)
}

/// Fully rendered LLDB init file.
#[derive(Debug, Clone)]
pub struct InitFile<'table> {
    aliases: &'table AliasTable,
    scripts: Vec<CommandScript>,
}

impl<'table> InitFile<'table> {
    /// Construct new init file from aliases and command scripts.
    pub fn new(aliases: &'table AliasTable, scripts: Vec<CommandScript>) -> Self {
        Self { aliases, scripts }
    }
}

/// Scripts come first so aliases can refer to commands they register.
impl Display for InitFile<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "# Generated by dotsync. Edit the alias definition instead.")?;

        if !self.scripts.is_empty() {
            writeln!(fmt)?;
            for script in &self.scripts {
                writeln!(fmt, "{script}")?;
            }
        }

        if !self.aliases.is_empty() {
            writeln!(fmt)?;
            write!(fmt, "{}", self.aliases)?;
        }

        Ok(())
    }
}

/// Init file rendering error types.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// Command script directory cannot be read.
    #[error("failed to read command script directory {:?}", path.display())]
    ReadCommandDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = InitError> = std::result::Result<T, E>;
