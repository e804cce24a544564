// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! LLDB command script scaffolding.
//!
//! Write a new Python command script skeleton into the command script
//! directory, so it gets picked up the next time the init file is rendered.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::OpenOptions,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Skeleton of a Python LLDB command script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptScaffold {
    module: String,
    command: String,
}

impl ScriptScaffold {
    /// Construct new scaffold.
    ///
    /// A trailing `.py` extension is dropped from `name`. The command name
    /// defaults to the module name.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::InvalidModule`] if name is not a valid
    ///   Python module name.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        let module = name.strip_suffix(".py").unwrap_or(name);

        let mut chars = module.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ScaffoldError::InvalidModule {
                name: name.to_string(),
            });
        }

        Ok(Self {
            module: module.to_string(),
            command: module.to_string(),
        })
    }

    /// Override command name registered with LLDB.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::InvalidCommand`] if name is empty or
    ///   contains whitespace or quotes.
    pub fn with_command_name(mut self, command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        if command.is_empty()
            || command
                .chars()
                .any(|c| c.is_whitespace() || c == '"' || c == '\'')
        {
            return Err(ScaffoldError::InvalidCommand { name: command });
        }

        self.command = command;
        Ok(self)
    }

    pub fn module(&self) -> &str {
        self.module.as_str()
    }

    pub fn command(&self) -> &str {
        self.command.as_str()
    }

    /// Write scaffold into directory as `<module>.py`.
    ///
    /// Directory is created if missing. Never overwrites an existing file.
    /// The new file is marked executable for its owner.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::AlreadyExists`] if target file exists.
    /// - Return [`ScaffoldError::Write`] if file cannot be written.
    #[instrument(skip(self, dir), level = "debug")]
    pub fn write_into(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(format!("{}.py", self.module));
        let write_err = |err| ScaffoldError::Write {
            source: err,
            path: path.clone(),
        };

        mkdirp::mkdirp(dir.as_ref()).map_err(write_err)?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(ScaffoldError::AlreadyExists { path: path.clone() });
            }
            Err(err) => return Err(write_err(err)),
        };
        file.write_all(self.to_string().as_bytes())
            .map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = file.metadata().map_err(write_err)?.permissions();
            permissions.set_mode(permissions.mode() | 0o100);
            file.set_permissions(permissions).map_err(write_err)?;
        }

        info!("created command script {:?}", path.display());
        Ok(path)
    }
}

/// Renders Python source of the command script.
impl Display for ScriptScaffold {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let module = &self.module;
        let command = &self.command;
        write!(
            fmt,
            r#""""
LLDB command `{command}`.

Usage:
(lldb) {command} [options] <args>
"""

import argparse
import shlex

import lldb


def __lldb_init_module(debugger, internal_dict):
    debugger.HandleCommand(
        'command script add -o -f {module}.handle_command {command} -h "Short documentation here"'
    )


def handle_command(debugger, command, exe_ctx, result, internal_dict):
    """Documentation for how to use {command} goes here."""
    parser = generate_option_parser()
    try:
        options = parser.parse_args(shlex.split(command))
    except (SystemExit, ValueError):
        result.SetError(parser.format_usage())
        return

    result.AppendMessage("Hello! the {command} command is working!")


def generate_option_parser():
    parser = argparse.ArgumentParser(prog="{command}", add_help=False)
    parser.add_argument(
        "-m",
        "--module",
        default=None,
        help="Placeholder option that takes a string",
    )
    parser.add_argument(
        "-c",
        "--check",
        action="store_true",
        default=False,
        help="Placeholder option that takes no value",
    )
    parser.add_argument("args", nargs="*")
    return parser
"#
        )
    }
}

/// Command script scaffolding error types.
#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    /// Name cannot be used as Python module.
    #[error("{name:?} is not a valid python module name")]
    InvalidModule { name: String },

    /// Name cannot be used as LLDB command.
    #[error("{name:?} is not a valid command name")]
    InvalidCommand { name: String },

    /// Script already exists at target path.
    #[error("command script already exists at {:?}, remove it first", path.display())]
    AlreadyExists { path: PathBuf },

    /// Script cannot be written.
    #[error("failed to write command script at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ScaffoldError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::read_to_string;

    #[test_case("lookup", "lookup"; "bare name")]
    #[test_case("msl.py", "msl"; "with extension")]
    #[test_case("_private", "_private"; "leading underscore")]
    #[test]
    fn accept_module_name(name: &str, expect: &str) {
        let scaffold = ScriptScaffold::new(name).expect("valid module name");
        pretty_assertions::assert_eq!(scaffold.module(), expect);
        pretty_assertions::assert_eq!(scaffold.command(), expect);
    }

    #[test_case(""; "empty")]
    #[test_case("9lives"; "leading digit")]
    #[test_case("break-after"; "dash")]
    #[test_case("../escape"; "path traversal")]
    #[test]
    fn reject_module_name(name: &str) {
        let result = ScriptScaffold::new(name);
        assert!(matches!(result, Err(ScaffoldError::InvalidModule { .. })));
    }

    #[test]
    fn override_command_name() -> anyhow::Result<()> {
        let scaffold = ScriptScaffold::new("breakafterregex")?.with_command_name("bar")?;
        let source = scaffold.to_string();

        assert!(source.contains("-f breakafterregex.handle_command bar -h"));
        assert!(source.contains(r#"prog="bar""#));
        assert!(matches!(
            ScriptScaffold::new("x")?.with_command_name("two words"),
            Err(ScaffoldError::InvalidCommand { .. })
        ));

        Ok(())
    }

    #[test]
    fn unbalanced_quotes_report_usage() -> anyhow::Result<()> {
        let source = ScriptScaffold::new("lookup")?.to_string();
        assert!(source.contains("except (SystemExit, ValueError):"));
        assert!(!source.contains("except SystemExit:"));

        Ok(())
    }

    #[test]
    fn write_scaffold_once() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("lldb").join("commands");
        let scaffold = ScriptScaffold::new("lookup")?;

        let path = scaffold.write_into(&dir)?;
        assert_eq!(path, dir.join("lookup.py"));
        assert_eq!(read_to_string(&path)?, scaffold.to_string());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path)?.permissions().mode();
            assert_eq!(mode & 0o100, 0o100);
        }

        std::fs::write(&path, "# edited")?;
        let result = scaffold.write_into(&dir);
        assert!(matches!(result, Err(ScaffoldError::AlreadyExists { .. })));
        assert_eq!(read_to_string(&path)?, "# edited");

        Ok(())
    }
}
