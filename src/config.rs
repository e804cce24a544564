// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that dotsync uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! Two files are modeled here:
//!
//! 1. The __tool configuration__ at `dotsync.toml` in the source root, which
//!    tells the sync pipeline where to copy files, which paths to leave alone,
//!    and where the LLDB material lives.
//! 2. The __alias definition__ file, which declares every LLDB alias that
//!    ends up in the rendered init file.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Tool configuration layout.
///
/// Every section is optional. A missing `dotsync.toml` is the same as an
/// empty one.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Settings for the sync pipeline.
    pub sync: SyncSettings,

    /// Location of LLDB alias and command script material.
    pub lldb: LldbSettings,
}

impl FromStr for ToolConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: ToolConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.sync.destination = expand_path(&config.sync.destination)?;
        config.sync.profile = expand_path(&config.sync.profile)?;
        config.lldb.aliases = expand_path(&config.lldb.aliases)?;
        config.lldb.commands = expand_path(&config.lldb.commands)?;

        Ok(config)
    }
}

impl Display for ToolConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Sync pipeline settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Directory that receives the copied files.
    pub destination: PathBuf,

    /// Shell profile to reload after files are copied.
    pub profile: PathBuf,

    /// Extra exclusion patterns in gitignore syntax.
    ///
    /// Replaces the default extra exclusions when present. The mandatory
    /// exclusions are always applied on top.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("~"),
            profile: PathBuf::from("~/.bash_profile"),
            exclude: None,
        }
    }
}

/// LLDB material settings.
///
/// Relative paths are resolved against the source root by the caller.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LldbSettings {
    /// Alias definition file.
    pub aliases: PathBuf,

    /// Directory of command scripts to load at debugger startup.
    pub commands: PathBuf,
}

impl Default for LldbSettings {
    fn default() -> Self {
        Self {
            aliases: PathBuf::from("lldb/aliases.toml"),
            commands: PathBuf::from("lldb/commands"),
        }
    }
}

/// Alias definition layout.
///
/// A flat listing of `[[alias]]` tables. Validation of names and expansions
/// is left to [`AliasTable`](crate::alias::AliasTable).
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct AliasDefinition {
    /// Every declared alias in file order.
    #[serde(rename = "alias", default)]
    pub aliases: Vec<AliasDeclaration>,
}

impl FromStr for AliasDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for AliasDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// One alias declaration.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct AliasDeclaration {
    /// Invocation keyword.
    pub name: String,

    /// How the expansion is interpreted.
    pub kind: AliasKind,

    /// Command line, command template, or substitution rule.
    pub expansion: String,

    /// Short help text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    /// Long help text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_help: Option<String>,

    /// Syntax example.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
}

/// Behavioral variant of an alias.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasKind {
    /// Expands verbatim to a fixed command line.
    Literal,

    /// Applies a single match/replace through the host debugger.
    Regex,

    /// Substitutes positional arguments into a fixed template.
    Parameterized,
}

impl Display for AliasKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Literal => fmt.write_str("literal"),
            Self::Regex => fmt.write_str("regex"),
            Self::Parameterized => fmt.write_str("parameterized"),
        }
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah"), ("DOTS", "/srv/dots")])]
    fn deserialize_tool_config() -> anyhow::Result<()> {
        let result: ToolConfig = r#"
            [sync]
            destination = "~/sandbox"
            profile = "$DOTS/profile"
            exclude = ["README.md", "*.swp"]

            [lldb]
            aliases = "debug/aliases.toml"
        "#
        .parse()?;

        let expect = ToolConfig {
            sync: SyncSettings {
                destination: PathBuf::from("/home/blah/sandbox"),
                profile: PathBuf::from("/srv/dots/profile"),
                exclude: Some(vec!["README.md".into(), "*.swp".into()]),
            },
            lldb: LldbSettings {
                aliases: PathBuf::from("debug/aliases.toml"),
                commands: PathBuf::from("lldb/commands"),
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn empty_tool_config_uses_defaults() -> anyhow::Result<()> {
        let result: ToolConfig = "".parse()?;
        assert_eq!(result.sync.destination, PathBuf::from("/home/blah"));
        assert_eq!(result.sync.profile, PathBuf::from("/home/blah/.bash_profile"));
        assert_eq!(result.sync.exclude, None);
        assert_eq!(result.lldb, LldbSettings::default());

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn unknown_variable_fails_expansion() {
        let result = r#"
            [sync]
            profile = "$DOTSYNC_DOES_NOT_EXIST/profile"
        "#
        .parse::<ToolConfig>();
        assert!(matches!(result, Err(ConfigError::ShellExpansion(..))));
    }

    #[test]
    fn deserialize_alias_definition() -> anyhow::Result<()> {
        let result: AliasDefinition = r#"
            [[alias]]
            name = "reload_lldbinit"
            kind = "literal"
            expansion = "command source ~/.lldbinit"
            help = "Reload ~/.lldbinit"

            [[alias]]
            name = "docs"
            kind = "regex"
            expansion = "s/(.+)/platform shell open https://example.org/?q=%1/"
            syntax = "docs <query>"
        "#
        .parse()?;

        let expect = AliasDefinition {
            aliases: vec![
                AliasDeclaration {
                    name: "reload_lldbinit".into(),
                    kind: AliasKind::Literal,
                    expansion: "command source ~/.lldbinit".into(),
                    help: Some("Reload ~/.lldbinit".into()),
                    long_help: None,
                    syntax: None,
                },
                AliasDeclaration {
                    name: "docs".into(),
                    kind: AliasKind::Regex,
                    expansion: "s/(.+)/platform shell open https://example.org/?q=%1/".into(),
                    help: None,
                    long_help: None,
                    syntax: Some("docs <query>".into()),
                },
            ],
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_alias_definition() {
        let result = AliasDefinition {
            aliases: vec![AliasDeclaration {
                name: "elang".into(),
                kind: AliasKind::Parameterized,
                expansion: "settings set target.language %1".into(),
                help: Some("Select expression language".into()),
                long_help: None,
                syntax: None,
            }],
        }
        .to_string();

        let expect = indoc! {r#"
            [[alias]]
            name = "elang"
            kind = "parameterized"
            expansion = "settings set target.language %1"
            help = "Select expression language"
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn reject_unknown_alias_kind() {
        let result = r#"
            [[alias]]
            name = "bad"
            kind = "macro"
            expansion = "nope"
        "#
        .parse::<AliasDefinition>();
        assert!(matches!(result, Err(ConfigError::Deserialize(..))));
    }
}
