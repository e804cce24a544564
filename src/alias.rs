// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! LLDB alias table.
//!
//! An __alias__ is a named shortcut that LLDB expands before executing
//! anything. Dotsync keeps every alias in a static definition file, validates
//! the surrounding syntax of each declaration, and renders the whole table
//! into the line-oriented declarations that LLDB reads at startup.
//!
//! # Alias Kinds
//!
//! 1. __Literal__ aliases expand verbatim to a fixed command line.
//! 2. __Regex__ aliases hand free text to LLDB's own substitution engine,
//!    which applies one `s/<match>/<replace>/` rule and re-dispatches the
//!    result as a new command. Only the first capture group `%1` is
//!    supported.
//! 3. __Parameterized__ aliases substitute positional arguments into the
//!    `%1`, `%2`, ... placeholders of a fixed command template.
//!
//! Substitution rules are opaque payloads. Dotsync checks that a rule has the
//! shape LLDB expects, but never compiles or runs the regular expression
//! itself. A rule that LLDB rejects still fails at first use inside the
//! debugger.
//!
//! # See Also
//!
//! - [LLDB command aliases](https://lldb.llvm.org/use/tutorial.html#command-aliases)
//! - [`AliasDefinition`](crate::config::AliasDefinition)

use crate::config::{AliasDeclaration, AliasDefinition, AliasKind, ConfigError};

use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

const BUILTIN_ALIASES: &str = include_str!("../lldb/aliases.toml");

/// Table of validated aliases.
///
/// # Invariant
///
/// - Alias names are unique.
/// - Declaration order is preserved for rendering.
/// - Immutable once loaded. Use [`AliasTable::reload`] to get a fresh table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
    index: HashMap<String, usize>,
    origin: TableOrigin,
}

impl AliasTable {
    /// Load alias table from definition file.
    ///
    /// # Errors
    ///
    /// - Return [`AliasError::ReadDefinition`] if file cannot be read.
    /// - Return [`AliasError::Config`] if file is not a valid definition.
    /// - Return validation errors for bad names, duplicates, or malformed
    ///   expansions.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        debug!("load alias table: {:?}", path.as_ref().display());
        let data = read_to_string(path.as_ref()).map_err(|err| AliasError::ReadDefinition {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;
        let definition: AliasDefinition = data.parse()?;

        Self::from_definition(definition, TableOrigin::File(path.as_ref().to_path_buf()))
    }

    /// Alias table bundled with dotsync.
    ///
    /// # Errors
    ///
    /// - Return validation errors if bundled definition is broken.
    pub fn builtin() -> Result<Self> {
        let definition: AliasDefinition = BUILTIN_ALIASES.parse()?;
        Self::from_definition(definition, TableOrigin::Builtin)
    }

    /// Construct alias table from parsed definition.
    ///
    /// # Errors
    ///
    /// - Return [`AliasError::DuplicateAlias`] if a name is declared twice.
    /// - Return other validation errors from [`AliasEntry::try_from`].
    pub fn from_definition(definition: AliasDefinition, origin: TableOrigin) -> Result<Self> {
        let mut entries = Vec::with_capacity(definition.aliases.len());
        let mut index = HashMap::with_capacity(definition.aliases.len());

        for declaration in definition.aliases {
            let entry = AliasEntry::try_from(declaration)?;
            if index.contains_key(entry.name()) {
                return Err(AliasError::DuplicateAlias {
                    name: entry.name().to_string(),
                });
            }

            index.insert(entry.name().to_string(), entries.len());
            entries.push(entry);
        }

        Ok(Self {
            entries,
            index,
            origin,
        })
    }

    /// Re-read alias table from where it originally came from.
    ///
    /// The current table is left untouched.
    ///
    /// # Errors
    ///
    /// - Return same errors as [`AliasTable::load`] or
    ///   [`AliasTable::builtin`].
    pub fn reload(&self) -> Result<Self> {
        match &self.origin {
            TableOrigin::Builtin => Self::builtin(),
            TableOrigin::File(path) => Self::load(path),
            TableOrigin::Inline => Err(AliasError::NoOrigin),
        }
    }

    /// Find alias by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&AliasEntry> {
        self.index
            .get(name.as_ref())
            .map(|position| &self.entries[*position])
    }

    /// Resolve invocation of alias with given input.
    ///
    /// Pure function of the table and the input, so the same invocation
    /// always produces the same expansion.
    ///
    /// # Errors
    ///
    /// - Return [`AliasError::NoSuchAlias`] if name is not in table.
    /// - Return [`AliasError::MissingArgument`] if a parameterized alias does
    ///   not get enough arguments.
    pub fn resolve(&self, name: impl AsRef<str>, input: impl AsRef<str>) -> Result<Expansion> {
        let entry = self.get(name.as_ref()).ok_or_else(|| AliasError::NoSuchAlias {
            name: name.as_ref().to_string(),
        })?;

        entry.resolve(input)
    }

    /// Iterate through aliases in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &AliasEntry> {
        self.entries.iter()
    }

    /// Number of aliases in table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if table has no aliases.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Where this table was loaded from.
    pub fn origin(&self) -> &TableOrigin {
        &self.origin
    }
}

impl FromStr for AliasTable {
    type Err = AliasError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::from_definition(data.parse()?, TableOrigin::Inline)
    }
}

/// Renders every alias as one LLDB declaration per line.
impl Display for AliasTable {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for entry in &self.entries {
            writeln!(fmt, "{entry}")?;
        }

        Ok(())
    }
}

/// Source of an alias table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOrigin {
    /// Definition bundled with dotsync.
    Builtin,

    /// Definition file on disk.
    File(PathBuf),

    /// Parsed from a string with nothing to reload from.
    Inline,
}

/// A validated alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    name: String,
    body: AliasBody,
    help: Option<String>,
    long_help: Option<String>,
    syntax: Option<String>,
}

impl AliasEntry {
    /// Invocation keyword.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Behavioral variant.
    pub fn kind(&self) -> AliasKind {
        match self.body {
            AliasBody::Literal(_) => AliasKind::Literal,
            AliasBody::Regex(_) => AliasKind::Regex,
            AliasBody::Parameterized(_) => AliasKind::Parameterized,
        }
    }

    /// Raw expansion text.
    pub fn expansion(&self) -> &str {
        match &self.body {
            AliasBody::Literal(command) => command.as_str(),
            AliasBody::Regex(rule) => rule.as_str(),
            AliasBody::Parameterized(template) => template.as_str(),
        }
    }

    /// Ordered placeholder tokens, e.g., `["%1", "%2"]`.
    pub fn parameters(&self) -> Vec<String> {
        match &self.body {
            AliasBody::Literal(_) => Vec::new(),
            AliasBody::Regex(_) => vec!["%1".into()],
            AliasBody::Parameterized(template) => (1..=template.arity())
                .map(|position| format!("%{position}"))
                .collect(),
        }
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn long_help(&self) -> Option<&str> {
        self.long_help.as_deref()
    }

    pub fn syntax(&self) -> Option<&str> {
        self.syntax.as_deref()
    }

    /// Resolve invocation of this alias with given input.
    ///
    /// # Errors
    ///
    /// - Return [`AliasError::MissingArgument`] if a parameterized alias does
    ///   not get enough arguments.
    pub fn resolve(&self, input: impl AsRef<str>) -> Result<Expansion> {
        let input = input.as_ref().trim();
        match &self.body {
            AliasBody::Literal(command) => Ok(Expansion::Command(append_args(command, input))),
            AliasBody::Regex(rule) => Ok(Expansion::Deferred {
                rule: rule.clone(),
                input: input.to_string(),
            }),
            AliasBody::Parameterized(template) => {
                let args = input.split_whitespace().collect::<Vec<_>>();
                if args.len() < template.arity() {
                    return Err(AliasError::MissingArgument {
                        name: self.name.clone(),
                        expected: template.arity(),
                        given: args.len(),
                    });
                }

                let command = template.substitute(&args[..template.arity()]);
                Ok(Expansion::Command(append_args(
                    &command,
                    &args[template.arity()..].join(" "),
                )))
            }
        }
    }
}

impl TryFrom<AliasDeclaration> for AliasEntry {
    type Error = AliasError;

    fn try_from(declaration: AliasDeclaration) -> Result<Self, Self::Error> {
        let name = declaration.name;
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
            return Err(AliasError::InvalidName { name });
        }

        let body = match declaration.kind {
            AliasKind::Literal => AliasBody::Literal(declaration.expansion),
            AliasKind::Regex => match declaration.expansion.parse() {
                Ok(rule) => AliasBody::Regex(rule),
                Err(source) => return Err(AliasError::MalformedRule { name, source }),
            },
            AliasKind::Parameterized => match declaration.expansion.parse() {
                Ok(template) => AliasBody::Parameterized(template),
                Err(source) => return Err(AliasError::MalformedTemplate { name, source }),
            },
        };

        Ok(Self {
            name,
            body,
            help: declaration.help,
            long_help: declaration.long_help,
            syntax: declaration.syntax,
        })
    }
}

/// Renders alias as the LLDB declaration that defines it.
impl Display for AliasEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.body {
            AliasBody::Regex(rule) => {
                write!(fmt, "command regex {}", self.name)?;
                if let Some(help) = &self.help {
                    write!(fmt, " -h {}", quote(help))?;
                }
                if let Some(syntax) = &self.syntax {
                    write!(fmt, " -s {}", quote(syntax))?;
                }
                write!(fmt, " {}", quote_rule(rule.as_str()))
            }
            AliasBody::Literal(_) | AliasBody::Parameterized(_) => {
                fmt.write_str("command alias")?;
                if let Some(help) = &self.help {
                    write!(fmt, " -h {}", quote(help))?;
                }
                if let Some(long_help) = &self.long_help {
                    write!(fmt, " -H {}", quote(long_help))?;
                }
                write!(fmt, " -- {} {}", self.name, self.expansion())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AliasBody {
    Literal(String),
    Regex(SubstitutionRule),
    Parameterized(CommandTemplate),
}

/// Result of resolving an alias invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Command line ready to be dispatched.
    Command(String),

    /// Input handed to the host debugger's substitution engine as-is.
    Deferred {
        rule: SubstitutionRule,
        input: String,
    },
}

impl Display for Expansion {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Command(command) => fmt.write_str(command),
            Self::Deferred { rule, input } => write!(fmt, "{rule} <- {input:?}"),
        }
    }
}

/// Substitution rule in LLDB's `s<d>match<d>replace<d>` form.
///
/// Any non-alphanumeric, non-whitespace character may act as the delimiter
/// `d`. A delimiter can appear inside either expression when escaped with a
/// backslash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRule {
    raw: String,
    delimiter: char,
    match_expr: String,
    replace_expr: String,
}

impl SubstitutionRule {
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Expression that input is matched against.
    pub fn match_expr(&self) -> &str {
        self.match_expr.as_str()
    }

    /// Command line dispatched after substitution.
    pub fn replace_expr(&self) -> &str {
        self.replace_expr.as_str()
    }
}

impl FromStr for SubstitutionRule {
    type Err = RuleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut chars = raw.chars();
        if chars.next() != Some('s') {
            return Err(RuleError::MissingPrefix);
        }

        let delimiter = chars.next().ok_or(RuleError::Unterminated)?;
        if delimiter.is_alphanumeric() || delimiter.is_whitespace() || delimiter == '\\' {
            return Err(RuleError::InvalidDelimiter(delimiter));
        }

        // Split on unescaped delimiters. Expect exactly match, replace, and
        // an empty tail.
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        for c in chars {
            if c == delimiter && !escaped {
                parts.push(std::mem::take(&mut current));
                continue;
            }

            escaped = !escaped && c == '\\';
            current.push(c);
        }
        parts.push(current);

        if parts.len() < 3 {
            return Err(RuleError::Unterminated);
        }

        let tail = parts.split_off(2);
        if tail.len() > 1 || tail.iter().any(|part| !part.is_empty()) {
            return Err(RuleError::TrailingInput(tail.join(&delimiter.to_string())));
        }

        let replace_expr = parts.pop().unwrap_or_default();
        let match_expr = parts.pop().unwrap_or_default();
        if match_expr.is_empty() {
            return Err(RuleError::EmptyMatch);
        }

        // INVARIANT: Only the first capture group can be referenced.
        if let Some(placeholder) = placeholders(&replace_expr).find(|position| *position != 1) {
            return Err(RuleError::UnsupportedCapture(format!("%{placeholder}")));
        }

        Ok(Self {
            raw: raw.to_string(),
            delimiter,
            match_expr,
            replace_expr,
        })
    }
}

impl Display for SubstitutionRule {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Command template with `%N` placeholders.
///
/// # Invariant
///
/// - At least one placeholder.
/// - Placeholders are contiguous from `%1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
    arity: usize,
}

impl CommandTemplate {
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Number of distinct positional placeholders.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Substitute arguments into placeholders verbatim.
    ///
    /// Placeholders without a matching argument are left as they are.
    pub fn substitute(&self, args: &[&str]) -> String {
        let mut out = String::with_capacity(self.raw.len());
        let mut chars = self.raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }

            let mut digits = String::new();
            while let Some(next) = chars.next_if(char::is_ascii_digit) {
                digits.push(next);
            }

            match digits
                .parse::<usize>()
                .ok()
                .and_then(|position| position.checked_sub(1))
                .and_then(|offset| args.get(offset))
            {
                Some(arg) => out.push_str(arg),
                None => {
                    out.push('%');
                    out.push_str(&digits);
                }
            }
        }

        out
    }
}

impl FromStr for CommandTemplate {
    type Err = TemplateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut positions = placeholders(raw).collect::<Vec<_>>();
        positions.sort_unstable();
        positions.dedup();

        if positions.is_empty() {
            return Err(TemplateError::NoPlaceholders);
        }

        for (offset, position) in positions.iter().enumerate() {
            if *position != offset + 1 {
                return Err(TemplateError::Gap {
                    missing: format!("%{}", offset + 1),
                });
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            arity: positions.len(),
        })
    }
}

/// Yield every `%N` position in text.
fn placeholders(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.match_indices('%').filter_map(move |(offset, _)| {
        let digits = text[offset + 1..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>();
        digits.parse::<usize>().ok()
    })
}

fn append_args(command: &str, args: &str) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {args}")
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_rule(rule: &str) -> String {
    if rule.contains('\'') {
        quote(rule)
    } else {
        format!("'{rule}'")
    }
}

/// Malformed substitution rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("substitution rule must start with 's'")]
    MissingPrefix,

    #[error("character {0:?} cannot delimit a substitution rule")]
    InvalidDelimiter(char),

    #[error("substitution rule is missing a closing delimiter")]
    Unterminated,

    #[error("unexpected text after substitution rule: {0:?}")]
    TrailingInput(String),

    #[error("substitution rule has an empty match expression")]
    EmptyMatch,

    #[error("only %1 can be referenced in replacement, found {0}")]
    UnsupportedCapture(String),
}

/// Malformed command template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("parameterized command has no %N placeholders")]
    NoPlaceholders,

    #[error("parameterized command skips placeholder {missing}")]
    Gap { missing: String },
}

/// Alias table error types.
#[derive(Debug, thiserror::Error)]
pub enum AliasError {
    /// Alias definition file cannot be read.
    #[error("failed to read alias definition at {:?}", path.display())]
    ReadDefinition {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Alias definition cannot be parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invoked name is not in the table.
    #[error("no such alias {name:?}")]
    NoSuchAlias { name: String },

    /// Same name declared more than once.
    #[error("alias {name:?} is declared more than once")]
    DuplicateAlias { name: String },

    /// Name cannot be used as an LLDB command keyword.
    #[error("alias name {name:?} is not a valid command keyword")]
    InvalidName { name: String },

    /// Regex alias has a malformed substitution rule.
    #[error("alias {name:?} has a malformed substitution rule")]
    MalformedRule {
        #[source]
        source: RuleError,
        name: String,
    },

    /// Parameterized alias has a malformed template.
    #[error("alias {name:?} has a malformed command template")]
    MalformedTemplate {
        #[source]
        source: TemplateError,
        name: String,
    },

    /// Parameterized alias invoked with too few arguments.
    #[error("alias {name:?} expects {expected} argument(s), got {given}")]
    MissingArgument {
        name: String,
        expected: usize,
        given: usize,
    },

    /// Table was not loaded from anywhere that can be read again.
    #[error("alias table has no origin to reload from")]
    NoOrigin,
}

/// Friendly result alias :3
pub type Result<T, E = AliasError> = std::result::Result<T, E>;
