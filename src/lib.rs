// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile synchronization and LLDB alias management.
//!
//! Dotsync keeps a home directory in step with a Git repository of dotfiles.
//! A run pulls the latest upstream revision, asks before overwriting
//! anything, mirrors the repository into the home directory minus a set of
//! excluded paths, and reloads the shell profile. See [`sync`] for the
//! pipeline itself.
//!
//! The repository also ships a table of LLDB aliases. Dotsync validates that
//! table, resolves aliases the way LLDB would, and renders an init file that
//! LLDB can source at startup. See [`alias`] and [`lldbinit`].

pub mod alias;
pub mod config;
pub mod lldbinit;
pub mod path;
pub mod scaffold;
pub mod sync;

pub use alias::{AliasEntry, AliasTable, Expansion};
pub use config::{AliasDefinition, AliasKind, ToolConfig};
pub use sync::{RunMode, SyncConfig, SyncOutcome, Synchronizer};
