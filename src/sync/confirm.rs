// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator confirmation before files get overwritten.
//!
//! Only an answer that starts with `y` or `Y` counts as a yes. Everything
//! else, including an empty answer or end of input, is a no.

use inquire::{InquireError, Text};
use std::io::{BufRead, Write};

/// Ask operator a yes or no question.
pub trait Confirm {
    /// Return `true` if operator answered yes.
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Check if answer counts as a yes.
pub fn is_affirmative(answer: impl AsRef<str>) -> bool {
    answer.as_ref().starts_with(['y', 'Y'])
}

/// Interactive terminal prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompt;

impl InquirePrompt {
    pub fn new() -> Self {
        Self
    }
}

impl Confirm for InquirePrompt {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        match Text::new(question).with_placeholder("y/n").prompt() {
            Ok(answer) => Ok(is_affirmative(answer)),
            Err(InquireError::OperationCanceled) => Ok(false),
            Err(InquireError::OperationInterrupted) => Err(ConfirmError::Interrupted),
            Err(err) => Err(ConfirmError::Prompt(err)),
        }
    }
}

/// Prompt over plain streams.
///
/// Used when standard input is not a terminal, e.g., piped input.
#[derive(Debug)]
pub struct StreamPrompt<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> StreamPrompt<R, W>
where
    R: BufRead,
    W: Write,
{
    /// Construct new stream prompt.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R, W> Confirm for StreamPrompt<R, W>
where
    R: BufRead,
    W: Write,
{
    fn confirm(&mut self, question: &str) -> Result<bool> {
        write!(self.writer, "{question} (y/n) ").map_err(ConfirmError::Io)?;
        self.writer.flush().map_err(ConfirmError::Io)?;

        let mut answer = String::new();
        self.reader
            .read_line(&mut answer)
            .map_err(ConfirmError::Io)?;

        Ok(is_affirmative(answer))
    }
}

/// Confirmation error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    /// Operator interrupted the prompt.
    #[error("prompt interrupted")]
    Interrupted,

    /// Terminal prompt failed.
    #[error(transparent)]
    Prompt(#[from] InquireError),

    /// Stream prompt failed.
    #[error("failed to read answer")]
    Io(#[source] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ConfirmError> = std::result::Result<T, E>;
