//! Reading API keys and answers from the user's input source

use crate::error::{ErrorCategory, ErrorKind, KeyprofileError, Result};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

/// Trait for sources that answer interactive prompts one line at a time
pub trait LineSource {
    /// Read one secret line with its line terminator removed.
    ///
    /// Terminal-backed implementations must not echo the input. The secret is
    /// wrapped in `Zeroizing` so it is wiped from memory when dropped.
    fn read_secret(&mut self) -> Result<Zeroizing<String>>;

    /// Read one plain line with its line terminator removed.
    fn read_line(&mut self) -> Result<String>;
}

/// Reads lines from any buffered reader, without any echo handling
///
/// Used for piped input and in tests.
pub struct ReaderLineSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderLineSource<R> {
    fn read_secret(&mut self) -> Result<Zeroizing<String>> {
        let mut secret = Zeroizing::new(String::new());
        read_one_line(&mut self.reader, &mut secret)?;
        Ok(secret)
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        read_one_line(&mut self.reader, &mut line)?;
        Ok(line)
    }
}

/// Reads from the controlling terminal, suppressing echo for secrets
pub struct TerminalLineSource;

impl TerminalLineSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalLineSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for TerminalLineSource {
    /// Read a secret from the terminal.
    ///
    /// rpassword turns echo off for exactly one line and restores the previous
    /// terminal mode from a drop guard, so echo comes back on every exit path.
    /// The newline the user typed is still echoed, keeping later output off the
    /// input line.
    fn read_secret(&mut self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(KeyprofileError::with_kind(
                ErrorCategory::User,
                ErrorKind::Input,
                "cannot read API key from terminal - stdin is not a terminal",
            ));
        }

        let secret = rpassword::read_password().map_err(|e| {
            KeyprofileError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Input,
                format!("failure reading API key: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(secret))
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        read_one_line(&mut io::stdin().lock(), &mut line)?;
        Ok(line)
    }
}

/// Returns the line source appropriate for the process's standard input
pub fn stdin_source() -> Box<dyn LineSource> {
    if io::stdin().is_terminal() {
        Box::new(TerminalLineSource::new())
    } else {
        Box::new(ReaderLineSource::new(io::stdin().lock()))
    }
}

/// Error for a failed write of a prompt or message to the user's output.
pub(crate) fn output_error(e: io::Error) -> KeyprofileError {
    KeyprofileError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::Io,
        format!("failed to write output: {}", e),
        e,
    )
}

fn read_one_line<R: BufRead + ?Sized>(reader: &mut R, buf: &mut String) -> Result<()> {
    let read = reader.read_line(buf).map_err(|e| {
        KeyprofileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Input,
            format!("error reading input: {}", e),
            e,
        )
    })?;
    if read == 0 {
        return Err(KeyprofileError::with_kind(
            ErrorCategory::User,
            ErrorKind::Input,
            "unexpected end of input",
        ));
    }

    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(())
}
