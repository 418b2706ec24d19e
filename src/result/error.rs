//! Error types for ptyexpect

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a session.
///
/// The matcher never returns these directly: they travel inside a
/// [`MatchResult`](crate::MatchResult) next to a sentinel index. Spawning and
/// sending return them through an ordinary `Result`.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{ExpectError, Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::builder()
///     .timeout(Duration::from_secs(5))
///     .spawn("some-command", [] as [&str; 0])?;
///
/// let result = session.expect(&[Pattern::literal("done")]).await;
/// match result.error {
///     None if result.is_match() => println!("matched"),
///     None => println!("process closed its output"),
///     Some(ExpectError::Timeout { duration }) => {
///         eprintln!("Timed out after {:?}", duration);
///     }
///     Some(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// No pattern matched within the configured timeout.
    ///
    /// Recoverable: the session is untouched and `expect` may be called again.
    #[error("Timed out waiting for pattern (after {duration:?})")]
    Timeout {
        /// Timeout that was configured for the call
        duration: Duration,
    },

    /// The session's cancellation token fired.
    ///
    /// Terminal: the session cannot be used afterwards.
    #[error("Session cancelled")]
    Cancelled,

    /// Reading from the terminal failed.
    ///
    /// The stream is considered closed from then on.
    #[error("Read error: {0}")]
    ReadError(#[source] io::Error),

    /// The reader task went away without reporting why.
    #[error("Reader task stopped unexpectedly")]
    ReaderStopped,

    /// A pattern passed to `expect` cannot be evaluated.
    ///
    /// Detected before any I/O; nothing about the session changes.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    /// End of stream reached without a match.
    ///
    /// Only produced by [`Session::expect_or_fail`](crate::Session::expect_or_fail)
    /// and [`MatchResult::into_result`](crate::MatchResult::into_result); the
    /// plain matcher reports end of stream as `NOT_FOUND` with no error.
    #[error("End of stream reached before any pattern matched")]
    NoMatch,

    /// I/O error while writing to the terminal or waiting on the process.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PTY allocation or manipulation failed.
    #[error("PTY error: {0}")]
    Pty(String),

    /// The program could not be started.
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// The platform has no pseudo-terminal support.
    #[error("{0} is not implemented on this platform")]
    Unsupported(&'static str),
}

impl ExpectError {
    /// Whether the error is the recoverable per-call timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExpectError::Timeout { .. })
    }
}

/// Errors related to pattern construction or validation.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Empty literal: it would match without consuming anything.
    #[error("Pattern cannot be empty")]
    EmptyPattern,
}
