//! Result types for expect operations

mod error;

pub use error::{ExpectError, PatternError};

use bytes::Bytes;
use std::fmt;

/// Returned by `expect` when nothing matched and no timeout fired.
///
/// With no error attached this means the stream ended cleanly. That is the
/// only outcome pairing a sentinel with `error: None`; a pattern that simply
/// has not shown up yet on an open stream surfaces as a timeout instead (or
/// keeps the call waiting when no timeout is configured).
pub const NOT_FOUND: isize = -1;

/// Returned by `expect` on timeout or cancellation.
pub const TIMED_OUT: isize = -2;

/// Returned by `expect` when a pattern argument cannot be evaluated.
pub const INVALID_ARGUMENT: isize = -3;

/// Outcome of one `expect` call.
///
/// `index` is the position of the matching pattern in the argument slice, or
/// one of the negative sentinels [`NOT_FOUND`], [`TIMED_OUT`] and
/// [`INVALID_ARGUMENT`]. `matched` is a copy of the matched bytes; it never
/// shares storage with the session buffer.
///
/// | index              | error                  | meaning                     |
/// |--------------------|------------------------|-----------------------------|
/// | `>= 0`             | `None`                 | pattern matched             |
/// | `NOT_FOUND`        | `None`                 | clean end of stream         |
/// | `NOT_FOUND`        | `ReadError`            | terminal read failure       |
/// | `TIMED_OUT`        | `Timeout`              | per-call timeout elapsed    |
/// | `TIMED_OUT`        | `Cancelled`            | session cancelled           |
/// | `INVALID_ARGUMENT` | `InvalidPattern`       | rejected before any I/O     |
#[derive(Debug)]
pub struct MatchResult {
    /// Pattern index, or a negative sentinel.
    pub index: isize,

    /// Bytes matched by the pattern (empty unless `index >= 0`).
    pub matched: Bytes,

    /// Error paired with the sentinel, if any.
    pub error: Option<ExpectError>,
}

impl MatchResult {
    pub(crate) fn matched(index: usize, matched: Bytes) -> Self {
        Self {
            index: index as isize,
            matched,
            error: None,
        }
    }

    pub(crate) fn eof() -> Self {
        Self::sentinel(NOT_FOUND, None)
    }

    pub(crate) fn failed(index: isize, error: ExpectError) -> Self {
        Self::sentinel(index, Some(error))
    }

    fn sentinel(index: isize, error: Option<ExpectError>) -> Self {
        Self {
            index,
            matched: Bytes::new(),
            error,
        }
    }

    /// Whether one of the patterns matched.
    pub fn is_match(&self) -> bool {
        self.index >= 0
    }

    /// Whether the call ended because the stream closed cleanly.
    pub fn is_eof(&self) -> bool {
        self.index == NOT_FOUND && self.error.is_none()
    }

    /// Index of the matching pattern, if any.
    pub fn pattern_index(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }

    /// Matched bytes decoded lossily.
    pub fn matched_str(&self) -> String {
        String::from_utf8_lossy(&self.matched).into_owned()
    }

    /// Collapse every non-match outcome into an error.
    ///
    /// Clean end of stream becomes [`ExpectError::NoMatch`].
    pub fn into_result(self) -> Result<Match, ExpectError> {
        match (self.pattern_index(), self.error) {
            (Some(index), None) => Ok(Match {
                index,
                matched: self.matched,
            }),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ExpectError::NoMatch),
        }
    }
}

/// A successful match, as returned by the fatal variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index of the pattern that matched.
    pub index: usize,
    /// Copy of the matched bytes.
    pub matched: Bytes,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pattern {} matched {:?}",
            self.index,
            String::from_utf8_lossy(&self.matched)
        )
    }
}
