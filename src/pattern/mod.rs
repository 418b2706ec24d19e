//! Pattern matching for expect operations

mod matcher;

pub use matcher::{LiteralMatcher, Match, Matcher, RegexMatcher};

use crate::result::PatternError;
use bytes::Bytes;
use regex::bytes::Regex;

/// A pattern tested against the session buffer.
///
/// Patterns are passed to [`Session::expect`](crate::Session::expect) as an
/// ordered slice. When several of them match the same buffer, the one listed
/// first wins, wherever its match starts.
///
/// # Examples
///
/// ```
/// use ptyexpect::Pattern;
///
/// // Literal text
/// let p1 = Pattern::literal("password: ");
///
/// // Regular expression
/// let p2 = Pattern::regex(r"\d+ files?").unwrap();
///
/// // Conversions
/// let p3: Pattern = "$ ".into();
/// let p4: Pattern = regex::bytes::Regex::new(r"(?i)login:").unwrap().into();
/// ```
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Literal byte sequence; matches its first occurrence.
    Literal(Bytes),

    /// Compiled regular expression; matches its leftmost occurrence.
    ///
    /// Runs directly over the buffered bytes, so output that is not valid
    /// UTF-8 is searched rather than skipped.
    Regex(Regex),
}

impl Pattern {
    /// Create a literal pattern.
    ///
    /// An empty literal is accepted here but rejected by
    /// [`Session::expect`](crate::Session::expect) with
    /// [`PatternError::EmptyPattern`], since it would match before any output
    /// arrives. Regular expressions get no such check: one that can match the
    /// empty string, such as `x*`, matches zero bytes at the start of the
    /// buffer the next time output is checked.
    ///
    /// # Examples
    ///
    /// ```
    /// use ptyexpect::Pattern;
    ///
    /// let pattern = Pattern::literal("$ ");
    /// let bytes = Pattern::literal(&b"\x1b[?2004h"[..]);
    /// ```
    pub fn literal(s: impl AsRef<[u8]>) -> Self {
        Pattern::Literal(Bytes::copy_from_slice(s.as_ref()))
    }

    /// Compile a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] if the expression does not compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use ptyexpect::Pattern;
    ///
    /// let pattern = Pattern::regex(r"(?i)hello").unwrap();
    /// assert!(Pattern::regex("(unclosed").is_err());
    /// ```
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Convert pattern to a matcher implementation
    pub(crate) fn to_matcher(&self) -> Result<Box<dyn Matcher>, PatternError> {
        match self {
            Pattern::Literal(s) => Ok(Box::new(LiteralMatcher::new(s.to_vec())?)),
            Pattern::Regex(r) => Ok(Box::new(RegexMatcher::new(r.clone()))),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::literal(s)
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::Literal(Bytes::from(s))
    }
}

impl From<&[u8]> for Pattern {
    fn from(s: &[u8]) -> Self {
        Pattern::literal(s)
    }
}

impl From<Regex> for Pattern {
    fn from(r: Regex) -> Self {
        Pattern::Regex(r)
    }
}

/// Build matchers for every pattern, failing on the first one that cannot be
/// evaluated.
pub(crate) fn compile(patterns: &[Pattern]) -> Result<Vec<Box<dyn Matcher>>, PatternError> {
    patterns.iter().map(Pattern::to_matcher).collect()
}

/// Test `patterns` in argument order and return the first that matches.
pub(crate) fn first_match(matchers: &[Box<dyn Matcher>], buffer: &[u8]) -> Option<(usize, Match)> {
    matchers
        .iter()
        .enumerate()
        .find_map(|(index, matcher)| matcher.find(buffer).map(|m| (index, m)))
}
