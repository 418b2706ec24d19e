//! Pattern matcher implementations

use crate::result::PatternError;
use regex::bytes::Regex;

/// Location of a match inside the scanned buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Start position of the match
    pub start: usize,
    /// End position of the match (exclusive)
    pub end: usize,
}

/// Trait for pattern matching
pub trait Matcher: Send + Sync {
    /// Find the first match in the buffer
    fn find(&self, buffer: &[u8]) -> Option<Match>;
}

/// Literal byte-sequence matcher using Boyer-Moore-Horspool.
///
/// Reports the first occurrence in the buffer.
pub struct LiteralMatcher {
    pattern: Vec<u8>,
    bad_char_table: [usize; 256],
}

impl LiteralMatcher {
    /// Create a new literal matcher
    pub fn new(pattern: impl Into<Vec<u8>>) -> Result<Self, PatternError> {
        let pattern = pattern.into();

        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let mut bad_char_table = [pattern.len(); 256];
        for (i, &byte) in pattern.iter().enumerate().take(pattern.len() - 1) {
            bad_char_table[byte as usize] = pattern.len() - 1 - i;
        }

        Ok(Self {
            pattern,
            bad_char_table,
        })
    }
}

impl Matcher for LiteralMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        let len = self.pattern.len();
        if buffer.len() < len {
            return None;
        }

        let mut pos = 0;
        while pos + len <= buffer.len() {
            if buffer[pos..pos + len] == self.pattern[..] {
                return Some(Match {
                    start: pos,
                    end: pos + len,
                });
            }

            let shift_char = buffer[pos + len - 1];
            pos += self.bad_char_table[shift_char as usize];
        }

        None
    }
}

/// Regular expression matcher over raw bytes.
///
/// Unicode classes match multi-byte characters once all of their bytes are
/// buffered; a character whose trailing bytes have not arrived yet simply
/// does not match.
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Wrap an already compiled expression
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        self.regex.find(buffer).map(|m| Match {
            start: m.start(),
            end: m.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(pattern: &str) -> RegexMatcher {
        RegexMatcher::new(Regex::new(pattern).unwrap())
    }

    #[test]
    fn test_literal_matcher() {
        let matcher = LiteralMatcher::new(b"hello").unwrap();
        let result = matcher.find(b"world hello there").unwrap();
        assert_eq!(result, Match { start: 6, end: 11 });
    }

    #[test]
    fn test_literal_matcher_not_found() {
        let matcher = LiteralMatcher::new(b"missing").unwrap();
        assert!(matcher.find(b"this text does not contain it").is_none());
    }

    #[test]
    fn test_literal_matcher_shorter_buffer() {
        let matcher = LiteralMatcher::new(b"password:").unwrap();
        assert!(matcher.find(b"pass").is_none());
    }

    #[test]
    fn test_literal_matcher_at_end() {
        let matcher = LiteralMatcher::new(b"end").unwrap();
        let result = matcher.find(b"this is the end").unwrap();
        assert_eq!(result, Match { start: 12, end: 15 });
    }

    #[test]
    fn test_literal_matcher_empty_pattern() {
        assert!(matches!(
            LiteralMatcher::new(b""),
            Err(PatternError::EmptyPattern)
        ));
    }

    #[test]
    fn test_literal_matcher_first_occurrence() {
        let matcher = LiteralMatcher::new(b"test").unwrap();
        let result = matcher.find(b"test and test again").unwrap();
        assert_eq!(result, Match { start: 0, end: 4 });
    }

    #[test]
    fn test_literal_matcher_overlapping_prefix() {
        let matcher = LiteralMatcher::new(b"aab").unwrap();
        let result = matcher.find(b"aaab").unwrap();
        assert_eq!(result, Match { start: 1, end: 4 });
    }

    #[test]
    fn test_literal_matcher_utf8() {
        let matcher = LiteralMatcher::new("世界".as_bytes()).unwrap();
        let result = matcher.find("hello 世界 test".as_bytes()).unwrap();
        assert_eq!(result, Match { start: 6, end: 12 });
    }

    #[test]
    fn test_literal_matcher_binary_data() {
        let matcher = LiteralMatcher::new([0xFF, 0xFE, 0xFD]).unwrap();
        let result = matcher.find(b"prefix\xFF\xFE\xFDsuffix").unwrap();
        assert_eq!(result, Match { start: 6, end: 9 });
    }

    #[test]
    fn test_regex_matcher_leftmost() {
        let result = regex(r"\d+").find(b"test 123 end 456").unwrap();
        assert_eq!(result, Match { start: 5, end: 8 });
    }

    #[test]
    fn test_regex_matcher_no_match() {
        assert!(regex(r"\d+").find(b"no numbers here").is_none());
    }

    #[test]
    fn test_regex_matcher_line_ending() {
        let result = regex("test\r\n").find(b"second test\r\nTwo").unwrap();
        assert_eq!(result, Match { start: 7, end: 13 });
    }

    #[test]
    fn test_regex_matcher_unicode_class() {
        let matcher = regex(r"世\p{L}");
        let full = "x世界".as_bytes();
        assert_eq!(matcher.find(full), Some(Match { start: 1, end: 7 }));
    }

    #[test]
    fn test_regex_matcher_partial_character_does_not_match() {
        let matcher = regex(r"世\p{L}");
        let full = "世界".as_bytes();
        // Trailing byte of the second character has not arrived yet
        assert!(matcher.find(&full[..full.len() - 1]).is_none());
        assert!(matcher.find(full).is_some());
    }

    #[test]
    fn test_regex_matcher_tolerates_invalid_utf8() {
        let result = regex("ok").find(b"\xFF\xFEok").unwrap();
        assert_eq!(result, Match { start: 2, end: 4 });
    }
}
