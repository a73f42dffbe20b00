//! Field extraction for annotated log lines.
//!
//! `field-extract` pulls the three structured fields `ownersed` decorates out of
//! a raw log line:
//!
//! - **IP addresses**: every dotted-quad shaped token (`1-3` digits per octet), in
//!   left-to-right order with duplicates kept. Octets are *not* range checked, so
//!   `999.1.1.1` is extracted just like `10.0.0.1`.
//! - **Target**: the last `[...]` group containing no whitespace, without its
//!   brackets. When several groups appear the rightmost one wins.
//! - **Token**: the last 33 character `[0-9a-z]` run starting at a word boundary,
//!   returned with a single leading space so that an exact substring replacement
//!   only hits the line-final occurrence.
//!
//! ## Quick Start
//!
//! ```no_run
//! use field_extract::FieldExtractor;
//!
//! # fn main() -> Result<(), field_extract::Error> {
//! let extractor = FieldExtractor::new()?;
//! let fields = extractor.extract("2024-01-01 10:00:00 IDs: [example.test] 192.168.0.1");
//!
//! assert_eq!(fields.ips, vec!["192.168.0.1"]);
//! assert_eq!(fields.target, Some("example.test"));
//! assert_eq!(fields.token, None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Byte ranges
//!
//! The `*_ranges` methods work directly on byte slices and yield `[start, end)`
//! ranges, mirroring how the extractor is driven over raw line buffers.

use std::ops::Range;

use regex_automata::meta::Regex;

/// Dotted-quad pattern. Word boundaries are ASCII so that `\b` behaves the same
/// on any haystack, valid UTF-8 or not.
static IPV4_PATTERN: &str = r"(?-u:\b)[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}(?-u:\b)";

/// Bracketed target. The class excludes exactly the ASCII whitespace set
/// `[\t\n\f\r ]`; the repetition is greedy, so `[a][b]` is one match.
static TARGET_PATTERN: &str = r"\[[^\t\n\x0C\r ]+\]";

/// Interaction token: only the leading edge is anchored.
static TOKEN_PATTERN: &str = r"(?-u:\b)[0-9a-z]{33}";

/// Length of an interaction token, excluding the leading delimiter.
pub const TOKEN_LEN: usize = 33;

/// Errors raised while building a [`FieldExtractor`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One of the built-in patterns failed to compile.
    #[error("regex error: {0}")]
    Regex(#[from] regex_automata::meta::BuildError),
}

/// The fields extracted from a single line.
///
/// `ips` and `target` borrow from the line; `token` is owned because it carries
/// the synthetic leading space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedFields<'a> {
    /// Every dotted-quad match in order of appearance, duplicates preserved.
    pub ips: Vec<&'a str>,
    /// The rightmost bracketed group, brackets stripped.
    pub target: Option<&'a str>,
    /// The rightmost token, prefixed with a single space.
    pub token: Option<String>,
}

impl ExtractedFields<'_> {
    /// True when nothing at all was extracted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ips.is_empty() && self.target.is_none() && self.token.is_none()
    }
}

/// Extracts IP addresses, targets and tokens from log lines.
///
/// Building compiles three regexes, so an extractor should be created once and
/// reused for every line.
#[derive(Clone, Debug)]
pub struct FieldExtractor {
    ipv4: Regex,
    target: Regex,
    token: Regex,
}

impl FieldExtractor {
    /// Compile the extraction patterns.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            ipv4: Regex::new(IPV4_PATTERN)?,
            target: Regex::new(TARGET_PATTERN)?,
            token: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// Extract all fields from `line`. Pure: no I/O, no shared state.
    pub fn extract<'a>(&self, line: &'a str) -> ExtractedFields<'a> {
        let haystack = line.as_bytes();

        let ips = self.ip_ranges(haystack).map(|r| &line[r]).collect();

        // rightmost group wins, brackets dropped
        let target = self
            .target_ranges(haystack)
            .last()
            .map(|r| &line[r.start + 1..r.end - 1]);

        let token = self.token_ranges(haystack).last().map(|r| {
            let mut token = String::with_capacity(TOKEN_LEN + 1);
            token.push(' ');
            token.push_str(&line[r]);
            token
        });

        ExtractedFields { ips, target, token }
    }

    /// Byte ranges of every dotted-quad match, left to right.
    #[inline]
    pub fn ip_ranges<'a>(&'a self, haystack: &'a [u8]) -> impl Iterator<Item = Range<usize>> + 'a {
        self.ipv4.find_iter(haystack).map(|m| m.range())
    }

    /// Byte ranges of every bracketed group, brackets included.
    #[inline]
    pub fn target_ranges<'a>(
        &'a self,
        haystack: &'a [u8],
    ) -> impl Iterator<Item = Range<usize>> + 'a {
        self.target.find_iter(haystack).map(|m| m.range())
    }

    /// Byte ranges of every token candidate, without any leading delimiter.
    #[inline]
    pub fn token_ranges<'a>(
        &'a self,
        haystack: &'a [u8],
    ) -> impl Iterator<Item = Range<usize>> + 'a {
        self.token.find_iter(haystack).map(|m| m.range())
    }
}
