// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version string parsing.
//!
//! Converts free-form Emacs version strings into a flat list of integers
//! that is easy to compare. Digit runs become non-negative components in
//! left-to-right order. The non-digit text between them decides what else
//! gets recorded:
//!
//! - A lone `.` is just a field divider and records nothing.
//! - A pre-release marker records a negative rank (see [`Qualifier`]).
//! - A single letter at the very end of the string, like the `b` in
//!   `23.2b`, records its alphabet position (`a` = 1, `b` = 2, ...).
//!
//! Anything else is invalid syntax.

use crate::version::ParseError;

use std::borrow::Cow;

/// Field divider between numeric components.
pub const SEPARATOR: char = '.';

/// Pre-release marker found between or after numeric components.
///
/// Every qualifier ranks below a plain release, so `1snapshot < 1alpha <
/// 1beta < 1pre < 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qualifier {
    /// Development snapshot, including VCS markers like `-git` or `-cvs`.
    Snapshot,

    /// Alpha release.
    Alpha,

    /// Beta release.
    Beta,

    /// Pre-release or release candidate.
    Pre,
}

impl Qualifier {
    /// Negative component recorded for this qualifier.
    pub fn rank(self) -> i64 {
        match self {
            Self::Snapshot => -4,
            Self::Alpha => -3,
            Self::Beta => -2,
            Self::Pre => -1,
        }
    }

    /// Map a negative component back to its qualifier.
    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            -4 => Some(Self::Snapshot),
            -3 => Some(Self::Alpha),
            -2 => Some(Self::Beta),
            -1 => Some(Self::Pre),
            _ => None,
        }
    }

    /// Match a non-digit run against the qualifier table.
    ///
    /// Matching is case-insensitive, and the marker may be preceded by one
    /// separator character from `-._+ `.
    pub fn from_run(run: &str) -> Option<Self> {
        // INVARIANT: A lone separator other than the field divider marks a snapshot.
        if matches!(run, "-" | "_" | "+") {
            return Some(Self::Snapshot);
        }

        let word = strip_separator(run).to_ascii_lowercase();
        QUALIFIERS
            .iter()
            .find(|(names, _)| names.contains(&word.as_str()))
            .map(|(_, qualifier)| *qualifier)
    }
}

/// Qualifier table, checked in order.
const QUALIFIERS: &[(&[&str], Qualifier)] = &[
    (&["snapshot"], Qualifier::Snapshot),
    (&["cvs", "git", "bzr", "svn", "hg", "darcs"], Qualifier::Snapshot),
    (&["unknown"], Qualifier::Snapshot),
    (&["alpha"], Qualifier::Alpha),
    (&["beta"], Qualifier::Beta),
    (&["pre", "rc"], Qualifier::Pre),
];

/// Convert version string into its component list.
///
/// A leading `.` implies a leading `0` component, so `.5` reads as `0.5`.
///
/// # Errors
///
/// - Return [`ParseError::LeadingNonDigit`] if the string does not start
///   with a digit.
/// - Return [`ParseError::InvalidQualifier`] if a non-digit run is neither a
///   separator, a known qualifier, nor a single trailing letter.
/// - Return [`ParseError::Overflow`] if a digit run does not fit in `i64`.
pub fn version_to_list(ver: &str) -> Result<Vec<i64>, ParseError> {
    // INVARIANT: Positions reported in errors refer to the caller's text.
    let (text, shift): (Cow<'_, str>, usize) = if ver.starts_with(SEPARATOR) {
        (Cow::Owned(format!("0{ver}")), 1)
    } else {
        (Cow::Borrowed(ver), 0)
    };

    let bytes = text.as_bytes();
    if !bytes.first().is_some_and(u8::is_ascii_digit) {
        return Err(ParseError::LeadingNonDigit {
            version: ver.to_owned(),
        });
    }

    let mut components = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let digits_end = scan(bytes, pos, u8::is_ascii_digit);
        let number = text[pos..digits_end]
            .parse::<i64>()
            .map_err(|_| ParseError::Overflow {
                version: ver.to_owned(),
                position: pos.saturating_sub(shift),
            })?;
        components.push(number);
        pos = digits_end;

        if pos == bytes.len() {
            break;
        }

        let run_start = pos;
        pos = scan(bytes, pos, |byte| !byte.is_ascii_digit());
        let run = &text[run_start..pos];

        if run.len() == SEPARATOR.len_utf8() && run.starts_with(SEPARATOR) {
            continue;
        }

        if let Some(qualifier) = Qualifier::from_run(run) {
            components.push(qualifier.rank());
            continue;
        }

        match letter_rank(run) {
            Some(rank) if pos == bytes.len() => components.push(rank),
            _ => {
                return Err(ParseError::InvalidQualifier {
                    version: ver.to_owned(),
                    run: run.to_owned(),
                    position: run_start.saturating_sub(shift),
                })
            }
        }
    }

    Ok(components)
}

/// Find end of run of bytes matching predicate, starting from `start`.
fn scan(bytes: &[u8], start: usize, pred: impl Fn(&u8) -> bool) -> usize {
    bytes[start..]
        .iter()
        .position(|byte| !pred(byte))
        .map_or(bytes.len(), |len| start + len)
}

/// Drop at most one leading separator character from `-._+ `.
fn strip_separator(run: &str) -> &str {
    run.strip_prefix(|c: char| matches!(c, '-' | '.' | '_' | '+' | ' '))
        .unwrap_or(run)
}

/// Alphabet position of a single letter suffix, e.g., `b` becomes 2.
fn letter_rank(run: &str) -> Option<i64> {
    let mut chars = strip_separator(run).chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Some(i64::from(letter.to_ascii_lowercase() as u8 - b'a') + 1)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("1", vec![1]; "major only")]
    #[test_case("1.0.0", vec![1, 0, 0]; "trailing zeros kept")]
    #[test_case(".5", vec![0, 5]; "implied leading zero")]
    #[test_case("23.2b", vec![23, 2, 2]; "letter suffix")]
    #[test_case("23.2.B", vec![23, 2, 2]; "separated uppercase letter suffix")]
    #[test_case("1x", vec![1, 24]; "late letter suffix")]
    #[test_case("1snapshot", vec![1, -4]; "snapshot")]
    #[test_case("24.0.50-git", vec![24, 0, 50, -4]; "vcs marker")]
    #[test_case("1.0-unknown", vec![1, 0, -4]; "unknown marker")]
    #[test_case("1-2", vec![1, -4, 2]; "bare separator")]
    #[test_case("1_2", vec![1, -4, 2]; "bare underscore")]
    #[test_case("29.0.90-alpha", vec![29, 0, 90, -3]; "alpha")]
    #[test_case("1 beta", vec![1, -2]; "space separated beta")]
    #[test_case("1.2pre3", vec![1, 2, -1, 3]; "pre")]
    #[test_case("1.2RC3", vec![1, 2, -1, 3]; "uppercase release candidate")]
    #[test_case(".alpha", vec![0, -3]; "implied leading zero before qualifier")]
    #[test]
    fn parse_valid_versions(input: &str, expect: Vec<i64>) {
        pretty_assertions::assert_eq!(version_to_list(input), Ok(expect));
    }

    #[test]
    fn parse_rejects_leading_non_digit() {
        for input in ["abc", "", "-1", "v29.1", " 1"] {
            let result = version_to_list(input);
            assert_eq!(
                result,
                Err(ParseError::LeadingNonDigit {
                    version: input.into()
                })
            );
        }
    }

    #[test_case("1xyz", "xyz", 1; "multi letter suffix")]
    #[test_case("1b2", "b", 1; "letter not at end")]
    #[test_case("1..2", "..", 1; "doubled separator")]
    #[test_case("1 2", " ", 1; "space divider")]
    #[test_case("26.3-gamma", "-gamma", 4; "unknown word")]
    #[test_case(".5q1", "q", 2; "position relative to caller text")]
    #[test]
    fn parse_rejects_invalid_qualifiers(input: &str, run: &str, position: usize) {
        let result = version_to_list(input);
        pretty_assertions::assert_eq!(
            result,
            Err(ParseError::InvalidQualifier {
                version: input.into(),
                run: run.into(),
                position,
            })
        );
    }

    #[test]
    fn parse_rejects_overflowing_component() {
        let result = version_to_list("1.99999999999999999999");
        assert_eq!(
            result,
            Err(ParseError::Overflow {
                version: "1.99999999999999999999".into(),
                position: 2,
            })
        );
    }

    #[test]
    fn qualifier_ranks_round_trip() {
        for qualifier in [
            Qualifier::Snapshot,
            Qualifier::Alpha,
            Qualifier::Beta,
            Qualifier::Pre,
        ] {
            assert_eq!(Qualifier::from_rank(qualifier.rank()), Some(qualifier));
        }
        assert_eq!(Qualifier::from_rank(0), None);
        assert_eq!(Qualifier::from_run("-CVS"), Some(Qualifier::Snapshot));
        assert_eq!(Qualifier::from_run("."), None);
    }
}
