// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Emacs version comparison.
//!
//! Emacs release strings are not semantic versions. They carry anywhere from
//! one to four numeric fields, pre-release markers like `alpha` or `pre`,
//! VCS snapshot markers like `-git`, and the occasional single letter suffix
//! like `23.2b`. This module reproduces the ordering rules of Emacs's own
//! `version<` family of functions so that build decisions can be gated on
//! release boundaries.
//!
//! # Ordering Rules
//!
//! Version strings are first converted into a list of integers through
//! [`version_to_list`]. Two lists are then compared element by element from
//! the left, as if the shorter list were padded with zeros. Hence:
//!
//! - Trailing zeros are insignificant: `1 = 1.0 = 1.0.0`.
//! - Qualifiers rank below a plain release, since they are recorded as
//!   negative numbers: `1snapshot < 1alpha < 1beta < 1pre < 1`.
//! - Letter suffixes rank above a plain release: `23.2 < 23.2a < 23.2b`.
//!
//! Equality follows Emacs strictly. Two versions are equal only when
//! whatever one has left over after their common prefix is all zeros. Thus,
//! exactly one of `v1 < v2`, `v1 = v2`, or `v2 < v1` always holds.
//!
//! # See Also
//!
//! 1. `version-to-list` and `version<` in Emacs's `lisp/subr.el`

pub mod parse;

pub use parse::{version_to_list, Qualifier};

use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    str::FromStr,
};

/// Return first non-zero component of `list`, or zero if there is none.
pub fn not_zero(list: &[i64]) -> i64 {
    list.iter().copied().find(|component| *component != 0).unwrap_or(0)
}

/// Order two component lists.
///
/// Strips the common prefix of both lists. If both still have components,
/// then their heads decide. If only one side has leftovers, then the first
/// non-zero leftover decides: negative means that side is older, positive
/// means it is newer, and all zeros means both sides are equal.
pub fn list_cmp(l1: &[i64], l2: &[i64]) -> Ordering {
    let common = l1.iter().zip(l2).take_while(|(a, b)| a == b).count();
    let (l1, l2) = (&l1[common..], &l2[common..]);

    match (l1.first(), l2.first()) {
        (Some(head1), Some(head2)) => head1.cmp(head2),
        (None, None) => Ordering::Equal,
        (Some(_), None) => not_zero(l1).cmp(&0),
        (None, Some(_)) => 0.cmp(&not_zero(l2)),
    }
}

/// Check if `l1` is older than `l2`.
pub fn list_lt(l1: &[i64], l2: &[i64]) -> bool {
    list_cmp(l1, l2).is_lt()
}

/// Check if `l1` is older than or equal to `l2`.
pub fn list_le(l1: &[i64], l2: &[i64]) -> bool {
    list_cmp(l1, l2).is_le()
}

/// Check if `l1` is equal to `l2`.
pub fn list_eq(l1: &[i64], l2: &[i64]) -> bool {
    list_cmp(l1, l2).is_eq()
}

/// Check if version `v1` is older than `v2`.
///
/// # Errors
///
/// - Return [`ParseError`] if either version string is malformed.
pub fn version_lt(v1: &str, v2: &str) -> Result<bool> {
    Ok(list_lt(&version_to_list(v1)?, &version_to_list(v2)?))
}

/// Check if version `v1` is equal to `v2`.
///
/// # Errors
///
/// - Return [`ParseError`] if either version string is malformed.
pub fn version_eq(v1: &str, v2: &str) -> Result<bool> {
    Ok(list_eq(&version_to_list(v1)?, &version_to_list(v2)?))
}

/// Check if version `v1` is older than or equal to `v2`.
///
/// # Errors
///
/// - Return [`ParseError`] if either version string is malformed.
pub fn version_le(v1: &str, v2: &str) -> Result<bool> {
    Ok(list_le(&version_to_list(v1)?, &version_to_list(v2)?))
}

/// Check if `low <= mid < high`.
///
/// For example, `version_between("25", version, "27")` holds for every 25.x
/// and 26.x release. Pre-releases of `27` itself, like `27pre`, are still
/// included since they rank below `27`.
///
/// # Errors
///
/// - Return [`ParseError`] if any of the three version strings is
///   malformed. All three are parsed before anything is compared.
pub fn version_between(low: &str, mid: &str, high: &str) -> Result<bool> {
    let (low, mid, high) = (
        version_to_list(low)?,
        version_to_list(mid)?,
        version_to_list(high)?,
    );

    Ok(list_le(&low, &mid) && list_lt(&mid, &high))
}

/// Parsed Emacs version.
///
/// Keeps the original text around for display, while comparison goes
/// through the parsed component list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    components: Vec<i64>,
}

impl Version {
    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// - Return [`ParseError`] if version string is malformed.
    pub fn parse(ver: impl Into<String>) -> Result<Self> {
        let raw = ver.into();
        let components = version_to_list(&raw)?;
        Ok(Self { raw, components })
    }

    /// Original text of version.
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    /// Parsed component list of version.
    pub fn components(&self) -> &[i64] {
        self.components.as_slice()
    }

    /// Check if version carries a pre-release or snapshot qualifier.
    pub fn is_prerelease(&self) -> bool {
        self.components
            .iter()
            .any(|component| Qualifier::from_rank(*component).is_some())
    }

    /// Check if `low <= self < high`.
    pub fn is_between(&self, low: &Version, high: &Version) -> bool {
        low <= self && self < high
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::parse(data)
    }
}

impl TryFrom<String> for Version {
    type Error = ParseError;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        Self::parse(data)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

impl Display for Version {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        list_eq(&self.components, &other.components)
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        list_cmp(&self.components, &other.components)
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // INVARIANT: Equal versions only differ by trailing zeros.
        let len = self
            .components
            .iter()
            .rposition(|component| *component != 0)
            .map_or(0, |idx| idx + 1);
        self.components[..len].hash(state);
    }
}

/// Malformed version string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Version does not start with a digit.
    #[error("invalid version syntax: {version:?} (must start with a number)")]
    LeadingNonDigit { version: String },

    /// Non-numeric text is not a separator, qualifier, or trailing letter.
    #[error("invalid version syntax: {version:?} (unexpected {run:?} at position {position})")]
    InvalidQualifier {
        version: String,
        run: String,
        position: usize,
    },

    /// Numeric component is too large.
    #[error("invalid version syntax: {version:?} (number at position {position} is too large)")]
    Overflow { version: String, position: usize },
}

impl ParseError {
    /// Offending version string.
    pub fn version(&self) -> &str {
        match self {
            Self::LeadingNonDigit { version }
            | Self::InvalidQualifier { version, .. }
            | Self::Overflow { version, .. } => version.as_str(),
        }
    }

    /// Byte position in offending version string where parsing failed.
    pub fn position(&self) -> usize {
        match self {
            Self::LeadingNonDigit { .. } => 0,
            Self::InvalidQualifier { position, .. } | Self::Overflow { position, .. } => *position,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ParseError> = std::result::Result<T, E>;
