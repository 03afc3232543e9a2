//! Cache file name grammar.
//!
//! Each format version is one anchored pattern. Recognition walks
//! [`FormatVersion::RULES`] newest first, so adding a version means adding a
//! variant and its pattern without touching the existing ones.
//!
//! The key capture is greedy: the numeric fields are taken from the end of
//! the name, which keeps names written by older, non-escaping writers
//! decodable even when their key contains the delimiter.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Separator between name fields.
pub const DELIMITER: char = '.';

/// Marker appended to the position of a span that reaches end of stream.
pub const EOS_MARKER: &str = "E";

/// Fixed suffix of the current format.
pub const V2_SUFFIX: &str = ".v2.exo";

/// Fixed suffix of the legacy format.
pub const V1_SUFFIX: &str = ".v1.exo";

const V1_PATTERN: &str = r"(?s)^(.+)\.(\d+)\.(\d+)\.v1\.exo$";
const V2_PATTERN: &str = r"(?s)^(.+)\.(\d+)(E?)\.(\d+)\.v2\.exo$";

/// File name format generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVersion {
    /// Legacy: unescaped key, no end-of-stream marker. Never written.
    V1,
    /// Current: escaped key, optional end-of-stream marker.
    V2,
}

impl FormatVersion {
    /// The version every new name is written in.
    pub const CURRENT: Self = Self::V2;

    /// Recognition order, newest first.
    pub const RULES: &'static [FormatVersion] = &[Self::V2, Self::V1];

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }

    /// Fixed suffix that ends names of this version.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::V1 => V1_SUFFIX,
            Self::V2 => V2_SUFFIX,
        }
    }

    /// Whether the key segment of this version went through the escaper.
    pub fn key_is_escaped(&self) -> bool {
        match self {
            Self::V1 => false,
            Self::V2 => true,
        }
    }

    fn pattern(&self) -> &'static Regex {
        static V1: OnceLock<Regex> = OnceLock::new();
        static V2: OnceLock<Regex> = OnceLock::new();
        match self {
            Self::V1 => V1.get_or_init(|| Regex::new(V1_PATTERN).expect("v1 pattern is valid")),
            Self::V2 => V2.get_or_init(|| Regex::new(V2_PATTERN).expect("v2 pattern is valid")),
        }
    }

    /// Match `name` against this version's grammar.
    ///
    /// Returns `None` when the name does not match or a numeric field does
    /// not fit in 64 bits.
    pub fn parse<'a>(&self, name: &'a str) -> Option<ParsedName<'a>> {
        let caps = self.pattern().captures(name)?;
        let key_segment = caps.get(1)?.as_str();
        let position = caps.get(2)?.as_str().parse().ok()?;

        let (is_eos, timestamp_group) = match self {
            Self::V1 => (false, 3),
            Self::V2 => (caps.get(3).map_or(false, |m| m.as_str() == EOS_MARKER), 4),
        };
        let last_access_timestamp = caps.get(timestamp_group)?.as_str().parse().ok()?;

        Some(ParsedName {
            version: *self,
            key_segment,
            position,
            last_access_timestamp,
            is_eos,
        })
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields recovered from a file name.
///
/// `key_segment` is the key as it appears on disk; whether it still needs
/// unescaping depends on `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName<'a> {
    pub version: FormatVersion,
    pub key_segment: &'a str,
    pub position: u64,
    pub last_access_timestamp: u64,
    pub is_eos: bool,
}

/// Recognize `name` under the first matching rule.
pub fn parse(name: &str) -> Option<ParsedName<'_>> {
    FormatVersion::RULES.iter().find_map(|version| version.parse(name))
}

/// Render a current-format name from an already escaped key.
pub fn format_name(escaped_key: &str, position: u64, last_access_timestamp: u64, is_eos: bool) -> String {
    format!(
        "{escaped_key}{DELIMITER}{position}{eos}{DELIMITER}{last_access_timestamp}{suffix}",
        eos = if is_eos { EOS_MARKER } else { "" },
        suffix = FormatVersion::CURRENT.suffix(),
    )
}
