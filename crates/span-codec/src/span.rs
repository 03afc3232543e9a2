//! The span value type.
//!
//! A span is one of four roles: a lookup probe, an open or closed hole, or a
//! cached range backed by a storage unit. Each role is its own variant, so a
//! probe can never carry a file and a cached range always has a size and an
//! access time.
//!
//! Spans are immutable. Refreshing recency produces a new value (see
//! [`SpanCodec::touch`](crate::SpanCodec::touch)).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::codec::SpanCodec;
use crate::error::{SpanError, SpanResult};

/// A range of a keyed stream.
///
/// Equality and ordering only look at `(key, position)`: key first
/// (lexicographic), then position (numeric). Two spans of the same key and
/// position compare equal whatever their role.
#[derive(Debug, Clone)]
pub enum Span {
    /// Probe used only to query the cache index.
    Lookup { key: String, position: u64 },
    /// Uncached range extending to the next known span or end of stream.
    OpenHole { key: String, position: u64 },
    /// Uncached range of known length.
    ClosedHole { key: String, position: u64, length: u64 },
    /// Bytes present on local storage.
    Cached(CacheEntry),
}

impl Span {
    pub fn lookup(key: impl Into<String>, position: u64) -> Self {
        Self::Lookup {
            key: key.into(),
            position,
        }
    }

    pub fn open_hole(key: impl Into<String>, position: u64) -> Self {
        Self::OpenHole {
            key: key.into(),
            position,
        }
    }

    pub fn closed_hole(key: impl Into<String>, position: u64, length: u64) -> Self {
        Self::ClosedHole {
            key: key.into(),
            position,
            length,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Lookup { key, .. } | Self::OpenHole { key, .. } | Self::ClosedHole { key, .. } => key,
            Self::Cached(entry) => &entry.key,
        }
    }

    pub fn position(&self) -> u64 {
        match self {
            Self::Lookup { position, .. }
            | Self::OpenHole { position, .. }
            | Self::ClosedHole { position, .. } => *position,
            Self::Cached(entry) => entry.position,
        }
    }

    /// Number of bytes covered, or `None` when the extent is unknown.
    pub fn length(&self) -> Option<u64> {
        match self {
            Self::Lookup { .. } | Self::OpenHole { .. } => None,
            Self::ClosedHole { length, .. } => Some(*length),
            Self::Cached(entry) => Some(entry.length),
        }
    }

    /// Exclusive end offset, when the length is known.
    pub fn end(&self) -> Option<u64> {
        self.length().map(|length| self.position().saturating_add(length))
    }

    pub fn is_open_ended(&self) -> bool {
        self.length().is_none()
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Self::OpenHole { .. } | Self::ClosedHole { .. })
    }

    pub fn cache_entry(&self) -> Option<&CacheEntry> {
        match self {
            Self::Cached(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.cache_entry().map(CacheEntry::file)
    }

    pub fn last_access_timestamp(&self) -> Option<u64> {
        self.cache_entry().map(CacheEntry::last_access_timestamp)
    }

    pub fn is_eos(&self) -> bool {
        self.cache_entry().map_or(false, CacheEntry::is_eos)
    }

    /// Refresh recency of a cached span.
    ///
    /// Fails with [`SpanError::NotCached`] for probes and holes.
    pub fn touch(&self, codec: &SpanCodec) -> SpanResult<Span> {
        match self {
            Self::Cached(entry) => codec.touch(entry).map(Span::Cached),
            _ => Err(SpanError::NotCached),
        }
    }
}

impl From<CacheEntry> for Span {
    fn from(entry: CacheEntry) -> Self {
        Self::Cached(entry)
    }
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Span {}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .cmp(other.key())
            .then_with(|| self.position().cmp(&other.position()))
    }
}

/// A cached range and the storage unit that holds it.
///
/// Only the codec builds these, from a decoded file name or after a rename,
/// so the fields always agree with the name on storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    key: String,
    position: u64,
    length: u64,
    file: PathBuf,
    last_access_timestamp: u64,
    is_eos: bool,
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        position: u64,
        length: u64,
        file: PathBuf,
        last_access_timestamp: u64,
        is_eos: bool,
    ) -> Self {
        Self {
            key,
            position,
            length,
            file,
            last_access_timestamp,
            is_eos,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Size of the backing storage unit when the entry was decoded.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Handle to the backing storage unit. The storage layer owns the file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Last access time, milliseconds since the Unix epoch.
    pub fn last_access_timestamp(&self) -> u64 {
        self.last_access_timestamp
    }

    pub fn is_eos(&self) -> bool {
        self.is_eos
    }

    pub fn touch(&self, codec: &SpanCodec) -> SpanResult<CacheEntry> {
        codec.touch(self)
    }
}
