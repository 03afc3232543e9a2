//! Encoding span metadata into file names and back.
//!
//! The file name is the durable record of a cached span: key, position,
//! end-of-stream flag and last access time. The only side effects here are
//! renames (for recency updates and legacy upgrades) and size queries, both
//! routed through [`SpanStorage`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{SpanError, SpanResult};
use crate::escape::{FileNameEscaper, KeyEscaper};
use crate::grammar::{self, FormatVersion};
use crate::span::{CacheEntry, Span};
use crate::storage::{FsStorage, SpanStorage};

/// Result of promoting a file name to the current format.
#[derive(Debug)]
pub enum UpgradeOutcome {
    /// Not a legacy name; nothing was renamed.
    Unchanged(PathBuf),
    /// Renamed to the current format.
    Upgraded { from: FormatVersion, path: PathBuf },
    /// The rename failed or the target name was taken; the file keeps its
    /// legacy name for now.
    Failed {
        path: PathBuf,
        target: PathBuf,
        error: io::Error,
    },
}

impl UpgradeOutcome {
    /// The name the file has on storage after this upgrade attempt.
    pub fn path(&self) -> &Path {
        match self {
            Self::Unchanged(path) | Self::Upgraded { path, .. } | Self::Failed { path, .. } => path,
        }
    }

    pub fn is_upgraded(&self) -> bool {
        matches!(self, Self::Upgraded { .. })
    }
}

/// Span file name codec.
///
/// Cloning is cheap; collaborators are shared.
#[derive(Clone)]
pub struct SpanCodec {
    escaper: Arc<dyn KeyEscaper>,
    storage: Arc<dyn SpanStorage>,
    clock: Arc<dyn Clock>,
}

impl Default for SpanCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpanCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanCodec").finish_non_exhaustive()
    }
}

impl SpanCodec {
    /// Codec over the local filesystem and the system clock.
    pub fn new() -> Self {
        Self {
            escaper: Arc::new(FileNameEscaper),
            storage: Arc::new(FsStorage),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_escaper(mut self, escaper: Arc<dyn KeyEscaper>) -> Self {
        self.escaper = escaper;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn SpanStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &dyn SpanStorage {
        self.storage.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Current-format file name for a cached span.
    pub fn file_name(&self, key: &str, position: u64, last_access_timestamp: u64, is_eos: bool) -> String {
        grammar::format_name(&self.escaper.escape(key), position, last_access_timestamp, is_eos)
    }

    /// Path of a cached span's file inside `dir`.
    pub fn cache_file(
        &self,
        dir: &Path,
        key: &str,
        position: u64,
        last_access_timestamp: u64,
        is_eos: bool,
    ) -> SpanResult<PathBuf> {
        if key.is_empty() {
            return Err(SpanError::EmptyKey);
        }
        Ok(dir.join(self.file_name(key, position, last_access_timestamp, is_eos)))
    }

    /// Decode a current-format cache file into a cached span.
    ///
    /// Returns `None` for anything that is not a cache entry: foreign or
    /// malformed names, keys that fail to unescape, and files whose size
    /// cannot be read.
    pub fn decode_entry(&self, path: &Path) -> Option<Span> {
        self.create_cache_entry(path).map(Span::Cached)
    }

    /// Like [`decode_entry`](Self::decode_entry), returning the entry itself.
    pub fn create_cache_entry(&self, path: &Path) -> Option<CacheEntry> {
        self.decode_entry_as(FormatVersion::CURRENT, path)
    }

    /// Decode `path` under a specific format version.
    ///
    /// Used to keep serving a legacy file whose upgrade rename failed.
    pub fn decode_entry_as(&self, version: FormatVersion, path: &Path) -> Option<CacheEntry> {
        let name = path.file_name()?.to_str()?;
        let parsed = match version.parse(name) {
            Some(parsed) => parsed,
            None => {
                debug!(file_name = name, %version, "not a cache entry");
                return None;
            }
        };

        let key = self.decode_key(version, parsed.key_segment)?;
        let length = match self.storage.len(path) {
            Ok(length) => length,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cache entry size unavailable");
                return None;
            }
        };

        Some(CacheEntry::new(
            key,
            parsed.position,
            length,
            path.to_path_buf(),
            parsed.last_access_timestamp,
            parsed.is_eos,
        ))
    }

    /// Promote a legacy file name to the current format by renaming it.
    ///
    /// Names that are not legacy (including current-format names) are left
    /// alone, so repeated calls are safe. A failed rename, or a target name
    /// that is already taken, is reported as [`UpgradeOutcome::Failed`].
    pub fn upgrade(&self, path: &Path) -> UpgradeOutcome {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return UpgradeOutcome::Unchanged(path.to_path_buf());
        };

        let legacy = FormatVersion::RULES
            .iter()
            .filter(|version| **version != FormatVersion::CURRENT)
            .find_map(|version| version.parse(name));
        let Some(parsed) = legacy else {
            return UpgradeOutcome::Unchanged(path.to_path_buf());
        };

        let Some(key) = self.decode_key(parsed.version, parsed.key_segment) else {
            return UpgradeOutcome::Unchanged(path.to_path_buf());
        };
        let target = path.with_file_name(self.file_name(
            &key,
            parsed.position,
            parsed.last_access_timestamp,
            parsed.is_eos,
        ));

        // Never replace another live file that already holds the target name.
        let renamed = match self.storage.exists(&target) {
            Ok(true) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", target.display()),
            )),
            Ok(false) => self.storage.rename(path, &target),
            Err(e) => Err(e),
        };

        match renamed {
            Ok(()) => {
                info!(
                    from = %path.display(),
                    to = %target.display(),
                    version = %parsed.version,
                    "upgraded cache file name"
                );
                UpgradeOutcome::Upgraded {
                    from: parsed.version,
                    path: target,
                }
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "cache file upgrade failed, keeping legacy name"
                );
                UpgradeOutcome::Failed {
                    path: path.to_path_buf(),
                    target,
                    error,
                }
            }
        }
    }

    /// Refresh the recency of a cached span by renaming its file.
    ///
    /// Key, position, length and end-of-stream flag carry over; the new
    /// timestamp never goes below the old one. On failure nothing changes on
    /// storage and `entry` stays valid.
    pub fn touch(&self, entry: &CacheEntry) -> SpanResult<CacheEntry> {
        let now = self.clock.now_millis().max(entry.last_access_timestamp());
        let target = entry.file().with_file_name(self.file_name(
            entry.key(),
            entry.position(),
            now,
            entry.is_eos(),
        ));

        self.storage
            .rename(entry.file(), &target)
            .map_err(|source| SpanError::Rename {
                from: entry.file().to_path_buf(),
                to: target.clone(),
                source,
            })?;

        info!(from = %entry.file().display(), to = %target.display(), "touched cache span");
        Ok(CacheEntry::new(
            entry.key().to_string(),
            entry.position(),
            entry.length(),
            target,
            now,
            entry.is_eos(),
        ))
    }

    fn decode_key(&self, version: FormatVersion, segment: &str) -> Option<String> {
        if !version.key_is_escaped() {
            return Some(segment.to_string());
        }
        let key = self.escaper.unescape(segment);
        if key.is_none() {
            debug!(segment, "cache key does not unescape");
        }
        key
    }
}
