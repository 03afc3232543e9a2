//! Directory-scan recovery
//!
//! Walks one cache directory (non-recursive), promotes legacy names, decodes
//! every span file and groups the results per key in position order.
//! Nothing found in the directory is fatal: files that are not cache entries
//! are reported (and optionally deleted), failures are collected.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use span_codec::grammar::{self, FormatVersion};
use span_codec::{CacheEntry, Span, SpanCodec, UpgradeOutcome};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;

/// Scan result type
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that stop a scan before it starts.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cache directory not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of scanning a cache directory.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Number of regular files examined
    pub scanned: usize,
    /// Legacy names renamed to the current format
    pub upgraded: usize,
    /// Invalid files deleted
    pub removed: usize,
    /// Files that are not cache entries
    pub invalid: Vec<PathBuf>,
    /// Files describing a span already indexed from a more recent file
    pub duplicates: Vec<PathBuf>,
    /// Errors encountered (non-fatal)
    pub errors: Vec<String>,
    spans: BTreeMap<String, BTreeSet<Span>>,
}

impl ScanReport {
    /// Cached spans of `key`, ordered by position.
    pub fn spans_for(&self, key: &str) -> Option<&BTreeSet<Span>> {
        self.spans.get(key)
    }

    /// Keys with at least one cached span, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.spans.keys().map(String::as_str)
    }

    /// All cached entries, ordered by key then position.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.spans.values().flatten().filter_map(Span::cache_entry)
    }

    pub fn span_count(&self) -> usize {
        self.spans.values().map(BTreeSet::len).sum()
    }

    /// Total bytes held by cached spans.
    pub fn total_bytes(&self) -> u64 {
        self.entries().map(CacheEntry::length).sum()
    }

    /// Serializable view of this report.
    pub fn summary(&self) -> ScanSummary<'_> {
        ScanSummary {
            scanned: self.scanned,
            upgraded: self.upgraded,
            removed: self.removed,
            invalid: &self.invalid,
            duplicates: &self.duplicates,
            errors: &self.errors,
            total_bytes: self.total_bytes(),
            spans: self.entries().collect(),
        }
    }

    fn insert(&mut self, entry: CacheEntry) {
        let spans = self.spans.entry(entry.key().to_string()).or_default();
        let span = Span::from(entry);

        let existing_ts = match spans.get(&span) {
            None => {
                spans.insert(span);
                return;
            }
            Some(existing) => existing.last_access_timestamp(),
        };

        // Same key and position: keep the most recently accessed file.
        let (Some(existing_ts), Some(new_ts)) = (existing_ts, span.last_access_timestamp()) else {
            return;
        };
        if new_ts > existing_ts {
            if let Some(old) = spans.replace(span).and_then(|old| old.file().map(Path::to_path_buf)) {
                self.duplicates.push(old);
            }
        } else if let Some(file) = span.file() {
            self.duplicates.push(file.to_path_buf());
        }
    }
}

/// JSON form of a [`ScanReport`].
#[derive(Debug, Serialize)]
pub struct ScanSummary<'a> {
    pub scanned: usize,
    pub upgraded: usize,
    pub removed: usize,
    pub invalid: &'a [PathBuf],
    pub duplicates: &'a [PathBuf],
    pub errors: &'a [String],
    pub total_bytes: u64,
    pub spans: Vec<&'a CacheEntry>,
}

/// Rebuild the span index of `config.cache_dir`.
pub fn scan_directory(config: &ScanConfig, codec: &SpanCodec) -> ScanResult<ScanReport> {
    let dir = config.cache_dir.as_path();
    if !dir.is_dir() {
        return Err(ScanError::NotFound(dir.to_path_buf()));
    }

    let mut report = ScanReport::default();

    // Upgrades rename inside `dir`, so take the listing before touching anything.
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        match entry {
            Ok(e) => paths.push(e.path()),
            Err(e) => report.errors.push(format!("Failed to read directory entry: {}", e)),
        }
    }
    paths.sort();

    for path in paths {
        if !path.is_file() || is_hidden(&path) {
            continue;
        }
        report.scanned += 1;

        let decoded = if config.upgrade_legacy {
            decode_with_upgrade(codec, &path, &mut report)
        } else {
            decode_any_version(codec, &path)
        };

        match decoded {
            Some(entry) => {
                debug!(path = %entry.file().display(), key = entry.key(), position = entry.position(), "recovered span");
                report.insert(entry);
            }
            None => handle_invalid(config, path, &mut report),
        }
    }

    info!(
        dir = %dir.display(),
        scanned = report.scanned,
        spans = report.span_count(),
        upgraded = report.upgraded,
        invalid = report.invalid.len(),
        "cache directory scanned"
    );
    Ok(report)
}

fn decode_with_upgrade(codec: &SpanCodec, path: &Path, report: &mut ScanReport) -> Option<CacheEntry> {
    match codec.upgrade(path) {
        UpgradeOutcome::Unchanged(path) => codec.create_cache_entry(&path),
        UpgradeOutcome::Upgraded { path, .. } => {
            report.upgraded += 1;
            codec.create_cache_entry(&path)
        }
        UpgradeOutcome::Failed { path, error, .. } => {
            report
                .errors
                .push(format!("Failed to upgrade {}: {}", path.display(), error));
            // Serve the file under its legacy identity until a later scan.
            decode_any_version(codec, &path)
        }
    }
}

fn decode_any_version(codec: &SpanCodec, path: &Path) -> Option<CacheEntry> {
    FormatVersion::RULES
        .iter()
        .find_map(|version| codec.decode_entry_as(*version, path))
}

fn handle_invalid(config: &ScanConfig, path: PathBuf, report: &mut ScanReport) {
    debug!(path = %path.display(), "not a cache entry");

    if config.remove_invalid {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed invalid cache file");
                report.removed += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove invalid cache file");
                report.errors.push(format!("Failed to delete {}: {}", path.display(), e));
            }
        }
    }
    report.invalid.push(path);
}

/// Dot files that are not span names under any format version.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.') && grammar::parse(n).is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; len]).unwrap();
        path
    }

    #[test]
    fn test_scan_missing_dir() {
        let config = ScanConfig::for_dir("/nonexistent/cache");
        let err = scan_directory(&config, &SpanCodec::new()).unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn test_scan_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let report = scan_directory(&ScanConfig::for_dir(temp_dir.path()), &SpanCodec::new()).unwrap();
        assert_eq!(report.scanned, 0);
        assert_eq!(report.span_count(), 0);
        assert_eq!(report.total_bytes(), 0);
    }

    #[test]
    fn test_scan_skips_hidden_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), ".lock", 0);
        fs::create_dir(temp_dir.path().join("k.0.1.v2.exo")).unwrap();

        let report = scan_directory(&ScanConfig::for_dir(temp_dir.path()), &SpanCodec::new()).unwrap();

        assert_eq!(report.scanned, 0);
        assert!(report.invalid.is_empty());
    }

    #[test]
    fn test_scan_upgrades_legacy_name_with_leading_dot() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), ".profile.0.5.v1.exo", 2);
        write(temp_dir.path(), ".DS_Store", 2);

        let report = scan_directory(&ScanConfig::for_dir(temp_dir.path()), &SpanCodec::new()).unwrap();

        assert_eq!(report.scanned, 1);
        assert_eq!(report.upgraded, 1);
        assert!(report.spans_for(".profile").is_some());
        assert!(temp_dir.path().join("%2eprofile.0.5.v2.exo").exists());
        assert!(temp_dir.path().join(".DS_Store").exists());
    }

    #[test]
    fn test_duplicate_span_keeps_most_recent() {
        let temp_dir = TempDir::new().unwrap();
        let older = write(temp_dir.path(), "k.0.100.v2.exo", 1);
        let newer = write(temp_dir.path(), "k.0.200.v2.exo", 1);

        let report = scan_directory(&ScanConfig::for_dir(temp_dir.path()), &SpanCodec::new()).unwrap();

        let spans = report.spans_for("k").unwrap();
        assert_eq!(spans.len(), 1);
        let kept = spans.iter().next().unwrap();
        assert_eq!(kept.file(), Some(newer.as_path()));
        assert_eq!(report.duplicates, vec![older]);
    }
}
