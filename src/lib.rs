//! Exo span cache maintenance
//!
//! Rebuilds the per-key span index of a media byte-range cache from a
//! directory listing alone. File names carry each span's key, position,
//! end-of-stream flag and last access time (see [`span_codec`]), so recovery
//! is a decode of every name, with legacy names promoted on the way.

pub mod config;
pub mod scan;

pub use config::{ConfigError, ScanConfig, DEFAULT_CONFIG_FILE};
pub use scan::{scan_directory, ScanError, ScanReport, ScanResult, ScanSummary};
pub use span_codec::{CacheEntry, Span, SpanCodec, SpanError, UpgradeOutcome};
