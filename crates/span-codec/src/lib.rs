//! Span descriptors for a byte-range media cache.
//!
//! A [`Span`] identifies a range of a keyed stream: bytes already cached on
//! local storage, a known-absent hole, or a bare lookup probe. Cached spans
//! keep their identity and last-access time in the backing file's name, so a
//! directory listing alone is enough to rebuild the cache index after a crash.
//!
//! [`SpanCodec`] owns the file name grammar (two format versions), promotes
//! legacy names on sight, and implements `touch` by renaming the backing file.
//!
//! ## File name grammar
//!
//! - v2 (written): `<escapedKey>.<position>[E].<lastAccessTimestamp>.v2.exo`
//! - v1 (read and migrated only): `<rawKey>.<position>.<lastAccessTimestamp>.v1.exo`

pub mod clock;
pub mod codec;
pub mod error;
pub mod escape;
pub mod grammar;
pub mod span;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{SpanCodec, UpgradeOutcome};
pub use error::{SpanError, SpanResult};
pub use escape::{FileNameEscaper, KeyEscaper};
pub use grammar::{FormatVersion, ParsedName, EOS_MARKER, V1_SUFFIX, V2_SUFFIX};
pub use span::{CacheEntry, Span};
pub use storage::{FsStorage, MemoryStorage, SpanStorage};
