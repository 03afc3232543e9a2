//! Reversible key escaping for file names.
//!
//! Cache keys are arbitrary text (often URLs), so they are escaped before
//! being embedded in a file name. The escaping is percent-style with
//! lowercase hex, matching existing cache directories.

use std::fmt::Write;

/// Reversible key sanitization used by the codec.
///
/// `unescape` must return `None` on malformed input rather than a wrong key.
pub trait KeyEscaper: Send + Sync {
    fn escape(&self, key: &str) -> String;
    fn unescape(&self, text: &str) -> Option<String>;
}

/// Default escaper: `%xx` for characters that are unsafe in file names or
/// that collide with the name delimiter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameEscaper;

impl FileNameEscaper {
    fn should_escape(c: char) -> bool {
        matches!(
            c,
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '%' | '.'
        )
    }
}

impl KeyEscaper for FileNameEscaper {
    fn escape(&self, key: &str) -> String {
        if !key.chars().any(Self::should_escape) {
            return key.to_string();
        }

        let mut out = String::with_capacity(key.len() + 8);
        for c in key.chars() {
            if Self::should_escape(c) {
                let _ = write!(out, "%{:02x}", c as u32);
            } else {
                out.push(c);
            }
        }
        out
    }

    fn unescape(&self, text: &str) -> Option<String> {
        if !text.contains('%') {
            return Some(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let hi = chars.next()?.to_digit(16)?;
            let lo = chars.next()?.to_digit(16)?;
            // Only codes the escaper emits.
            let decoded = char::from((hi * 16 + lo) as u8);
            if !Self::should_escape(decoded) {
                return None;
            }
            out.push(decoded);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_key_unchanged() {
        assert_eq!(FileNameEscaper.escape("plainkey123"), "plainkey123");
    }

    #[test]
    fn test_escape_slash_and_delimiter() {
        assert_eq!(FileNameEscaper.escape("video/1"), "video%2f1");
        assert_eq!(FileNameEscaper.escape("a.b"), "a%2eb");
        assert_eq!(FileNameEscaper.escape("100%"), "100%25");
    }

    #[test]
    fn test_escape_url() {
        let escaped = FileNameEscaper.escape("https://cdn.example.com/v.mp4?t=1");
        assert!(!escaped.contains('/'));
        assert!(!escaped.contains('.'));
        assert!(!escaped.contains(':'));
        assert!(!escaped.contains('?'));
        assert_eq!(
            FileNameEscaper.unescape(&escaped).as_deref(),
            Some("https://cdn.example.com/v.mp4?t=1")
        );
    }

    #[test]
    fn test_unescape_accepts_either_case() {
        assert_eq!(FileNameEscaper.unescape("video%2F1").as_deref(), Some("video/1"));
        assert_eq!(FileNameEscaper.unescape("video%2f1").as_deref(), Some("video/1"));
    }

    #[test]
    fn test_unescape_leaves_raw_dots() {
        // Older writers did not escape the delimiter.
        assert_eq!(FileNameEscaper.unescape("a.b/c").as_deref(), Some("a.b/c"));
    }

    #[test]
    fn test_unescape_rejects_malformed() {
        assert_eq!(FileNameEscaper.unescape("abc%"), None);
        assert_eq!(FileNameEscaper.unescape("abc%2"), None);
        assert_eq!(FileNameEscaper.unescape("abc%zz"), None);
        assert_eq!(FileNameEscaper.unescape("%%41"), None);
    }

    #[test]
    fn test_unescape_rejects_non_canonical_codes() {
        // Neither 'A' nor Latin-1 'é' is ever escaped, so these names are not ours.
        assert_eq!(FileNameEscaper.unescape("a%41"), None);
        assert_eq!(FileNameEscaper.unescape("caf%e9"), None);
        assert_eq!(FileNameEscaper.unescape("a%2F%2e%25").as_deref(), Some("a/.%"));
    }

    #[test]
    fn test_round_trip_non_ascii() {
        let key = "ключ/видео.mp4";
        let escaped = FileNameEscaper.escape(key);
        assert_eq!(FileNameEscaper.unescape(&escaped).as_deref(), Some(key));
    }
}
