//! Object key sanitization
//!
//! Turns raw, possibly percent-encoded request path segments into a
//! `LogicalKey` that is safe to append to an object-store URL.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;

use super::error::ProxyError;

/// Characters escaped when a key segment is placed back into a URL path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'^')
    .add(b'|')
    .add(b'\'');

/// Sanitized, slash-joined object key
///
/// Segments are never empty, `.` or `..`, and never contain control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalKey {
    segments: Vec<String>,
}

impl LogicalKey {
    /// Key segments in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Append a segment (used for index file resolution)
    ///
    /// The segment goes through the same filtering as request input; unusable
    /// segments are ignored.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(clean_segments(segment));
        Self { segments }
    }

    /// Final segment, e.g. `index.html`
    pub fn file_name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Lowercased extension of the final segment
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Whether any directory segment equals `dir` (ASCII case-insensitive)
    pub fn has_dir(&self, dir: &str) -> bool {
        let dirs = &self.segments[..self.segments.len().saturating_sub(1)];
        dirs.iter().any(|s| s.eq_ignore_ascii_case(dir))
    }

    /// Percent-encoded form for use in a URL path
    pub fn to_url_path(&self) -> String {
        encode_segments(&self.segments)
    }

    /// Percent-encoded parent directory, without leading or trailing slash
    ///
    /// Empty when the key is a single segment.
    pub fn parent_url_path(&self) -> String {
        let parent = &self.segments[..self.segments.len().saturating_sub(1)];
        encode_segments(parent)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Result of sanitizing a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub key: LogicalKey,
    /// Number of `.` / `..` segments that were dropped
    pub dropped_traversal: usize,
}

/// Sanitize raw path segments into a `LogicalKey`
///
/// Each input is percent-decoded (lossily, never failing), split on `/`,
/// stripped of control characters, and filtered of empty, `.` and `..` pieces.
/// Traversal pieces are dropped wherever they appear rather than rejected.
///
/// # Examples
/// ```
/// use reader_proxy::proxy::key::sanitize;
/// let key = sanitize(["..", "etc", "passwd"]).unwrap();
/// assert_eq!(key.to_string(), "etc/passwd");
/// ```
pub fn sanitize<I, S>(raw: I) -> Result<LogicalKey, ProxyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    sanitize_counted(raw).map(|s| s.key)
}

/// Same as [`sanitize`], also reporting how many traversal segments were dropped
pub fn sanitize_counted<I, S>(raw: I) -> Result<Sanitized, ProxyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut segments = Vec::new();
    let mut dropped_traversal = 0;

    for part in raw {
        let decoded = percent_decode_str(part.as_ref()).decode_utf8_lossy();
        for piece in decoded.split('/') {
            let piece: String = piece.chars().filter(|c| !c.is_control()).collect();
            match piece.as_str() {
                "" => {}
                "." | ".." => dropped_traversal += 1,
                _ => segments.push(piece),
            }
        }
    }

    if segments.is_empty() {
        return Err(ProxyError::MissingPath);
    }

    Ok(Sanitized {
        key: LogicalKey { segments },
        dropped_traversal,
    })
}

fn clean_segments(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split('/')
        .map(|piece| piece.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|piece| !matches!(piece.as_str(), "" | "." | ".."))
}

fn encode_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
