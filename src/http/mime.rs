//! MIME type guessing for bundle files
//!
//! Used only when the object store reports no type, or the generic
//! `application/octet-stream` it assigns to uploads without metadata.

use crate::proxy::LogicalKey;

pub const FALLBACK: &str = "application/octet-stream";

/// Content-Type for a lowercased file extension
///
/// # Examples
/// ```
/// use reader_proxy::http::mime::for_extension;
/// assert_eq!(for_extension("html"), Some("text/html; charset=utf-8"));
/// assert_eq!(for_extension("woff2"), Some("font/woff2"));
/// assert_eq!(for_extension("xyz"), None);
/// ```
pub fn for_extension(extension: &str) -> Option<&'static str> {
    let content_type = match extension {
        // Documents and app shell
        "html" | "htm" => "text/html; charset=utf-8",
        "xhtml" => "application/xhtml+xml",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" | "cjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "wasm" => "application/wasm",
        "txt" => "text/plain; charset=utf-8",
        "xml" | "opf" | "ncx" => "application/xml",
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        // Media
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "oga" | "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "vtt" => "text/vtt",

        _ => return None,
    };
    Some(content_type)
}

/// Content-Type guessed from the key's file name
pub fn guess(key: &LogicalKey) -> &'static str {
    key.extension()
        .as_deref()
        .and_then(for_extension)
        .unwrap_or(FALLBACK)
}
