//! Header parsing and formatting for daemon requests and responses.
//!
//! | Helper | Purpose | Example |
//! |--------|---------|---------|
//! | [`media_type`] | strip parameters from a `Content-Type` value | `text/plain; charset=utf-8` → `text/plain` |
//! | [`content_disposition`] | name a multipart part | `form-data; name="file"; filename="dir%2Fa.txt"` |
//! | [`parse_error_body`] | turn an error body into a message | `{"Message":"not pinned"}` → `not pinned` |
//!
//! # Examples
//!
//! ```
//! use ipfs_shell::protocol::{content_disposition, media_type};
//!
//! assert_eq!(media_type("application/json; charset=utf-8"), "application/json");
//! assert_eq!(
//!     content_disposition("file", "docs/a b.txt"),
//!     r#"form-data; name="file"; filename="docs%2Fa+b.txt""#
//! );
//! ```

use serde::Deserialize;

use super::constants::media;

/// Return the media type of a `Content-Type` header value, lowercased and
/// without parameters.
///
/// # Examples
///
/// ```
/// use ipfs_shell::protocol::media_type;
///
/// assert_eq!(media_type("Text/Plain; charset=utf-8"), "text/plain");
/// assert_eq!(media_type(""), "");
/// ```
pub fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Format the `Content-Disposition` value of one multipart part.
///
/// The filename is query-escaped so that relative paths containing `/`,
/// spaces or non-ASCII bytes survive the trip intact.
pub fn content_disposition(field: &str, filename: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(filename.as_bytes()).collect();
    format!("form-data; name=\"{}\"; filename=\"{}\"", field, escaped)
}

/// Structured error returned by the daemon for non-text error responses.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DaemonErrorBody {
    /// Human-readable message.
    #[serde(rename = "Message", alias = "message", default)]
    pub message: String,
    /// Daemon error code.
    #[serde(rename = "Code", alias = "code", default)]
    pub code: Option<i64>,
}

/// Extract an error message from a failed response body.
///
/// `text/plain` bodies are the message, byte for byte (trailing newline
/// included). Any other media type is decoded as a [`DaemonErrorBody`]; when
/// that fails the raw body text is used so the daemon's words are never lost.
pub fn parse_error_body(media: &str, body: &[u8]) -> DaemonErrorBody {
    if media == media::TEXT_PLAIN {
        return verbatim(body);
    }
    serde_json::from_slice::<DaemonErrorBody>(body).unwrap_or_else(|_| verbatim(body))
}

fn verbatim(body: &[u8]) -> DaemonErrorBody {
    DaemonErrorBody {
        message: String::from_utf8_lossy(body).into_owned(),
        code: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_strips_parameters() {
        assert_eq!(media_type("text/plain; charset=utf-8"), "text/plain");
        assert_eq!(media_type("application/json"), "application/json");
    }

    #[test]
    fn test_content_disposition_escapes_path() {
        assert_eq!(
            content_disposition("file", "dir/sub/ä.txt"),
            "form-data; name=\"file\"; filename=\"dir%2Fsub%2F%C3%A4.txt\""
        );
    }

    #[test]
    fn test_content_disposition_empty_name() {
        assert_eq!(
            content_disposition("file", ""),
            "form-data; name=\"file\"; filename=\"\""
        );
    }

    #[test]
    fn test_parse_error_body_text() {
        let err = parse_error_body("text/plain", b"404 page not found\n");
        assert_eq!(err.message, "404 page not found\n");
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_parse_error_body_json() {
        let err = parse_error_body(
            "application/json",
            br#"{"Message":"not pinned or pinned indirectly","Code":0,"Type":"error"}"#,
        );
        assert_eq!(err.message, "not pinned or pinned indirectly");
        assert_eq!(err.code, Some(0));
    }

    #[test]
    fn test_parse_error_body_malformed_json_keeps_text() {
        let err = parse_error_body("application/json", b"internal failure\r\n");
        assert_eq!(err.message, "internal failure\r\n");
    }
}
