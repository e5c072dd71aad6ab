//! Wire-level conventions of the daemon's HTTP API.
//!
//! # Request Shape
//!
//! ```text
//! POST <base>/api/v0/<command>?arg=<v1>&arg=<v2>&<opt>=<val>
//! Content-Type: multipart/form-data; boundary=<token>   (uploads only)
//! Authorization: Bearer <token>                          (when configured)
//! ```
//!
//! # Response Shape
//!
//! | Status | Content-Type | Interpretation |
//! |--------|--------------|----------------|
//! | `< 300` | `application/json` | one value, or a stream of concatenated values |
//! | `< 300` | anything else | raw bytes (`cat`, `get`, `block/get`) |
//! | `3xx` | any | rejected, redirects are never followed |
//! | `404` | any | command not found |
//! | `>= 400` | `text/plain` | error message is the body |
//! | `>= 400` | other | structured JSON error `{"Message": ..., "Code": ...}` |
//!
//! # Module Organization
//!
//! ```text
//! protocol/
//! ├── headers   - content-type and content-disposition helpers, error bodies
//! └── multiaddr - endpoint resolution for host:port, URL and multiaddress forms
//! ```

pub mod headers;
pub mod multiaddr;

pub use self::headers::{
    content_disposition, media_type, parse_error_body, DaemonErrorBody,
};
pub use self::multiaddr::{resolve_endpoint, Endpoint};

/// Protocol constants.
pub mod constants {
    /// Path prefix of every API command.
    pub const API_PREFIX: &str = "/api/v0";

    /// Address used when no endpoint is configured or discovered.
    pub const DEFAULT_API: &str = "localhost:5001";

    /// Options sent with every request unless overwritten.
    pub const DEFAULT_OPTIONS: [(&str, &str); 2] =
        [("encoding", "json"), ("stream-channels", "true")];

    /// Query parameter carrying positional arguments.
    pub const ARG: &str = "arg";

    /// Media types the client inspects or emits.
    pub mod media {
        /// Plain-text error bodies.
        pub const TEXT_PLAIN: &str = "text/plain";
        /// Regular file parts.
        pub const OCTET_STREAM: &str = "application/octet-stream";
        /// Directory parts.
        pub const DIRECTORY: &str = "application/x-directory";
        /// Symlink parts; the body is the link target.
        pub const SYMLINK: &str = "application/symlink";
        /// Multipart upload bodies.
        pub const MULTIPART_FORM: &str = "multipart/form-data";
    }

    /// Header names.
    pub mod headers {
        /// Body media type.
        pub const CONTENT_TYPE: &str = "content-type";
        /// Part naming header inside multipart bodies.
        pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
        /// Redirect target.
        pub const LOCATION: &str = "location";
    }
}

#[cfg(test)]
mod tests {
    use super::constants::{headers, media};
    use reqwest::header;

    #[test]
    fn test_header_names_match_http_registry() {
        assert_eq!(headers::CONTENT_TYPE, header::CONTENT_TYPE.as_str());
        assert_eq!(headers::LOCATION, header::LOCATION.as_str());
        assert!(headers::CONTENT_DISPOSITION.eq_ignore_ascii_case(header::CONTENT_DISPOSITION.as_str()));
    }

    #[test]
    fn test_part_media_types_are_distinct() {
        let parts = [media::OCTET_STREAM, media::DIRECTORY, media::SYMLINK];
        for (i, a) in parts.iter().enumerate() {
            for b in &parts[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
