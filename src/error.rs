//! Error types for the daemon client.
//!
//! Every public operation returns [`Result`], whose error side is a single
//! [`ShellError`] enum. Variants fall into four families so callers can tell
//! them apart without string matching:
//!
//! | Family | Variants | Meaning |
//! |--------|----------|---------|
//! | Transport | [`ShellError::Transport`], [`ShellError::UnexpectedRedirect`], [`ShellError::Io`] | The request never produced a usable response |
//! | Protocol | [`ShellError::CommandNotFound`], [`ShellError::Daemon`] | The daemon answered and rejected the call |
//! | Decode | [`ShellError::Decode`], [`ShellError::Json`] | The daemon answered but the body could not be parsed |
//! | Subscription | [`ShellError::Subscription`], [`ShellError::StreamClosed`] | A pubsub topic stream failed |
//!
//! The library never retries; every error is returned to the caller that
//! triggered it.

use std::sync::Arc;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ShellError>;

/// Errors produced by the daemon client.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Connection, DNS, TLS or timeout failure reported by the HTTP stack.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The daemon answered with a 3xx status. Redirects are never followed.
    #[error("unexpected redirect ({status}) to {location}")]
    UnexpectedRedirect {
        /// Status code of the redirect response.
        status: u16,
        /// Value of the `Location` header, empty when absent.
        location: String,
    },

    /// Local I/O failure, e.g. while reading a file for upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon does not know the requested command (HTTP 404).
    #[error("command not found")]
    CommandNotFound,

    /// The daemon rejected the call with an error status.
    #[error("{message}")]
    Daemon {
        /// HTTP status code of the error response.
        status: u16,
        /// Message supplied by the daemon, verbatim.
        message: String,
        /// Numeric error code when the daemon sent a structured error.
        code: Option<i64>,
    },

    /// A response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A response body was not valid JSON for the target type.
    #[error("invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    /// A pubsub topic stream failed; every subscriber observes this once.
    #[error("subscription to topic {topic:?} failed: {source}")]
    Subscription {
        /// Topic whose stream failed.
        topic: String,
        /// The recorded failure reason shared by all subscribers.
        source: Arc<ShellError>,
    },

    /// The daemon ended a stream that was expected to stay open.
    #[error("stream closed by daemon")]
    StreamClosed,

    /// A streaming call finished without producing any result.
    #[error("no results received")]
    EmptyResponse,

    /// The API address could not be parsed as a URL.
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),

    /// The API address looked like a multiaddress but could not be resolved.
    #[error("invalid multiaddress: {0}")]
    Multiaddr(String),

    /// The endpoint resolved to something the HTTP stack cannot dial.
    #[error("unsupported API endpoint: {0}")]
    UnsupportedEndpoint(String),

    /// The request could not be built from the supplied inputs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ShellError {
    /// True for failures where no daemon response was obtained.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ShellError::Transport(_) | ShellError::UnexpectedRedirect { .. } | ShellError::Io(_)
        )
    }

    /// True when the daemon answered and rejected the call.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ShellError::CommandNotFound | ShellError::Daemon { .. })
    }

    /// True when the daemon's response could not be parsed.
    pub fn is_decode(&self) -> bool {
        matches!(self, ShellError::Decode(_) | ShellError::Json(_))
    }

    /// True when the error came from the HTTP stack's own timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ShellError::Transport(e) if e.is_timeout())
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        ShellError::Decode(message.into())
    }
}

impl From<std::string::FromUtf8Error> for ShellError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ShellError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_message() {
        let err = ShellError::UnexpectedRedirect {
            status: 301,
            location: "/api/v0/version".to_string(),
        };
        assert!(err.to_string().contains("unexpected redirect"));
        assert!(err.is_transport());
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_daemon_message_is_verbatim() {
        let err = ShellError::Daemon {
            status: 500,
            message: "invalid path \"foo\"".to_string(),
            code: Some(0),
        };
        assert_eq!(err.to_string(), "invalid path \"foo\"");
        assert!(err.is_protocol());
    }

    #[test]
    fn test_decode_classification() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(ShellError::from(json_err).is_decode());
        assert!(ShellError::decode("bad").is_decode());
        assert!(!ShellError::CommandNotFound.is_decode());
    }
}
