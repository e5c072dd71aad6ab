//! Client configuration and local daemon discovery.
//!
//! [`ShellConfig`] is a plain struct; fill in the fields you care about and
//! take the rest from [`Default`]:
//!
//! ```
//! use ipfs_shell::client::ShellConfig;
//! use std::time::Duration;
//!
//! let config = ShellConfig {
//!     api: "/ip4/127.0.0.1/tcp/5001".to_string(),
//!     timeout: Some(Duration::from_secs(30)),
//!     ..Default::default()
//! };
//! assert!(config.bearer_token.is_none());
//! ```
//!
//! [`ApiDiscovery`] finds the API address of a locally running daemon. It is
//! an ordinary value built by the caller, so tests can swap the environment
//! out without touching process state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::protocol::constants::DEFAULT_API;

/// Environment variable holding an explicit API address.
pub const ENV_API: &str = "IPFS_API";

/// Environment variable overriding the daemon's repository directory.
pub const ENV_REPO_DIR: &str = "IPFS_PATH";

/// Repository directory name under the home directory.
pub const DEFAULT_REPO_DIR: &str = ".ipfs";

/// Name of the file a running daemon writes its API address into.
pub const API_FILE: &str = "api";

/// Representation of pubsub payloads on the wire.
///
/// The two representations are not interchangeable: receiving the other one
/// is a decode error rather than a silent misparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PubSubWireFormat {
    /// `data` and `seqno` are base64 strings; payloads are published as a
    /// positional argument.
    #[default]
    Base64,
    /// `data` and `seqno` are JSON arrays of byte values; payloads are
    /// published as a multipart file part.
    ByteArray,
}

/// Configuration for a [`Shell`](crate::client::Shell).
#[derive(Clone)]
pub struct ShellConfig {
    /// API address: `host:port`, a full URL, or a multiaddress.
    pub api: String,
    /// Whole-request timeout. `None` leaves long-running commands unbounded.
    pub timeout: Option<Duration>,
    /// Bearer token added to every request as `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
    /// Proxy URL applied to all requests.
    pub proxy: Option<String>,
    /// Pubsub payload representation used by the target daemon.
    pub pubsub_format: PubSubWireFormat,
    /// Capacity of each pubsub subscriber's inbound channel.
    pub subscriber_buffer: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            api: DEFAULT_API.to_string(),
            timeout: None,
            bearer_token: None,
            proxy: None,
            pubsub_format: PubSubWireFormat::default(),
            subscriber_buffer: 16,
            user_agent: concat!("ipfs-shell/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// Keeps the bearer token out of logs.
impl fmt::Debug for ShellConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellConfig")
            .field("api", &self.api)
            .field("timeout", &self.timeout)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("proxy", &self.proxy)
            .field("pubsub_format", &self.pubsub_format)
            .field("subscriber_buffer", &self.subscriber_buffer)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ShellConfig {
    /// Configuration pointing at the given API address.
    pub fn with_api(api: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            ..Default::default()
        }
    }

    /// Configuration pointing at the locally discovered daemon.
    pub fn local() -> Result<Self> {
        Ok(Self::with_api(ApiDiscovery::from_process().discover()?))
    }
}

/// Locates the API address of a local daemon.
///
/// Lookup order:
/// 1. the `IPFS_API` environment variable,
/// 2. the `api` file in `$IPFS_PATH` (default `~/.ipfs`),
/// 3. [`DEFAULT_API`].
pub struct ApiDiscovery {
    env: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    home: Option<PathBuf>,
}

impl ApiDiscovery {
    /// Discovery backed by the real process environment and home directory.
    pub fn from_process() -> Self {
        Self {
            env: Box::new(|key| std::env::var(key).ok()),
            home: dirs::home_dir(),
        }
    }

    /// Discovery backed by an explicit environment lookup and home directory.
    pub fn with_env<F>(env: F, home: Option<PathBuf>) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            env: Box::new(env),
            home,
        }
    }

    /// Directory the daemon keeps its repository in.
    pub fn repo_dir(&self) -> Option<PathBuf> {
        match (self.env)(ENV_REPO_DIR).filter(|dir| !dir.trim().is_empty()) {
            Some(dir) => Some(expand_home(dir.trim(), self.home.as_deref())),
            None => self.home.as_ref().map(|home| home.join(DEFAULT_REPO_DIR)),
        }
    }

    /// Resolve the API address.
    ///
    /// A missing `api` file falls through to the default; an `api` file that
    /// exists but cannot be read is an error.
    pub fn discover(&self) -> Result<String> {
        if let Some(api) = (self.env)(ENV_API).filter(|api| !api.trim().is_empty()) {
            tracing::debug!(source = ENV_API, %api, "discovered API address");
            return Ok(api.trim().to_string());
        }

        if let Some(api_file) = self.repo_dir().map(|dir| dir.join(API_FILE)) {
            match std::fs::read_to_string(&api_file) {
                Ok(contents) if !contents.trim().is_empty() => {
                    let api = contents.trim().to_string();
                    tracing::debug!(file = %api_file.display(), %api, "discovered API address");
                    return Ok(api);
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(DEFAULT_API.to_string())
    }
}

fn expand_home(dir: &str, home: Option<&Path>) -> PathBuf {
    match (dir.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn discovery(vars: &[(&str, &str)], home: Option<PathBuf>) -> ApiDiscovery {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiDiscovery::with_env(move |key| vars.get(key).cloned(), home)
    }

    #[test]
    fn test_default_config() {
        let config = ShellConfig::default();
        assert_eq!(config.api, "localhost:5001");
        assert!(config.timeout.is_none());
        assert_eq!(config.pubsub_format, PubSubWireFormat::Base64);
    }

    #[test]
    fn test_env_variable_wins() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(".ipfs")).unwrap();
        std::fs::write(home.path().join(".ipfs/api"), "/ip4/10.0.0.1/tcp/5001").unwrap();

        let found = discovery(&[("IPFS_API", "127.0.0.1:9999")], Some(home.path().into()))
            .discover()
            .unwrap();
        assert_eq!(found, "127.0.0.1:9999");
    }

    #[test]
    fn test_api_file_in_default_repo() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(".ipfs")).unwrap();
        std::fs::write(home.path().join(".ipfs/api"), "/ip4/10.0.0.1/tcp/5001\n").unwrap();

        let found = discovery(&[], Some(home.path().into())).discover().unwrap();
        assert_eq!(found, "/ip4/10.0.0.1/tcp/5001");
    }

    #[test]
    fn test_api_file_in_custom_repo() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("api"), "localhost:7777").unwrap();

        let found = discovery(&[("IPFS_PATH", repo.path().to_str().unwrap())], None)
            .discover()
            .unwrap();
        assert_eq!(found, "localhost:7777");
    }

    #[test]
    fn test_fallback_to_default() {
        let home = tempfile::tempdir().unwrap();
        let found = discovery(&[], Some(home.path().into())).discover().unwrap();
        assert_eq!(found, DEFAULT_API);
    }

    #[test]
    fn test_tilde_expansion() {
        let d = discovery(&[("IPFS_PATH", "~/custom")], Some(PathBuf::from("/home/u")));
        assert_eq!(d.repo_dir(), Some(PathBuf::from("/home/u/custom")));
    }
}
