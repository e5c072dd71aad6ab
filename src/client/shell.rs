//! The daemon handle.
//!
//! A [`Shell`] pairs a resolved API base URL with one HTTP client configured
//! for the daemon:
//!
//! - no connection keep-alive (`pool_max_idle_per_host(0)`); daemon
//!   connections are short calls or long streams and pooled reuse has
//!   caused connection-state bugs, so this stays off
//! - redirects are never followed
//! - no default timeout
//! - an optional bearer token added to every request
//! - an optional proxy; without one, system proxy settings are ignored
//! - `/unix/<path>` addresses dial that socket for every request
//!
//! `Shell` is cheap to clone; clones share the HTTP client and configuration.
//!
//! # Examples
//!
//! ```
//! use ipfs_shell::client::Shell;
//! use std::time::Duration;
//!
//! let shell = Shell::builder()
//!     .api("/ip4/127.0.0.1/tcp/5001")
//!     .timeout(Duration::from_secs(30))
//!     .bearer_token("secret")
//!     .build()
//!     .unwrap();
//! assert_eq!(shell.base_url().as_str(), "http://127.0.0.1:5001/");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::client::config::{ApiDiscovery, PubSubWireFormat, ShellConfig};
use crate::client::request::RequestBuilder;
use crate::error::Result;
use crate::protocol::{resolve_endpoint, Endpoint};

/// HTTP client wrapper that applies per-shell request decoration.
#[derive(Clone)]
pub(crate) struct Transport {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl Transport {
    fn build(config: &ShellConfig, endpoint: &Endpoint) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.clone());

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &config.proxy {
            Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy)?),
            None => builder.no_proxy(),
        };

        if let Some(socket) = endpoint.unix_socket() {
            builder = dial_unix(builder, socket)?;
        }

        Ok(Self {
            client: builder.build()?,
            bearer_token: config.bearer_token.clone(),
        })
    }

    /// Start a POST request, with the bearer token when configured.
    pub(crate) fn post(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[cfg(unix)]
fn dial_unix(
    builder: reqwest::ClientBuilder,
    socket: &std::path::Path,
) -> Result<reqwest::ClientBuilder> {
    Ok(builder.unix_socket(socket.to_path_buf()))
}

#[cfg(not(unix))]
fn dial_unix(
    _builder: reqwest::ClientBuilder,
    socket: &std::path::Path,
) -> Result<reqwest::ClientBuilder> {
    Err(crate::error::ShellError::UnsupportedEndpoint(format!(
        "unix socket {} on a platform without unix sockets",
        socket.display()
    )))
}

/// Handle to one daemon's HTTP API.
#[derive(Clone)]
pub struct Shell {
    base: Url,
    endpoint: Endpoint,
    transport: Transport,
    config: Arc<ShellConfig>,
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.config.timeout)
            .field("authenticated", &self.config.bearer_token.is_some())
            .finish()
    }
}

impl Shell {
    /// Shell for the daemon at `api` (host:port, URL or multiaddress).
    pub fn new(api: impl Into<String>) -> Result<Self> {
        Self::with_config(ShellConfig::with_api(api))
    }

    /// Shell for the locally discovered daemon.
    ///
    /// See [`ApiDiscovery`] for the lookup order.
    pub fn local() -> Result<Self> {
        Self::from_discovery(&ApiDiscovery::from_process())
    }

    /// Shell for the daemon found by `discovery`.
    pub fn from_discovery(discovery: &ApiDiscovery) -> Result<Self> {
        Self::new(discovery.discover()?)
    }

    /// Shell built from a full configuration.
    pub fn with_config(config: ShellConfig) -> Result<Self> {
        let endpoint = resolve_endpoint(&config.api)?;
        let base = endpoint.base_url()?;
        let transport = Transport::build(&config, &endpoint)?;
        tracing::debug!(api = ?endpoint, timeout = ?config.timeout, "created shell");
        Ok(Self {
            base,
            endpoint,
            transport,
            config: Arc::new(config),
        })
    }

    /// Start building a shell.
    pub fn builder() -> ShellBuilder {
        ShellBuilder::default()
    }

    /// Start a request for `command`, e.g. `"pin/add"`.
    pub fn request(&self, command: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.clone(), command)
    }

    /// Base URL of the daemon, without the API prefix.
    ///
    /// For a unix socket endpoint this is the placeholder `http://localhost/`.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// The endpoint this shell dials.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Configuration this shell was built from.
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Pubsub representation used by the target daemon.
    pub fn pubsub_format(&self) -> PubSubWireFormat {
        self.config.pubsub_format
    }

    /// A shell identical to this one but with a different timeout.
    pub fn with_timeout(&self, timeout: Option<Duration>) -> Result<Self> {
        Self::with_config(ShellConfig {
            timeout,
            ..(*self.config).clone()
        })
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }
}

/// Fluent builder for [`Shell`].
#[derive(Debug, Clone, Default)]
pub struct ShellBuilder {
    config: ShellConfig,
}

impl ShellBuilder {
    /// API address: host:port, URL or multiaddress.
    pub fn api(mut self, api: impl Into<String>) -> Self {
        self.config.api = api.into();
        self
    }

    /// Whole-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Bearer token sent with every request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(token.into());
        self
    }

    /// Proxy URL for all requests.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy.into());
        self
    }

    /// Pubsub payload representation of the target daemon.
    pub fn pubsub_format(mut self, format: PubSubWireFormat) -> Self {
        self.config.pubsub_format = format;
        self
    }

    /// Capacity of each pubsub subscriber's channel.
    pub fn subscriber_buffer(mut self, capacity: usize) -> Self {
        self.config.subscriber_buffer = capacity.max(1);
        self
    }

    /// `User-Agent` header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the shell.
    pub fn build(self) -> Result<Shell> {
        Shell::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_port_shell() {
        let shell = Shell::new("localhost:5001").unwrap();
        assert_eq!(shell.base_url().as_str(), "http://localhost:5001/");
        assert!(shell.config().timeout.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_socket_shell() {
        let shell = Shell::new("/unix/tmp/api.sock").unwrap();
        assert_eq!(shell.base_url().as_str(), "http://localhost/");
        assert_eq!(
            shell.endpoint(),
            &Endpoint::Unix(std::path::PathBuf::from("/tmp/api.sock"))
        );
    }

    #[cfg(not(unix))]
    #[test]
    fn test_unix_socket_is_unsupported() {
        let err = Shell::new("/unix/tmp/api.sock").unwrap_err();
        assert!(matches!(err, crate::error::ShellError::UnsupportedEndpoint(_)));
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let result = Shell::builder().api("localhost:5001").proxy("http://[invalid").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_with_timeout_keeps_endpoint() {
        let shell = Shell::new("localhost:5001").unwrap();
        let timed = shell.with_timeout(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(timed.base_url(), shell.base_url());
        assert_eq!(timed.config().timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_builder_settings() {
        let shell = Shell::builder()
            .api("https://node.example")
            .pubsub_format(PubSubWireFormat::ByteArray)
            .subscriber_buffer(0)
            .build()
            .unwrap();
        assert_eq!(shell.pubsub_format(), PubSubWireFormat::ByteArray);
        assert_eq!(shell.config().subscriber_buffer, 1);
        assert!(format!("{shell:?}").contains("node.example"));
    }

    #[test]
    fn test_from_discovery() {
        let discovery = ApiDiscovery::with_env(
            |key| (key == "IPFS_API").then(|| "/ip4/10.1.2.3/tcp/5001".to_string()),
            None,
        );
        let shell = Shell::from_discovery(&discovery).unwrap();
        assert_eq!(shell.base_url().as_str(), "http://10.1.2.3:5001/");
    }
}
