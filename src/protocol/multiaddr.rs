//! Resolution of configured API addresses into dialable endpoints.
//!
//! Three spellings are accepted:
//!
//! | Input | Resolved base URL |
//! |-------|-------------------|
//! | `localhost:5001` | `http://localhost:5001` |
//! | `https://node.example:443` | `https://node.example:443` |
//! | `/ip4/127.0.0.1/tcp/5001` | `http://127.0.0.1:5001` |
//! | `/dns4/node.example/tcp/443/https` | `https://node.example:443` |
//! | `/unix/var/run/api.sock` | unix socket `/var/run/api.sock` |

use multiaddr::{Multiaddr, Protocol};
use std::path::PathBuf;
use url::Url;

use crate::error::{Result, ShellError};

/// A resolved daemon endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// An HTTP(S) base URL without the API prefix.
    Http(Url),
    /// A unix domain socket path.
    Unix(PathBuf),
}

/// Authority written into request URLs sent over a unix socket.
pub const UNIX_BASE_URL: &str = "http://localhost";

impl Endpoint {
    /// Base URL requests are built on.
    ///
    /// Unix socket requests carry a placeholder authority; the socket path
    /// is given to the transport instead.
    pub fn base_url(&self) -> Result<Url> {
        match self {
            Endpoint::Http(url) => Ok(url.clone()),
            Endpoint::Unix(_) => Ok(Url::parse(UNIX_BASE_URL)?),
        }
    }

    /// Socket path, for unix endpoints.
    pub fn unix_socket(&self) -> Option<&PathBuf> {
        match self {
            Endpoint::Unix(path) => Some(path),
            Endpoint::Http(_) => None,
        }
    }
}

/// Resolve an API address given as host:port, URL or multiaddress.
///
/// # Examples
///
/// ```
/// use ipfs_shell::protocol::{resolve_endpoint, Endpoint};
///
/// let endpoint = resolve_endpoint("/ip4/127.0.0.1/tcp/5001").unwrap();
/// match endpoint {
///     Endpoint::Http(url) => assert_eq!(url.as_str(), "http://127.0.0.1:5001/"),
///     Endpoint::Unix(_) => unreachable!(),
/// }
/// ```
pub fn resolve_endpoint(address: &str) -> Result<Endpoint> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ShellError::InvalidRequest("empty API address".to_string()));
    }

    if let Some(rest) = address.strip_prefix("/unix/") {
        if rest.is_empty() {
            return Err(ShellError::Multiaddr(format!("{address}: missing socket path")));
        }
        return Ok(Endpoint::Unix(PathBuf::from(format!("/{rest}"))));
    }

    if address.starts_with('/') {
        let maddr: Multiaddr = address
            .parse()
            .map_err(|e| ShellError::Multiaddr(format!("{address}: {e}")))?;
        return resolve_multiaddr(&maddr).map(Endpoint::Http);
    }

    let with_scheme = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    Ok(Endpoint::Http(Url::parse(&with_scheme)?))
}

fn resolve_multiaddr(maddr: &Multiaddr) -> Result<Url> {
    let mut host: Option<String> = None;
    let mut port: Option<u16> = None;
    let mut scheme = "http";

    for protocol in maddr.iter() {
        match protocol {
            Protocol::Ip4(ip) => host = Some(ip.to_string()),
            Protocol::Ip6(ip) => host = Some(format!("[{ip}]")),
            Protocol::Dns(name) | Protocol::Dns4(name) | Protocol::Dns6(name) => {
                host = Some(name.to_string())
            }
            Protocol::Tcp(p) => port = Some(p),
            Protocol::Http => scheme = "http",
            Protocol::Https => scheme = "https",
            other => {
                return Err(ShellError::Multiaddr(format!(
                    "{maddr}: unsupported protocol {other}"
                )))
            }
        }
    }

    let host = host.ok_or_else(|| ShellError::Multiaddr(format!("{maddr}: missing host")))?;
    let port = port.ok_or_else(|| ShellError::Multiaddr(format!("{maddr}: missing tcp port")))?;
    Ok(Url::parse(&format!("{scheme}://{host}:{port}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(address: &str) -> String {
        match resolve_endpoint(address).unwrap() {
            Endpoint::Http(url) => url.to_string(),
            Endpoint::Unix(path) => panic!("unexpected unix endpoint {path:?}"),
        }
    }

    #[test]
    fn test_host_port_gets_scheme() {
        assert_eq!(http("localhost:5001"), "http://localhost:5001/");
    }

    #[test]
    fn test_full_url_kept() {
        assert_eq!(http("https://node.example:8443"), "https://node.example:8443/");
    }

    #[test]
    fn test_ip4_multiaddr() {
        assert_eq!(http("/ip4/127.0.0.1/tcp/5001"), "http://127.0.0.1:5001/");
    }

    #[test]
    fn test_ip6_multiaddr() {
        assert_eq!(http("/ip6/::1/tcp/5001"), "http://[::1]:5001/");
    }

    #[test]
    fn test_dns_https_multiaddr() {
        assert_eq!(http("/dns4/node.example/tcp/443/https"), "https://node.example/");
    }

    #[test]
    fn test_unix_socket() {
        let endpoint = resolve_endpoint("/unix/var/run/api.sock").unwrap();
        assert_eq!(endpoint, Endpoint::Unix(PathBuf::from("/var/run/api.sock")));
        assert_eq!(endpoint.base_url().unwrap().as_str(), "http://localhost/");
        assert_eq!(
            endpoint.unix_socket(),
            Some(&PathBuf::from("/var/run/api.sock"))
        );
    }

    #[test]
    fn test_missing_port_rejected() {
        assert!(matches!(
            resolve_endpoint("/ip4/127.0.0.1"),
            Err(ShellError::Multiaddr(_))
        ));
    }

    #[test]
    fn test_unsupported_protocol_rejected() {
        assert!(matches!(
            resolve_endpoint("/ip4/127.0.0.1/udp/5001"),
            Err(ShellError::Multiaddr(_))
        ));
    }

    #[test]
    fn test_empty_address_rejected() {
        assert!(resolve_endpoint("  ").is_err());
    }
}
