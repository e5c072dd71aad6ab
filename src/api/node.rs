//! Node identity, keys and peers.

use serde::Deserialize;

use crate::client::Shell;
use crate::error::{Result, ShellError};
use crate::types::{IdOutput, Key, PeerInfo, SwarmPeer, VersionInfo};

#[derive(Debug, Default, Deserialize)]
struct KeyListOutput {
    #[serde(rename = "Keys", default)]
    keys: Option<Vec<Key>>,
}

#[derive(Debug, Default, Deserialize)]
struct FindPeerEvent {
    #[serde(rename = "Responses", default)]
    responses: Option<Vec<PeerInfo>>,
}

#[derive(Debug, Default, Deserialize)]
struct SwarmPeersOutput {
    #[serde(rename = "Peers", default)]
    peers: Option<Vec<SwarmPeer>>,
}

#[derive(Debug, Default, Deserialize)]
struct BootstrapOutput {
    #[serde(rename = "Peers", default)]
    peers: Option<Vec<String>>,
}

impl Shell {
    /// Identity of this node, or of `peer` when given.
    pub async fn id(&self, peer: Option<&str>) -> Result<IdOutput> {
        let mut request = self.request("id");
        if let Some(peer) = peer {
            request = request.arg(peer);
        }
        request.exec().await
    }

    /// Daemon version and commit.
    pub async fn version(&self) -> Result<VersionInfo> {
        self.request("version").exec().await
    }

    /// True when the daemon answers a version query.
    pub async fn is_up(&self) -> bool {
        self.version().await.is_ok()
    }

    /// Keypairs held by the daemon.
    pub async fn key_list(&self) -> Result<Vec<Key>> {
        let out: KeyListOutput = self.request("key/list").exec().await?;
        Ok(out.keys.unwrap_or_default())
    }

    /// Look up the addresses of `peer`.
    pub async fn find_peer(&self, peer: &str) -> Result<PeerInfo> {
        let mut events = self
            .request("dht/findpeer")
            .arg(peer)
            .send()
            .await?
            .into_json_stream::<FindPeerEvent>();
        while let Some(event) = events.next().await {
            if let Some(found) = event?.responses.and_then(|r| r.into_iter().next()) {
                return Ok(found);
            }
        }
        Err(ShellError::EmptyResponse)
    }

    /// Peers currently connected to the node.
    pub async fn swarm_peers(&self) -> Result<Vec<SwarmPeer>> {
        let out: SwarmPeersOutput = self.request("swarm/peers").exec().await?;
        Ok(out.peers.unwrap_or_default())
    }

    /// Add peers to the bootstrap list; returns the peers that were added.
    pub async fn bootstrap_add(&self, peers: &[&str]) -> Result<Vec<String>> {
        let out: BootstrapOutput = self
            .request("bootstrap/add")
            .args(peers.iter().copied())
            .exec()
            .await?;
        Ok(out.peers.unwrap_or_default())
    }

    /// Restore the daemon's built-in bootstrap peers; returns the peers added.
    pub async fn bootstrap_add_default(&self) -> Result<Vec<String>> {
        let out: BootstrapOutput = self.request("bootstrap/add/default").exec().await?;
        Ok(out.peers.unwrap_or_default())
    }

    /// Empty the bootstrap list; returns the peers that were removed.
    pub async fn bootstrap_rm_all(&self) -> Result<Vec<String>> {
        let out: BootstrapOutput = self.request("bootstrap/rm/all").exec().await?;
        Ok(out.peers.unwrap_or_default())
    }
}
