//! Typed results and option sets of the daemon's commands.
//!
//! Output types mirror the daemon's JSON field names through `serde` renames,
//! so they decode straight from a [`Response`](crate::client::Response).
//! Option sets are plain structs with [`Default`] values matching the
//! daemon's own defaults.
//!
//! # Examples
//!
//! ```
//! use ipfs_shell::types::{AddOptions, LsLink};
//!
//! let opts = AddOptions { pin: false, ..Default::default() };
//! assert!(!opts.pin);
//!
//! let link: LsLink = serde_json::from_str(r#"{"Hash":"Qm1","Name":"a","Size":3,"Type":2}"#).unwrap();
//! assert_eq!(link.name, "a");
//! ```

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// A `{"Hash": ...}` object, returned by `add` and friends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// Content identifier of the object.
    #[serde(rename = "Hash")]
    pub hash: String,
    /// Name relative to the upload root; empty for single files.
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Output of `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdOutput {
    /// Peer identifier.
    #[serde(rename = "ID")]
    pub id: String,
    /// Encoded public key.
    #[serde(default)]
    pub public_key: String,
    /// Listen addresses.
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    /// Agent version string.
    #[serde(default)]
    pub agent_version: String,
    /// Protocol version string.
    #[serde(default)]
    pub protocol_version: String,
}

/// Output of `version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    /// Daemon version.
    pub version: String,
    /// Commit hash the daemon was built from.
    #[serde(default)]
    pub commit: String,
}

/// One link of a directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsLink {
    /// Content identifier of the linked object.
    pub hash: String,
    /// Link name.
    pub name: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Object kind as reported by the daemon (1 = directory, 2 = file).
    #[serde(rename = "Type", default)]
    pub kind: i32,
}

/// One listed object with its links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsObject {
    /// Path or hash that was listed.
    #[serde(default)]
    pub hash: String,
    /// Links of the object.
    #[serde(default)]
    pub links: Vec<LsLink>,
}

/// Output envelope of `ls`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LsOutput {
    #[serde(default)]
    pub objects: Vec<LsObject>,
}

/// A peer and the addresses it is reachable on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer identifier.
    #[serde(rename = "ID")]
    pub id: String,
    /// Known addresses.
    #[serde(rename = "Addrs", default)]
    pub addrs: Vec<String>,
}

/// A connected swarm peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwarmPeer {
    /// Address of the connection.
    pub addr: String,
    /// Peer identifier.
    pub peer: String,
    /// Measured latency, when requested.
    #[serde(default)]
    pub latency: String,
}

/// A keypair held by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Key identifier.
    #[serde(rename = "Id")]
    pub id: String,
    /// Local key name.
    #[serde(rename = "Name")]
    pub name: String,
}

/// Output of `block/stat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockStat {
    /// Block key.
    pub key: String,
    /// Block size in bytes.
    pub size: u64,
}

/// A pinned object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinInfo {
    /// Pin kind: `recursive`, `direct` or `indirect`.
    #[serde(rename = "Type")]
    pub kind: String,
}

/// Output of `dag/put`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagPutOutput {
    /// Link to the stored node.
    #[serde(rename = "Cid")]
    pub cid: CidLink,
}

/// A DAG-JSON link: `{"/": "<cid>"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidLink {
    /// The linked content identifier.
    #[serde(rename = "/")]
    pub target: String,
}

/// One line of `dag/import` output: a root, or the trailing statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagImportRoot {
    /// Imported root, absent on the statistics line.
    #[serde(rename = "Root", default, skip_serializing_if = "Option::is_none")]
    pub root: Option<DagImportRootCid>,
    /// Import statistics, present only on the last line when requested.
    #[serde(rename = "Stats", default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DagImportStats>,
}

/// The root link of a `dag/import` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagImportRootCid {
    /// Root content identifier.
    #[serde(rename = "Cid")]
    pub cid: CidLink,
    /// Pin error for this root, if pinning failed.
    #[serde(rename = "PinErrorMsg", default, skip_serializing_if = "String::is_empty")]
    pub pin_error: String,
}

/// Statistics reported by `dag/import`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DagImportStats {
    /// Total bytes of imported blocks.
    pub block_bytes_count: u64,
    /// Number of imported blocks.
    pub block_count: u64,
}

/// Aggregated result of `dag/import`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DagImportOutput {
    /// Every root, in the order the daemon reported them.
    pub roots: Vec<DagImportRootCid>,
    /// Statistics, when requested.
    pub stats: Option<DagImportStats>,
}

/// Output of `dag/stat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DagStatOutput {
    /// Blocks counted once across all roots.
    #[serde(default)]
    pub unique_blocks: u64,
    /// Bytes of all unique blocks.
    #[serde(default)]
    pub total_size: u64,
    /// Bytes saved by blocks shared between roots.
    #[serde(default)]
    pub shared_size: u64,
    /// Deduplication ratio.
    #[serde(default)]
    pub ratio: f32,
    /// Per-root statistics.
    #[serde(default)]
    pub dag_stats: Option<Vec<DagStat>>,
}

/// Statistics of one DAG root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DagStat {
    /// Root content identifier.
    #[serde(deserialize_with = "cid_text")]
    pub cid: String,
    /// Bytes under the root.
    #[serde(default)]
    pub size: u64,
    /// Blocks under the root.
    #[serde(default)]
    pub num_blocks: i64,
}

/// A CID given either as text or as a `{"/": ...}` link.
fn cid_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Link(CidLink),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(cid) => cid,
        Repr::Link(link) => link.target,
    })
}

/// One line of `refs` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefOutput {
    /// Referenced content identifier.
    #[serde(rename = "Ref")]
    pub reference: String,
    /// Per-reference error, empty on success.
    #[serde(default)]
    pub err: String,
}

/// Output of `name/publish`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Name that was published.
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    /// Value the name now points at.
    #[serde(rename = "Value", alias = "value")]
    pub value: String,
}

/// A `{"Path": ...}` object, returned by resolution commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PathOutput {
    #[serde(rename = "Path")]
    pub path: String,
}

/// One entry of `files/ls`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MfsEntry {
    /// Entry name.
    pub name: String,
    /// Entry kind (0 = file, 1 = directory).
    #[serde(rename = "Type", default)]
    pub kind: u8,
    /// Size in bytes, when long listing was requested.
    #[serde(default)]
    pub size: u64,
    /// Content identifier, when long listing was requested.
    #[serde(default)]
    pub hash: String,
}

/// Output of `files/stat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MfsStat {
    /// Content identifier.
    pub hash: String,
    /// Size of the file contents.
    #[serde(default)]
    pub size: u64,
    /// Size including all linked blocks.
    #[serde(default)]
    pub cumulative_size: u64,
    /// Number of child blocks.
    #[serde(default)]
    pub blocks: u64,
    /// `file` or `directory`.
    #[serde(rename = "Type", default)]
    pub kind: String,
    /// Locality was computed (`with-local`).
    #[serde(default)]
    pub with_locality: bool,
    /// Every block is held locally.
    #[serde(default)]
    pub local: bool,
    /// Bytes held locally.
    #[serde(default)]
    pub size_local: u64,
}

/// One message received on a pubsub topic, with payload already decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubSubRecord {
    /// Peer that published the message.
    pub from: String,
    /// Message payload.
    pub data: Bytes,
    /// Publisher sequence number.
    pub seqno: Bytes,
    /// Topics the message was published to.
    pub topic_ids: Vec<String>,
}

/// Options of `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOptions {
    /// Pin the added content.
    pub pin: bool,
    /// Use raw blocks for leaf nodes.
    pub raw_leaves: bool,
    /// Compute the hash without storing the data.
    pub only_hash: bool,
    /// Report progress events while adding.
    pub progress: bool,
    /// Hash function name, daemon default when `None`.
    pub hash: Option<String>,
    /// CID version, daemon default when `None`.
    pub cid_version: Option<u32>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            pin: true,
            raw_leaves: false,
            only_hash: false,
            progress: false,
            hash: None,
            cid_version: None,
        }
    }
}

/// Options of `dag/put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagPutOptions {
    /// Codec of the submitted bytes.
    pub input_codec: String,
    /// Codec the node is stored as.
    pub store_codec: String,
    /// Pin the stored node.
    pub pin: bool,
    /// Hash function name.
    pub hash: String,
}

impl Default for DagPutOptions {
    fn default() -> Self {
        Self {
            input_codec: "dag-json".to_string(),
            store_codec: "dag-cbor".to_string(),
            pin: false,
            hash: "sha2-256".to_string(),
        }
    }
}

/// Options of `dag/stat`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DagStatOptions {
    /// Report intermediate totals while the DAG is walked.
    pub progress: bool,
}

/// Options of `dag/import`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagImportOptions {
    /// Pin the roots listed in the archive header.
    pub pin_roots: bool,
    /// Produce no output.
    pub silent: bool,
    /// Report import statistics.
    pub stats: bool,
    /// Accept blocks above the daemon's size limit.
    pub allow_big_block: bool,
}

impl Default for DagImportOptions {
    fn default() -> Self {
        Self {
            pin_roots: true,
            silent: false,
            stats: false,
            allow_big_block: false,
        }
    }
}

/// Options of `name/publish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePublishOptions {
    /// Key to publish under.
    pub key: String,
    /// How long the record stays valid.
    pub lifetime: Duration,
    /// Cache hint for resolvers, daemon default when `None`.
    pub ttl: Option<Duration>,
    /// Check that the path resolves before publishing.
    pub resolve: bool,
}

impl Default for NamePublishOptions {
    fn default() -> Self {
        Self {
            key: "self".to_string(),
            lifetime: Duration::from_secs(24 * 60 * 60),
            ttl: None,
            resolve: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_output_decodes_daemon_names() {
        let id: IdOutput = serde_json::from_str(
            r#"{"ID":"12D3Koo","PublicKey":"CAES","Addresses":["/ip4/1.2.3.4/tcp/4001"],"AgentVersion":"kubo/0.30","ProtocolVersion":"ipfs/0.1.0"}"#,
        )
        .unwrap();
        assert_eq!(id.id, "12D3Koo");
        assert_eq!(id.addresses.unwrap().len(), 1);
        assert_eq!(id.agent_version, "kubo/0.30");
    }

    #[test]
    fn test_dag_put_output() {
        let out: DagPutOutput = serde_json::from_str(r#"{"Cid":{"/":"bafyrei"}}"#).unwrap();
        assert_eq!(out.cid.target, "bafyrei");
    }

    #[test]
    fn test_dag_import_lines() {
        let root: DagImportRoot =
            serde_json::from_str(r#"{"Root":{"Cid":{"/":"bafy1"},"PinErrorMsg":""}}"#).unwrap();
        assert_eq!(root.root.unwrap().cid.target, "bafy1");

        let stats: DagImportRoot =
            serde_json::from_str(r#"{"Stats":{"BlockCount":3,"BlockBytesCount":120}}"#).unwrap();
        assert!(stats.root.is_none());
        assert_eq!(stats.stats.unwrap().block_count, 3);
    }

    #[test]
    fn test_dag_stat_accepts_text_and_link_cids() {
        let out: DagStatOutput = serde_json::from_str(
            r#"{"UniqueBlocks":3,"TotalSize":300,"SharedSize":100,"Ratio":1.5,"DagStats":[{"Cid":"bafyA","Size":200,"NumBlocks":2},{"Cid":{"/":"bafyB"},"Size":200,"NumBlocks":2}]}"#,
        )
        .unwrap();
        let stats = out.dag_stats.unwrap();
        assert_eq!(stats[0].cid, "bafyA");
        assert_eq!(stats[1].cid, "bafyB");
        assert_eq!(out.shared_size, 100);
        assert!((out.ratio - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mfs_stat_locality_is_optional() {
        let plain: MfsStat = serde_json::from_str(
            r#"{"Hash":"Qm","Size":4,"CumulativeSize":62,"Blocks":1,"Type":"file"}"#,
        )
        .unwrap();
        assert!(!plain.with_locality);

        let local: MfsStat = serde_json::from_str(
            r#"{"Hash":"Qm","Size":4,"CumulativeSize":62,"Blocks":1,"Type":"file","WithLocality":true,"Local":true,"SizeLocal":62}"#,
        )
        .unwrap();
        assert!(local.local);
        assert_eq!(local.size_local, 62);
    }

    #[test]
    fn test_publish_response_accepts_both_cases() {
        let upper: PublishResponse = serde_json::from_str(r#"{"Name":"k51","Value":"/ipfs/Qm"}"#).unwrap();
        let lower: PublishResponse = serde_json::from_str(r#"{"name":"k51","value":"/ipfs/Qm"}"#).unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_default_options() {
        assert!(AddOptions::default().pin);
        assert_eq!(DagPutOptions::default().store_codec, "dag-cbor");
        assert!(DagImportOptions::default().pin_roots);
        assert_eq!(NamePublishOptions::default().key, "self");
    }
}
