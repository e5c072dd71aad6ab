//! The mutable file system (MFS).
//!
//! Commands that take a directory (`files/ls`, `files/flush`,
//! `files/chcid`) treat an empty path as the MFS root.

use bytes::Bytes;
use serde::Deserialize;

use crate::client::{ByteStream, Shell};
use crate::error::Result;
use crate::types::{MfsEntry, MfsStat};

#[derive(Debug, Default, Deserialize)]
struct FilesLsOutput {
    #[serde(rename = "Entries", default)]
    entries: Option<Vec<MfsEntry>>,
}

#[derive(Debug, Default, Deserialize)]
struct FilesFlushOutput {
    #[serde(rename = "Cid", default)]
    cid: String,
}

/// Options of `files/ls`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesLsOptions {
    /// Include sizes and hashes.
    pub long: bool,
    /// Keep the directory's own order instead of sorting by name.
    pub unsorted: bool,
}

/// Options of `files/mkdir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesMkdirOptions {
    /// Create missing parent directories.
    pub parents: bool,
    /// CID version of the new directory.
    pub cid_version: Option<u32>,
    /// Hash function name.
    pub hash: Option<String>,
}

/// Options of `files/write`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesWriteOptions {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Truncate the file before writing.
    pub truncate: bool,
    /// Create missing parent directories.
    pub parents: bool,
    /// Byte offset to start writing at.
    pub offset: Option<u64>,
    /// Write at most this many bytes of `data`.
    pub count: Option<u64>,
    /// Use raw blocks for new leaf nodes.
    pub raw_leaves: Option<bool>,
    /// CID version of new nodes.
    pub cid_version: Option<u32>,
    /// Hash function name.
    pub hash: Option<String>,
}

/// Options of `files/read`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesReadOptions {
    /// Byte offset to start reading at.
    pub offset: Option<u64>,
    /// Read at most this many bytes.
    pub count: Option<u64>,
}

/// Options of `files/stat`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesStatOptions {
    /// Ask only for the hash.
    pub hash: bool,
    /// Ask only for the size.
    pub size: bool,
    /// Compute how much of the DAG is held locally.
    pub with_local: bool,
}

/// Options of `files/chcid`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesChcidOptions {
    /// CID version to switch to.
    pub cid_version: Option<u32>,
    /// Hash function to switch to.
    pub hash: Option<String>,
}

fn dir_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

impl Shell {
    /// List the directory at `path`.
    pub async fn files_ls(&self, path: &str, options: &FilesLsOptions) -> Result<Vec<MfsEntry>> {
        let out: FilesLsOutput = self
            .request("files/ls")
            .arg(dir_path(path))
            .option("long", options.long)
            .option("U", options.unsorted)
            .exec()
            .await?;
        Ok(out.entries.unwrap_or_default())
    }

    /// Create a directory.
    pub async fn files_mkdir(&self, path: &str, options: &FilesMkdirOptions) -> Result<()> {
        self.request("files/mkdir")
            .arg(path)
            .option("parents", options.parents)
            .option_opt("cid-version", options.cid_version)
            .option_opt("hash", options.hash.as_deref())
            .exec_discard()
            .await
    }

    /// Write `data` to the file at `path`.
    pub async fn files_write(
        &self,
        path: &str,
        data: impl Into<Bytes>,
        options: &FilesWriteOptions,
    ) -> Result<()> {
        self.request("files/write")
            .arg(path)
            .option("create", options.create)
            .option("truncate", options.truncate)
            .option("parents", options.parents)
            .option_opt("offset", options.offset)
            .option_opt("count", options.count)
            .option_opt("raw-leaves", options.raw_leaves)
            .option_opt("cid-version", options.cid_version)
            .option_opt("hash", options.hash.as_deref())
            .bytes_body(data)
            .exec_discard()
            .await
    }

    /// Stream the contents of the file at `path`.
    pub async fn files_read(&self, path: &str, options: &FilesReadOptions) -> Result<ByteStream> {
        let response = self
            .request("files/read")
            .arg(path)
            .option_opt("offset", options.offset)
            .option_opt("count", options.count)
            .send()
            .await?;
        Ok(response.into_byte_stream())
    }

    /// Remove `path`, recursively; `force` removes even when in use.
    pub async fn files_rm(&self, path: &str, force: bool) -> Result<()> {
        self.request("files/rm")
            .arg(path)
            .option("recursive", true)
            .option("force", force)
            .exec_discard()
            .await
    }

    /// Status of the file or directory at `path`.
    pub async fn files_stat(&self, path: &str, options: &FilesStatOptions) -> Result<MfsStat> {
        self.request("files/stat")
            .arg(path)
            .option("hash", options.hash)
            .option("size", options.size)
            .option("with-local", options.with_local)
            .exec()
            .await
    }

    /// Copy `src` (an MFS or `/ipfs/` path) to `dest`.
    pub async fn files_cp(&self, src: &str, dest: &str) -> Result<()> {
        self.request("files/cp").args([src, dest]).exec_discard().await
    }

    /// Move `src` to `dest`.
    pub async fn files_mv(&self, src: &str, dest: &str) -> Result<()> {
        self.request("files/mv").args([src, dest]).exec_discard().await
    }

    /// Flush `path` to the blockstore and return its CID.
    pub async fn files_flush(&self, path: &str) -> Result<String> {
        let out: FilesFlushOutput = self.request("files/flush").arg(dir_path(path)).exec().await?;
        Ok(out.cid)
    }

    /// Change the CID version or hash function of the directory at `path`.
    pub async fn files_chcid(&self, path: &str, options: &FilesChcidOptions) -> Result<()> {
        self.request("files/chcid")
            .arg(dir_path(path))
            .option_opt("cid-version", options.cid_version)
            .option_opt("hash", options.hash.as_deref())
            .exec_discard()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dir_path_is_root() {
        assert_eq!(dir_path(""), "/");
        assert_eq!(dir_path("/docs"), "/docs");
    }
}
