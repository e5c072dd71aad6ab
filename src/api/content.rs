//! Adding, reading and listing content.

use bytes::Bytes;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncRead;

use crate::client::{ByteStream, Entry, JsonStream, RequestBuilder, Shell};
use crate::error::{Result, ShellError};
use crate::types::{AddOptions, LsLink, LsOutput, PathOutput, RefOutput};

/// One line of `add` output: a finished object or a progress event.
#[derive(Debug, Deserialize)]
struct AddEvent {
    #[serde(rename = "Hash", default)]
    hash: Option<String>,
}

impl Shell {
    /// Add `data` as a file, pinned, and return its hash.
    pub async fn add(&self, data: impl Into<Bytes>) -> Result<String> {
        self.add_with_options(data, &AddOptions::default()).await
    }

    /// Add `data` as a file with explicit options.
    pub async fn add_with_options(
        &self,
        data: impl Into<Bytes>,
        options: &AddOptions,
    ) -> Result<String> {
        last_hash(add_request(self, options).bytes_body(data)).await
    }

    /// Add the contents of `reader` as a file.
    pub async fn add_reader<R>(&self, reader: R, options: &AddOptions) -> Result<String>
    where
        R: AsyncRead + Send + 'static,
    {
        last_hash(add_request(self, options).entries(vec![Entry::reader("", reader)])).await
    }

    /// Add a directory tree recursively and return the root hash.
    ///
    /// Symlinks inside the tree are added as links, not followed. Files and
    /// directories whose names start with `.` are left out.
    pub async fn add_dir(&self, dir: impl AsRef<Path>) -> Result<String> {
        let entry = Entry::from_path(dir, true, false).await?;
        let request = add_request(self, &AddOptions::default())
            .option("recursive", true)
            .entries(vec![entry]);
        last_hash(request).await
    }

    /// Add a symlink pointing at `target` and return its hash.
    pub async fn add_link(&self, target: &str) -> Result<String> {
        last_hash(
            add_request(self, &AddOptions::default()).entries(vec![Entry::symlink("", target)]),
        )
        .await
    }

    /// Stream the contents of the file at `path`.
    pub async fn cat(&self, path: &str) -> Result<ByteStream> {
        Ok(self.request("cat").arg(path).send().await?.into_byte_stream())
    }

    /// Stream `path` as a tar archive.
    pub async fn get(&self, path: &str) -> Result<ByteStream> {
        Ok(self.request("get").arg(path).send().await?.into_byte_stream())
    }

    /// List the links of the object at `path`.
    pub async fn list(&self, path: &str) -> Result<Vec<LsLink>> {
        let out: LsOutput = self.request("ls").arg(path).exec().await?;
        let mut objects = out.objects.into_iter();
        match (objects.next(), objects.next()) {
            (Some(object), None) => Ok(object.links),
            _ => Err(ShellError::decode("expected exactly one object in ls output")),
        }
    }

    /// Stream the references of `hash`.
    pub async fn refs(&self, hash: &str, recursive: bool) -> Result<JsonStream<RefOutput>> {
        let response = self
            .request("refs")
            .arg(hash)
            .option("recursive", recursive)
            .send()
            .await?;
        Ok(response.into_json_stream())
    }

    /// Remove the object `hash`; true when the daemon reports it removed.
    pub async fn remove(&self, hash: &str) -> Result<bool> {
        let out: String = self.request("rm").arg(hash).exec().await?;
        Ok(out.contains("Removed"))
    }

    /// Resolve `path` to an immutable `/ipfs/...` path.
    pub async fn resolve_path(&self, path: &str) -> Result<String> {
        let out: PathOutput = self.request("resolve").arg(path).exec().await?;
        Ok(out.path)
    }
}

fn add_request(shell: &Shell, options: &AddOptions) -> RequestBuilder {
    shell
        .request("add")
        .option("pin", options.pin)
        .option("raw-leaves", options.raw_leaves)
        .option("only-hash", options.only_hash)
        .option("progress", options.progress)
        .option_opt("hash", options.hash.as_deref())
        .option_opt("cid-version", options.cid_version)
}

/// Send an `add` request and keep the hash of its last reported object.
async fn last_hash(request: RequestBuilder) -> Result<String> {
    let mut events = request.send().await?.into_json_stream::<AddEvent>();
    let mut last = None;
    while let Some(event) = events.next().await {
        if let Some(hash) = event?.hash.filter(|h| !h.is_empty()) {
            last = Some(hash);
        }
    }
    last.ok_or(ShellError::EmptyResponse)
}
