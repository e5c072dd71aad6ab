//! IPLD DAG nodes.
//!
//! `dag/put` takes a single option set; older positional call shapes are not
//! offered.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{RequestBuilder, Shell};
use crate::error::{Result, ShellError};
use crate::types::{
    DagImportOptions, DagImportOutput, DagImportRoot, DagPutOptions, DagPutOutput,
    DagStatOptions, DagStatOutput,
};

impl Shell {
    /// Fetch the node at `path` and decode it into `T`.
    pub async fn dag_get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request("dag/get").arg(path).exec().await
    }

    /// Store `data`, encoded as `options.input_codec`, and return its CID.
    pub async fn dag_put_with_opts(
        &self,
        data: impl Into<Bytes>,
        options: &DagPutOptions,
    ) -> Result<String> {
        let out: DagPutOutput = put_request(self, options).bytes_body(data).exec().await?;
        Ok(out.cid.target)
    }

    /// Store `value` serialised as JSON and return its CID.
    pub async fn dag_put_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        options: &DagPutOptions,
    ) -> Result<String> {
        let out: DagPutOutput = put_request(self, options).json_body(value).exec().await?;
        Ok(out.cid.target)
    }

    /// Import a CAR archive.
    ///
    /// Roots are collected in the order the daemon reports them. With
    /// `silent` set the daemon reports nothing and the output is empty.
    pub async fn dag_import(
        &self,
        car: impl Into<Bytes>,
        options: &DagImportOptions,
    ) -> Result<DagImportOutput> {
        let response = self
            .request("dag/import")
            .option("pin-roots", options.pin_roots)
            .option("silent", options.silent)
            .option("stats", options.stats)
            .option("allow-big-block", options.allow_big_block)
            .bytes_body(car)
            .send()
            .await?;

        let mut out = DagImportOutput::default();
        if options.silent {
            response.close().await?;
            return Ok(out);
        }

        let mut lines = response.into_json_stream::<DagImportRoot>();
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(stats) = line.stats {
                out.stats = Some(stats);
            }
            if let Some(root) = line.root {
                out.roots.push(root);
            }
        }
        Ok(out)
    }

    /// Size and block counts of the DAG under `root`.
    pub async fn dag_stat(&self, root: &str) -> Result<DagStatOutput> {
        self.dag_stat_with_opts(root, &DagStatOptions::default()).await
    }

    /// Like [`dag_stat`](Shell::dag_stat), with explicit options.
    ///
    /// With `progress` set the daemon sends running totals before the final
    /// value; only the last one is returned.
    pub async fn dag_stat_with_opts(
        &self,
        root: &str,
        options: &DagStatOptions,
    ) -> Result<DagStatOutput> {
        let mut lines = self
            .request("dag/stat")
            .arg(root)
            .option("progress", options.progress)
            .send()
            .await?
            .into_json_stream::<DagStatOutput>();
        let mut last = None;
        while let Some(line) = lines.next().await {
            last = Some(line?);
        }
        last.ok_or(ShellError::EmptyResponse)
    }
}

fn put_request(shell: &Shell, options: &DagPutOptions) -> RequestBuilder {
    shell
        .request("dag/put")
        .option("input-codec", options.input_codec.as_str())
        .option("store-codec", options.store_codec.as_str())
        .option("pin", options.pin)
        .option("hash", options.hash.as_str())
}
