//! Raw blocks.

use bytes::Bytes;

use crate::client::Shell;
use crate::error::Result;
use crate::types::BlockStat;

impl Shell {
    /// Key and size of the block at `path`.
    pub async fn block_stat(&self, path: &str) -> Result<BlockStat> {
        self.request("block/stat").arg(path).exec().await
    }

    /// Raw contents of the block at `path`.
    pub async fn block_get(&self, path: &str) -> Result<Bytes> {
        self.request("block/get").arg(path).send().await?.bytes().await
    }

    /// Store `block` and return its key.
    pub async fn block_put(&self, block: impl Into<Bytes>) -> Result<String> {
        let out: BlockStat = self.request("block/put").bytes_body(block).exec().await?;
        Ok(out.key)
    }
}
