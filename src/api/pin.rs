//! Pinning.

use serde::Deserialize;
use std::collections::HashMap;

use crate::client::Shell;
use crate::error::Result;
use crate::types::PinInfo;

#[derive(Debug, Default, Deserialize)]
struct PinLsOutput {
    #[serde(rename = "Keys", default)]
    keys: HashMap<String, PinInfo>,
}

impl Shell {
    /// Pin the object at `path` recursively.
    pub async fn pin(&self, path: &str) -> Result<()> {
        self.request("pin/add")
            .arg(path)
            .option("recursive", true)
            .exec_discard()
            .await
    }

    /// Remove a recursive pin from the object at `path`.
    pub async fn unpin(&self, path: &str) -> Result<()> {
        self.request("pin/rm")
            .arg(path)
            .option("recursive", true)
            .exec_discard()
            .await
    }

    /// List pinned objects and their pin kind.
    pub async fn pin_ls(&self) -> Result<HashMap<String, PinInfo>> {
        let out: PinLsOutput = self.request("pin/ls").exec().await?;
        Ok(out.keys)
    }
}
