//! Mutable names.

use crate::client::Shell;
use crate::error::{Result, ShellError};
use crate::types::{NamePublishOptions, PathOutput, PublishResponse};

impl Shell {
    /// Point a name at `path`.
    pub async fn name_publish(
        &self,
        path: &str,
        options: &NamePublishOptions,
    ) -> Result<PublishResponse> {
        if path.is_empty() {
            return Err(ShellError::InvalidRequest("empty path to publish".to_string()));
        }
        self.request("name/publish")
            .arg(path)
            .option("key", options.key.as_str())
            .option("lifetime", options.lifetime)
            .option_opt("ttl", options.ttl)
            .option("resolve", options.resolve)
            .exec()
            .await
    }

    /// Resolve `name` to the path it points at; an empty name resolves the
    /// node's own name.
    pub async fn name_resolve(&self, name: &str) -> Result<String> {
        let mut request = self.request("name/resolve");
        if !name.is_empty() {
            request = request.arg(name);
        }
        let out: PathOutput = request.exec().await?;
        Ok(out.path)
    }
}
