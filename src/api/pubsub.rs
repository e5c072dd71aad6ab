//! Publish/subscribe messaging.
//!
//! The payload representation follows
//! [`ShellConfig::pubsub_format`](crate::client::ShellConfig::pubsub_format):
//! base64 daemons take the payload as a text argument, byte-array daemons
//! take it as an uploaded file part.

use bytes::Bytes;

use crate::api::StringList;
use crate::client::{DirectSubscription, PubSubWireFormat, Shell, SubscriptionManager};
use crate::error::{Result, ShellError};

impl Shell {
    /// Publish `data` on `topic`.
    pub async fn pubsub_publish(&self, topic: &str, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        let request = self.request("pubsub/pub").arg(topic);
        let request = match self.pubsub_format() {
            PubSubWireFormat::Base64 => match String::from_utf8(data.to_vec()) {
                Ok(text) => request.arg(text),
                Err(_) => request.fail(ShellError::InvalidRequest(
                    "payload must be UTF-8 text for this daemon".to_string(),
                )),
            },
            PubSubWireFormat::ByteArray => request.bytes_body(data),
        };
        request.exec_discard().await
    }

    /// Subscribe to `topic` with a stream of its own.
    pub async fn pubsub_subscribe(&self, topic: &str) -> Result<DirectSubscription> {
        DirectSubscription::open(self, topic).await
    }

    /// Manager sharing one stream per topic among many subscribers.
    pub fn subscription_manager(&self) -> SubscriptionManager {
        SubscriptionManager::new(self.clone())
    }

    /// Topics the node is subscribed to.
    pub async fn pubsub_topics(&self) -> Result<Vec<String>> {
        let out: StringList = self.request("pubsub/ls").exec().await?;
        Ok(out.into_vec())
    }

    /// Peers the node exchanges messages with, optionally for one topic.
    pub async fn pubsub_peers(&self, topic: Option<&str>) -> Result<Vec<String>> {
        let mut request = self.request("pubsub/peers");
        if let Some(topic) = topic {
            request = request.arg(topic);
        }
        let out: StringList = request.exec().await?;
        Ok(out.into_vec())
    }
}
