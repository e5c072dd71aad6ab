//! Pubsub subscriptions.
//!
//! Two ways to listen on a topic:
//!
//! - **Managed** ([`SubscriptionManager`]): one HTTP stream per topic, fanned
//!   out to any number of [`Subscription`] handles. Late subscribers join the
//!   running stream; dropping the last handle tears it down.
//! - **Direct** ([`DirectSubscription`]): one HTTP stream owned by a single
//!   reader, closed by [`cancel`](DirectSubscription::cancel).
//!
//! # Topic Lifecycle
//!
//! ```text
//! absent ──subscribe──▶ connecting ──▶ active ──last drop──▶ absent
//!                                        │
//!                                  stream error / EOF
//!                                        ▼
//!                                     failed ──▶ absent
//! ```
//!
//! Each active topic runs one spawned task that owns the subscriber set.
//! Handles join and leave by sending it commands; the manager's mutex only
//! guards the topic-name map and is never held across I/O.
//!
//! Delivery awaits every subscriber in turn, so a subscriber that stops
//! reading holds back the whole topic once its buffer is full. Nothing is
//! dropped to keep others going.
//!
//! # Examples
//!
//! ```no_run
//! use ipfs_shell::client::{Shell, SubscriptionManager};
//!
//! # async fn run() -> ipfs_shell::Result<()> {
//! let shell = Shell::local()?;
//! let manager = SubscriptionManager::new(shell);
//!
//! let mut sub = manager.subscribe("news").await?;
//! while let Some(record) = sub.next().await {
//!     let record = record?;
//!     println!("{} sent {} bytes", record.from, record.data.len());
//! }
//! # Ok(())
//! # }
//! ```

use base64::Engine;
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

use crate::client::config::PubSubWireFormat;
use crate::client::response::JsonStream;
use crate::client::shell::Shell;
use crate::error::{Result, ShellError};
use crate::types::PubSubRecord;

/// A pubsub message as it appears on the wire, payload still encoded.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireRecord {
    #[serde(default)]
    from: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    seqno: Value,
    #[serde(rename = "topicIDs", alias = "topics", default)]
    topic_ids: Vec<String>,
}

impl WireRecord {
    /// Decode payload fields according to the daemon's wire format.
    pub(crate) fn decode(self, format: PubSubWireFormat) -> Result<PubSubRecord> {
        Ok(PubSubRecord {
            data: decode_field("data", self.data, format)?,
            seqno: decode_field("seqno", self.seqno, format)?,
            from: self.from,
            topic_ids: self.topic_ids,
        })
    }
}

fn decode_field(field: &str, value: Value, format: PubSubWireFormat) -> Result<Bytes> {
    match (format, value) {
        (_, Value::Null) => Ok(Bytes::new()),
        (PubSubWireFormat::Base64, Value::String(text)) => base64::engine::general_purpose::STANDARD
            .decode(text.as_bytes())
            .map(Bytes::from)
            .map_err(|e| ShellError::decode(format!("pubsub {field}: invalid base64: {e}"))),
        (PubSubWireFormat::ByteArray, Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| ShellError::decode(format!("pubsub {field}: {item} is not a byte")))
            })
            .collect::<Result<Vec<u8>>>()
            .map(Bytes::from),
        (format, other) => Err(ShellError::decode(format!(
            "pubsub {field}: expected {} but received {}",
            match format {
                PubSubWireFormat::Base64 => "a base64 string",
                PubSubWireFormat::ByteArray => "an array of bytes",
            },
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Open the daemon's stream for `topic`.
async fn open_topic(shell: &Shell, topic: &str) -> Result<JsonStream<WireRecord>> {
    let response = shell.request("pubsub/sub").arg(topic).send().await?;
    Ok(response.into_json_stream())
}

/// Messages from the handles into a topic's loop.
enum Command {
    Add {
        id: u64,
        sender: mpsc::Sender<PubSubRecord>,
        ack: oneshot::Sender<()>,
    },
    Drop(u64),
    Shutdown,
}

/// State shared between a topic's loop and its handles.
#[derive(Debug, Default)]
struct TopicShared {
    /// Set once, by the loop, when the topic fails.
    failure: OnceLock<Arc<ShellError>>,
}

struct TopicEntry {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<TopicShared>,
    /// Live handles on this topic.
    handles: usize,
    generation: u64,
}

type TopicMap = Arc<Mutex<HashMap<String, TopicEntry>>>;

/// Fans one HTTP stream per topic out to many subscribers.
///
/// Cloning the manager shares its topic map.
#[derive(Clone)]
pub struct SubscriptionManager {
    shell: Shell,
    topics: TopicMap,
    ids: Arc<AtomicU64>,
}

impl SubscriptionManager {
    /// Manager issuing its requests through `shell`.
    pub fn new(shell: Shell) -> Self {
        Self {
            shell,
            topics: Arc::new(Mutex::new(HashMap::new())),
            ids: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of topics with a live stream.
    pub fn active_topics(&self) -> usize {
        self.topics.lock().len()
    }

    /// Subscribe to `topic`.
    ///
    /// Joins the topic's stream if one is live, otherwise opens it. Once this
    /// returns, the handle receives every message the daemon delivers
    /// afterwards; earlier messages are never replayed.
    pub async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        loop {
            if let Some(pending) = self.join(topic) {
                return Ok(pending.register().await);
            }

            let stream = open_topic(&self.shell, topic).await?;

            let pending = {
                let mut topics = self.topics.lock();
                // Another caller may have opened the topic while we were connecting.
                if topics.contains_key(topic) {
                    drop(stream);
                    None
                } else {
                    let (commands, receiver) = mpsc::unbounded_channel();
                    let shared = Arc::new(TopicShared::default());
                    let generation = self.next_id();
                    topics.insert(
                        topic.to_string(),
                        TopicEntry {
                            commands,
                            shared: shared.clone(),
                            handles: 0,
                            generation,
                        },
                    );
                    tokio::spawn(run_topic(TopicLoop {
                        topic: topic.to_string(),
                        stream,
                        commands: receiver,
                        shared,
                        format: self.shell.pubsub_format(),
                        topics: self.topics.clone(),
                        generation,
                    }));
                    tracing::debug!(%topic, generation, "opened pubsub topic");
                    self.join_locked(&mut topics, topic)
                }
            };

            if let Some(pending) = pending {
                return Ok(pending.register().await);
            }
        }
    }

    fn join(&self, topic: &str) -> Option<PendingSubscription> {
        let mut topics = self.topics.lock();
        self.join_locked(&mut topics, topic)
    }

    fn join_locked(
        &self,
        topics: &mut HashMap<String, TopicEntry>,
        topic: &str,
    ) -> Option<PendingSubscription> {
        let entry = topics.get_mut(topic)?;
        entry.handles += 1;
        let id = self.next_id();
        let (sender, receiver) = mpsc::channel(self.shell.config().subscriber_buffer.max(1));
        Some(PendingSubscription {
            sender,
            subscription: Subscription {
                topic: topic.to_string(),
                id,
                receiver,
                shared: entry.shared.clone(),
                membership: Some(Membership {
                    topics: self.topics.clone(),
                    commands: entry.commands.clone(),
                    generation: entry.generation,
                }),
                done: false,
            },
        })
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }
}

/// A counted handle whose channel is not yet registered with the loop.
struct PendingSubscription {
    sender: mpsc::Sender<PubSubRecord>,
    subscription: Subscription,
}

impl PendingSubscription {
    /// Register with the topic loop and wait until it has taken the channel.
    ///
    /// If the loop already exited, the handle is returned anyway and reports
    /// the topic's failure on its first read.
    async fn register(self) -> Subscription {
        let (ack, acked) = oneshot::channel();
        if let Some(membership) = &self.subscription.membership {
            let _ = membership.commands.send(Command::Add {
                id: self.subscription.id,
                sender: self.sender,
                ack,
            });
        }
        let _ = acked.await;
        self.subscription
    }
}

/// A handle's link back to its topic entry.
struct Membership {
    topics: TopicMap,
    commands: mpsc::UnboundedSender<Command>,
    generation: u64,
}

/// One subscriber's view of a managed topic.
///
/// Yields each message once; after a failure yields the error once, then
/// ends. Dropping the handle unsubscribes.
pub struct Subscription {
    topic: String,
    id: u64,
    receiver: mpsc::Receiver<PubSubRecord>,
    shared: Arc<TopicShared>,
    membership: Option<Membership>,
    done: bool,
}

impl Subscription {
    /// Topic this handle listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next message.
    pub async fn next(&mut self) -> Option<Result<PubSubRecord>> {
        futures::StreamExt::next(self).await
    }

    /// Why the topic failed, once it has.
    pub fn failure(&self) -> Option<Arc<ShellError>> {
        self.shared.failure.get().cloned()
    }

    /// Unsubscribe. Same as dropping the handle.
    pub fn cancel(self) {
        drop(self);
    }

    fn finish(&mut self) -> Option<Result<PubSubRecord>> {
        if self.done {
            return None;
        }
        self.done = true;
        self.failure().map(|source| {
            Err(ShellError::Subscription {
                topic: self.topic.clone(),
                source,
            })
        })
    }
}

impl Stream for Subscription {
    type Item = Result<PubSubRecord>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(record)) => Poll::Ready(Some(Ok(record))),
            Poll::Ready(None) => Poll::Ready(self.finish()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(membership) = self.membership.take() else {
            return;
        };

        let last = {
            let mut topics = membership.topics.lock();
            match topics.get_mut(&self.topic) {
                Some(entry) if entry.generation == membership.generation => {
                    entry.handles = entry.handles.saturating_sub(1);
                    if entry.handles == 0 {
                        topics.remove(&self.topic);
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            }
        };

        let _ = membership.commands.send(Command::Drop(self.id));
        if last {
            tracing::debug!(topic = %self.topic, "last subscriber left");
            let _ = membership.commands.send(Command::Shutdown);
        }
    }
}

struct TopicLoop {
    topic: String,
    stream: JsonStream<WireRecord>,
    commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<TopicShared>,
    format: PubSubWireFormat,
    topics: TopicMap,
    generation: u64,
}

/// Body of a topic's task: read, decode and fan out until shut down or failed.
async fn run_topic(mut state: TopicLoop) {
    let mut readers: BTreeMap<u64, mpsc::Sender<PubSubRecord>> = BTreeMap::new();

    let failure = loop {
        tokio::select! {
            biased;

            command = state.commands.recv() => match command {
                Some(Command::Add { id, sender, ack }) => {
                    readers.insert(id, sender);
                    let _ = ack.send(());
                }
                Some(Command::Drop(id)) => {
                    readers.remove(&id);
                }
                Some(Command::Shutdown) | None => break None,
            },

            item = state.stream.next() => {
                let record = match item {
                    Some(Ok(wire)) => wire.decode(state.format),
                    Some(Err(err)) => Err(err),
                    None => Err(ShellError::StreamClosed),
                };
                match record {
                    Ok(record) => deliver(&mut readers, record).await,
                    Err(err) => break Some(err),
                }
            }
        }
    };

    match failure {
        Some(err) => {
            tracing::debug!(topic = %state.topic, error = %err, "pubsub topic failed");
            let _ = state.shared.failure.set(Arc::new(err));
            let mut topics = state.topics.lock();
            if topics
                .get(&state.topic)
                .is_some_and(|entry| entry.generation == state.generation)
            {
                topics.remove(&state.topic);
            }
        }
        None => tracing::debug!(topic = %state.topic, "pubsub topic closed"),
    }
    // Dropping the senders closes every subscriber channel.
    drop(readers);
}

async fn deliver(readers: &mut BTreeMap<u64, mpsc::Sender<PubSubRecord>>, record: PubSubRecord) {
    let mut gone = Vec::new();
    for (id, reader) in readers.iter() {
        if reader.send(record.clone()).await.is_err() {
            gone.push(*id);
        }
    }
    for id in gone {
        readers.remove(&id);
    }
}

/// A single-reader subscription owning its HTTP stream.
pub struct DirectSubscription {
    topic: String,
    stream: Option<JsonStream<WireRecord>>,
    format: PubSubWireFormat,
}

impl DirectSubscription {
    /// Open a stream for `topic`.
    pub async fn open(shell: &Shell, topic: &str) -> Result<Self> {
        Ok(Self {
            topic: topic.to_string(),
            stream: Some(open_topic(shell, topic).await?),
            format: shell.pubsub_format(),
        })
    }

    /// Topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next message; `None` once cancelled or after an error.
    pub async fn next(&mut self) -> Option<Result<PubSubRecord>> {
        let stream = self.stream.as_mut()?;
        let result = match stream.next().await {
            Some(Ok(wire)) => wire.decode(self.format),
            Some(Err(err)) => Err(err),
            None => Err(ShellError::StreamClosed),
        };
        if result.is_err() {
            self.stream = None;
        }
        Some(result)
    }

    /// Close the underlying stream.
    pub fn cancel(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(topic = %self.topic, "cancelled direct subscription");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(json: &str) -> WireRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_base64_record() {
        let record = wire(r#"{"from":"12D3","data":"aGVsbG8=","seqno":"AAE=","topicIDs":["news"]}"#)
            .decode(PubSubWireFormat::Base64)
            .unwrap();
        assert_eq!(record.data, Bytes::from_static(b"hello"));
        assert_eq!(record.seqno, Bytes::from_static(&[0, 1]));
        assert_eq!(record.topic_ids, vec!["news"]);
    }

    #[test]
    fn test_byte_array_record() {
        let record = wire(r#"{"from":"12D3","data":[104,105],"seqno":[7],"topics":["t"]}"#)
            .decode(PubSubWireFormat::ByteArray)
            .unwrap();
        assert_eq!(record.data, Bytes::from_static(b"hi"));
        assert_eq!(record.topic_ids, vec!["t"]);
    }

    #[test]
    fn test_format_mismatch_is_decode_error() {
        let err = wire(r#"{"data":[104,105]}"#)
            .decode(PubSubWireFormat::Base64)
            .unwrap_err();
        assert!(err.is_decode());

        let err = wire(r#"{"data":"aGk="}"#)
            .decode(PubSubWireFormat::ByteArray)
            .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_out_of_range_byte_rejected() {
        let err = wire(r#"{"data":[256]}"#)
            .decode(PubSubWireFormat::ByteArray)
            .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(wire(r#"{"data":"!!!"}"#)
            .decode(PubSubWireFormat::Base64)
            .is_err());
    }

    #[tokio::test]
    async fn test_subscription_reports_failure_once() {
        let (sender, receiver) = mpsc::channel(4);
        let shared = Arc::new(TopicShared::default());
        let mut sub = Subscription {
            topic: "t".into(),
            id: 0,
            receiver,
            shared: shared.clone(),
            membership: None,
            done: false,
        };

        sender.send(PubSubRecord::default()).await.unwrap();
        shared.failure.set(Arc::new(ShellError::StreamClosed)).unwrap();
        drop(sender);

        assert!(sub.next().await.unwrap().is_ok());
        match sub.next().await {
            Some(Err(ShellError::Subscription { topic, source })) => {
                assert_eq!(topic, "t");
                assert!(matches!(*source, ShellError::StreamClosed));
            }
            other => panic!("unexpected item: {other:?}"),
        }
        assert!(sub.next().await.is_none());
        assert!(sub.failure().is_some());
    }
}
