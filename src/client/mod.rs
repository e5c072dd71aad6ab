//! Request construction, transport and response streaming.
//!
//! This module is the machinery every daemon command goes through:
//!
//! - **Build** a call with [`RequestBuilder`]: command, positional arguments,
//!   options, headers, optional multipart upload
//! - **Upload** files, readers and whole directory trees lazily with
//!   [`MultipartBody`]
//! - **Send** it through a [`Shell`] and get back a classified [`Response`]
//! - **Decode** one JSON value, a [`JsonStream`] of values, or raw bytes
//! - **Subscribe** to pubsub topics through a [`SubscriptionManager`]
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── shell        - Shell, ShellBuilder and the configured HTTP transport
//! ├── request      - RequestBuilder and option value conversion
//! ├── multipart    - upload entries and the lazy multipart encoder
//! ├── response     - response classification, JsonStream, byte streams
//! ├── parser       - incremental JSON value splitter
//! ├── subscription - pubsub fan-out manager and direct subscriptions
//! ├── config       - ShellConfig and local daemon discovery
//! └── utils        - duration formatting and small helpers
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Shell`] | Handle to one daemon's API |
//! | [`RequestBuilder`] | One call under construction |
//! | [`Entry`] | File, directory or symlink to upload |
//! | [`Response`] | Successful response with unread body |
//! | [`JsonStream`] | Lazily decoded sequence of JSON values |
//! | [`SubscriptionManager`] | Shared pubsub streams, one per topic |
//!
//! # Examples
//!
//! ## Building a Request
//!
//! ```
//! use ipfs_shell::client::Shell;
//!
//! let shell = Shell::new("localhost:5001").unwrap();
//! let request = shell
//!     .request("add")
//!     .option("pin", false)
//!     .option("progress", false)
//!     .bytes_body("hello");
//! assert!(!request.is_failed());
//! ```
//!
//! ## Encoding an Upload
//!
//! ```
//! use ipfs_shell::client::{Entry, MultipartBody};
//!
//! # tokio_test::block_on(async {
//! let body = MultipartBody::with_boundary(vec![Entry::bytes("a.txt", "A")], "B");
//! let bytes = body.encode_to_vec().await.unwrap();
//! assert!(bytes.ends_with(b"\r\n--B--\r\n"));
//! # });
//! ```

mod config;
mod multipart;
mod parser;
mod request;
mod response;
mod shell;
mod subscription;
mod utils;

pub use config::{
    ApiDiscovery, PubSubWireFormat, ShellConfig, API_FILE, DEFAULT_REPO_DIR, ENV_API,
    ENV_REPO_DIR,
};
pub use multipart::{BoxedReader, Children, Entry, FileSource, MultipartBody, MultipartStream};
pub use parser::{JsonStreamParser, ParseState};
pub use request::{OptionValue, RequestBuilder};
pub use response::{ByteStream, JsonStream, Response};
pub use shell::{Shell, ShellBuilder};
pub use subscription::{DirectSubscription, Subscription, SubscriptionManager};
pub use utils::*;
