#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # ipfs-shell: a client for the content-addressed storage daemon's HTTP API
//!
//! The daemon exposes every command as `POST /api/v0/<command>` with
//! positional arguments in repeated `arg` query parameters, options as
//! further query parameters and uploads as multipart bodies. This crate turns
//! those calls into typed async functions.
//!
//! ## Overview
//!
//! 1. **Request building** - command, ordered arguments, last-write-wins options
//! 2. **Multipart uploads** - files, readers and directory trees, encoded lazily
//!    and deterministically
//! 3. **Transport** - no keep-alive, no redirects, no retries, optional timeout,
//!    bearer token and proxy
//! 4. **Response decoding** - one JSON value, a stream of values, or raw bytes
//! 5. **Pubsub** - one stream per topic fanned out to many subscribers
//!
//! ## Client Usage
//!
//! ```no_run
//! use ipfs_shell::Shell;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shell = Shell::local()?;
//!
//!     let hash = shell.add("hello world").await?;
//!     shell.pin(&hash).await?;
//!
//!     let version = shell.version().await?;
//!     println!("added {hash} to daemon {}", version.version);
//!     Ok(())
//! }
//! ```
//!
//! ## Raw Requests
//!
//! ```no_run
//! use ipfs_shell::{types::Object, Shell};
//!
//! # async fn run() -> ipfs_shell::Result<()> {
//! let shell = Shell::new("/ip4/127.0.0.1/tcp/5001")?;
//! let object: Object = shell
//!     .request("add")
//!     .option("pin", false)
//!     .option("progress", false)
//!     .bytes_body("hello")
//!     .exec()
//!     .await?;
//! println!("{}", object.hash);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - **[client]** - shell, request builder, multipart encoder, responses, pubsub
//! - **[api]** - typed wrappers for individual daemon commands
//! - **[types]** - command outputs and option sets
//! - **[error]** - error type and result alias
//! - **[protocol]** - wire constants, header helpers, endpoint resolution

pub mod api;
pub mod client;
pub mod error;
pub mod protocol;
pub mod types;

pub use client::{
    ApiDiscovery, Entry, JsonStream, PubSubWireFormat, RequestBuilder, Response, Shell,
    ShellBuilder, ShellConfig, Subscription, SubscriptionManager,
};
pub use error::{Result, ShellError};
pub use types::PubSubRecord;
