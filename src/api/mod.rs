//! Typed wrappers for the daemon's commands.
//!
//! Each wrapper is an inherent method on [`Shell`](crate::client::Shell)
//! that fills in a [`RequestBuilder`](crate::client::RequestBuilder) and picks
//! a decode mode. They add no behaviour of their own; anything not covered
//! here can be called through [`Shell::request`](crate::client::Shell::request)
//! directly.
//!
//! | Module | Commands |
//! |--------|----------|
//! | [`content`] | `add`, `cat`, `get`, `ls`, `refs`, `resolve`, `rm` |
//! | [`pin`] | `pin/add`, `pin/rm`, `pin/ls` |
//! | [`block`] | `block/stat`, `block/get`, `block/put` |
//! | [`dag`] | `dag/get`, `dag/put`, `dag/import`, `dag/stat` |
//! | [`name`] | `name/publish`, `name/resolve` |
//! | [`files`] | `files/{ls,mkdir,write,read,rm,stat,cp,mv,flush,chcid}` |
//! | [`node`] | `id`, `version`, `key/list`, `dht/findpeer`, `swarm/peers`, `bootstrap/*` |
//! | [`log`] | `log/tail` |
//! | [`pubsub`] | `pubsub/pub`, `pubsub/sub`, `pubsub/ls`, `pubsub/peers` |

pub mod block;
pub mod content;
pub mod dag;
pub mod files;
pub mod log;
pub mod name;
pub mod node;
pub mod pin;
pub mod pubsub;

pub use files::{
    FilesChcidOptions, FilesLsOptions, FilesMkdirOptions, FilesReadOptions, FilesStatOptions,
    FilesWriteOptions,
};
pub use log::{LogEvent, Logger};

use serde::Deserialize;

/// `{"Strings": [...]}`, the daemon's generic list-of-strings envelope.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StringList {
    #[serde(rename = "Strings", default)]
    pub strings: Option<Vec<String>>,
}

impl StringList {
    pub(crate) fn into_vec(self) -> Vec<String> {
        self.strings.unwrap_or_default()
    }
}
