//! Daemon log tailing.

use serde_json::{Map, Value};

use crate::client::{JsonStream, Shell};
use crate::error::Result;

/// One structured log event.
pub type LogEvent = Map<String, Value>;

/// A live tail of the daemon's log.
///
/// Events arrive until the daemon closes the stream or the logger is closed.
pub struct Logger {
    events: JsonStream<LogEvent>,
}

impl Logger {
    /// Receive the next log event.
    pub async fn next(&mut self) -> Option<Result<LogEvent>> {
        self.events.next().await
    }

    /// Stop tailing and release the connection.
    pub fn close(self) {
        self.events.close();
    }
}

impl Shell {
    /// Start tailing the daemon's log.
    pub async fn get_logs(&self) -> Result<Logger> {
        let response = self.request("log/tail").send().await?;
        Ok(Logger {
            events: response.into_json_stream(),
        })
    }
}
