//! Fluent construction of daemon requests.
//!
//! A [`RequestBuilder`] accumulates one call: the command path, positional
//! arguments in call order, options (last write wins) and headers (same rule,
//! separate namespace), plus an optional multipart body. Terminal methods
//! send it:
//!
//! | Method | Result |
//! |--------|--------|
//! | [`send`](RequestBuilder::send) | the live [`Response`] |
//! | [`exec`](RequestBuilder::exec) | one decoded JSON value, body closed |
//! | [`exec_discard`](RequestBuilder::exec_discard) | nothing, body drained |
//!
//! Anything that goes wrong while building (an unserialisable JSON body, an
//! invalid header) is remembered instead of raised. Every later chained call
//! is then a no-op and the terminal method returns the stored error without
//! touching the network.
//!
//! # Examples
//!
//! ```
//! use ipfs_shell::client::Shell;
//!
//! let shell = Shell::new("127.0.0.1:5001").unwrap();
//! let url = shell
//!     .request("pin/add")
//!     .arg("QmA")
//!     .arg("QmB")
//!     .option("recursive", true)
//!     .url()
//!     .unwrap();
//! assert_eq!(
//!     url.as_str(),
//!     "http://127.0.0.1:5001/api/v0/pin/add?arg=QmA&arg=QmB&encoding=json&recursive=true&stream-channels=true"
//! );
//! ```

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::client::multipart::{Entry, MultipartBody};
use crate::client::response::Response;
use crate::client::shell::Shell;
use crate::client::utils::format_duration;
use crate::error::{Result, ShellError};
use crate::protocol::constants::{API_PREFIX, ARG, DEFAULT_OPTIONS};

/// Conversion of option values into their query-string form.
pub trait OptionValue {
    /// Canonical string form sent to the daemon.
    fn to_option_value(&self) -> String;
}

impl OptionValue for bool {
    fn to_option_value(&self) -> String {
        self.to_string()
    }
}

macro_rules! integer_option_value {
    ($($t:ty),*) => {
        $(
            impl OptionValue for $t {
                fn to_option_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

integer_option_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl OptionValue for str {
    fn to_option_value(&self) -> String {
        self.to_string()
    }
}

impl OptionValue for String {
    fn to_option_value(&self) -> String {
        self.clone()
    }
}

impl OptionValue for [u8] {
    fn to_option_value(&self) -> String {
        String::from_utf8_lossy(self).into_owned()
    }
}

impl OptionValue for Vec<u8> {
    fn to_option_value(&self) -> String {
        self.as_slice().to_option_value()
    }
}

impl OptionValue for Duration {
    fn to_option_value(&self) -> String {
        format_duration(*self)
    }
}

impl<T: OptionValue + ?Sized> OptionValue for &T {
    fn to_option_value(&self) -> String {
        (**self).to_option_value()
    }
}

/// Builder for one daemon call. Created by [`Shell::request`].
#[derive(Debug)]
pub struct RequestBuilder {
    shell: Shell,
    command: String,
    args: Vec<String>,
    options: BTreeMap<String, String>,
    headers: HeaderMap,
    body: Option<MultipartBody>,
    failure: Option<ShellError>,
}

impl RequestBuilder {
    pub(crate) fn new(shell: Shell, command: impl Into<String>) -> Self {
        let options = DEFAULT_OPTIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            shell,
            command: command.into(),
            args: Vec::new(),
            options,
            headers: HeaderMap::new(),
            body: None,
            failure: None,
        }
    }

    /// Put the builder in the failed state; the first failure is kept.
    pub(crate) fn fail(mut self, err: ShellError) -> Self {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self
    }

    /// True once a building step has failed.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Command path, e.g. `files/ls`.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        if self.failure.is_none() {
            self.args.push(value.into());
        }
        self
    }

    /// Append several positional arguments, in iteration order.
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.failure.is_none() {
            self.args.extend(values.into_iter().map(Into::into));
        }
        self
    }

    /// Set an option, replacing any earlier value for `key`.
    pub fn option<V: OptionValue>(mut self, key: impl Into<String>, value: V) -> Self {
        if self.failure.is_none() {
            self.options.insert(key.into(), value.to_option_value());
        }
        self
    }

    /// Set an option only when `value` is present.
    pub fn option_opt<V: OptionValue>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.option(key, value),
            None => self,
        }
    }

    /// Set a header, replacing any earlier value for `name`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.failure.is_some() {
            return self;
        }
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ShellError::InvalidRequest(format!("header name {name:?}: {e}")))
            .and_then(|n| {
                HeaderValue::from_str(value)
                    .map(|v| (n, v))
                    .map_err(|e| ShellError::InvalidRequest(format!("header {name}: {e}")))
            });
        match parsed {
            Ok((name, value)) => {
                self.headers.insert(name, value);
                self
            }
            Err(err) => self.fail(err),
        }
    }

    /// Upload the given entries as the multipart body.
    pub fn entries(self, entries: Vec<Entry>) -> Self {
        self.body(MultipartBody::new(entries))
    }

    /// Use a prepared multipart body.
    pub fn body(mut self, body: MultipartBody) -> Self {
        if self.failure.is_none() {
            self.body = Some(body);
        }
        self
    }

    /// Upload raw bytes as a single unnamed file part.
    pub fn bytes_body(self, data: impl Into<Bytes>) -> Self {
        self.entries(vec![Entry::bytes("", data)])
    }

    /// Upload `value` serialised as JSON in a single unnamed file part.
    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> Self {
        if self.failure.is_some() {
            return self;
        }
        match serde_json::to_vec(value) {
            Ok(encoded) => self.bytes_body(encoded),
            Err(err) => self.fail(err.into()),
        }
    }

    /// Full request URL: API root, command, `arg` parameters then options.
    pub fn url(&self) -> Result<Url> {
        if let Some(err) = &self.failure {
            return Err(ShellError::InvalidRequest(err.to_string()));
        }
        build_url(self.shell.base_url(), &self.command, &self.args, &self.options)
    }

    /// Issue the request and classify the response.
    ///
    /// Each call performs one HTTP request; nothing is retried.
    pub async fn send(self) -> Result<Response> {
        let RequestBuilder {
            shell,
            command,
            args,
            options,
            mut headers,
            body,
            failure,
        } = self;

        if let Some(err) = failure {
            return Err(err);
        }

        let url = build_url(shell.base_url(), &command, &args, &options)?;
        let mut request = shell.transport().post(url);

        if let Some(body) = body {
            let content_type = HeaderValue::from_str(&body.content_type())
                .map_err(|e| ShellError::InvalidRequest(e.to_string()))?;
            headers.insert(CONTENT_TYPE, content_type);
            headers.insert(
                CONTENT_DISPOSITION,
                HeaderValue::from_static("form-data: name=\"files\""),
            );
            request = request.body(reqwest::Body::wrap_stream(body.into_stream()));
        }

        tracing::debug!(%command, args = args.len(), "sending request");
        let response = request.headers(headers).send().await?;
        Response::classify(response).await
    }

    /// Send, decode one JSON value into `T`, then close the body.
    pub async fn exec<T: DeserializeOwned>(self) -> Result<T> {
        self.send().await?.decode().await
    }

    /// Send and drain the body, ignoring its contents.
    pub async fn exec_discard(self) -> Result<()> {
        self.send().await?.close().await
    }
}

fn build_url(
    base: &Url,
    command: &str,
    args: &[String],
    options: &BTreeMap<String, String>,
) -> Result<Url> {
    let root = base.as_str().trim_end_matches('/');
    let mut url = Url::parse(&format!("{root}{API_PREFIX}/{command}"))?;
    {
        let mut query = url.query_pairs_mut();
        for arg in args {
            query.append_pair(ARG, arg);
        }
        for (key, value) in options {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        Shell::new("127.0.0.1:5001").unwrap()
    }

    fn query(builder: &RequestBuilder) -> Vec<(String, String)> {
        builder
            .url()
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_args_keep_call_order() {
        let req = shell().request("refs").arg("c").arg("a").args(["b", "d"]);
        let args: Vec<String> = query(&req)
            .into_iter()
            .filter(|(k, _)| k == "arg")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(args, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_option_last_write_wins() {
        let req = shell().request("add").option("k", "v1").option("k", "v2");
        let values: Vec<(String, String)> = query(&req).into_iter().filter(|(k, _)| k == "k").collect();
        assert_eq!(values, vec![("k".to_string(), "v2".to_string())]);
    }

    #[test]
    fn test_default_options_present_and_overridable() {
        let req = shell().request("cat").option("encoding", "text");
        let pairs = query(&req);
        assert!(pairs.contains(&("encoding".into(), "text".into())));
        assert!(pairs.contains(&("stream-channels".into(), "true".into())));
        assert_eq!(pairs.iter().filter(|(k, _)| k == "encoding").count(), 1);
    }

    #[test]
    fn test_option_value_coercion() {
        let req = shell()
            .request("name/publish")
            .option("resolve", false)
            .option("depth", -1i32)
            .option("lifetime", Duration::from_secs(3600))
            .option("raw", b"bytes".as_slice())
            .option("owned", String::from("s"));
        let pairs = query(&req);
        assert!(pairs.contains(&("resolve".into(), "false".into())));
        assert!(pairs.contains(&("depth".into(), "-1".into())));
        assert!(pairs.contains(&("lifetime".into(), "1h0m0s".into())));
        assert!(pairs.contains(&("raw".into(), "bytes".into())));
        assert!(pairs.contains(&("owned".into(), "s".into())));
    }

    #[test]
    fn test_arguments_are_percent_encoded() {
        let url = shell().request("files/stat").arg("/my dir/a&b").url().unwrap();
        assert!(url.as_str().contains("arg=%2Fmy+dir%2Fa%26b"));
    }

    #[test]
    fn test_command_path() {
        let url = shell().request("files/ls").url().unwrap();
        assert_eq!(url.path(), "/api/v0/files/ls");
    }

    #[test]
    fn test_invalid_header_fails_builder() {
        let req = shell().request("id").header("bad header", "x").arg("ignored");
        assert!(req.is_failed());
        assert!(req.args.is_empty());
    }

    #[tokio::test]
    async fn test_failed_builder_returns_stored_error() {
        let req = shell()
            .request("id")
            .fail(ShellError::InvalidRequest("transport unavailable".into()))
            .arg("x")
            .option("y", true)
            .header("x-test", "1");
        match req.send().await {
            Err(ShellError::InvalidRequest(msg)) => assert_eq!(msg, "transport unavailable"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_first_failure_is_kept() {
        let req = shell()
            .request("id")
            .fail(ShellError::InvalidRequest("first".into()))
            .fail(ShellError::InvalidRequest("second".into()));
        assert!(matches!(req.failure, Some(ShellError::InvalidRequest(ref m)) if m == "first"));
    }

    #[test]
    fn test_header_overwrite() {
        let req = shell().request("id").header("x-a", "1").header("x-a", "2");
        assert_eq!(req.headers.get_all("x-a").iter().count(), 1);
        assert_eq!(req.headers["x-a"], "2");
    }
}
