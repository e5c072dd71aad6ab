//! Classified daemon responses and their decode modes.
//!
//! [`Response::classify`] is the only way to obtain a [`Response`]: by the
//! time a caller holds one the status was below 300, so a response and an
//! error never coexist. Error responses are drained before their error is
//! returned.
//!
//! | Mode | Method | Used by |
//! |------|--------|---------|
//! | single value | [`Response::decode`] | `id`, `version`, `pin/add`, ... |
//! | value stream | [`Response::into_json_stream`] | `add` of trees, `refs`, `dag/import`, `log/tail` |
//! | raw bytes | [`Response::into_byte_stream`], [`Response::bytes`] | `cat`, `get`, `block/get` |

use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::client::parser::JsonStreamParser;
use crate::client::utils::{is_error_status, is_redirect_status};
use crate::error::{Result, ShellError};
use crate::protocol::constants::headers;
use crate::protocol::{media_type, parse_error_body};

/// Raw body stream handed to callers.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// A successful daemon response with its body still unread.
#[derive(Debug)]
pub struct Response {
    inner: reqwest::Response,
}

impl Response {
    /// Turn an HTTP response into a [`Response`] or the error it carries.
    pub(crate) async fn classify(response: reqwest::Response) -> Result<Response> {
        let status = response.status().as_u16();

        if is_redirect_status(status) {
            let location = header_value(&response, headers::LOCATION);
            drain(response).await;
            tracing::debug!(status, %location, "refusing redirect");
            return Err(ShellError::UnexpectedRedirect { status, location });
        }

        if status == 404 {
            drain(response).await;
            return Err(ShellError::CommandNotFound);
        }

        if is_error_status(status) {
            let media = media_type(&header_value(&response, headers::CONTENT_TYPE));
            let body = read_error_body(response).await;
            let parsed = parse_error_body(&media, &body);
            tracing::debug!(status, message = %parsed.message, "daemon returned an error");
            return Err(ShellError::Daemon {
                status,
                message: parsed.message,
                code: parsed.code,
            });
        }

        Ok(Response { inner: response })
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    /// Media type of the body, without parameters.
    pub fn media_type(&self) -> String {
        media_type(&header_value(&self.inner, headers::CONTENT_TYPE))
    }

    /// Value of a response header, empty when absent.
    pub fn header(&self, name: &str) -> String {
        header_value(&self.inner, name)
    }

    /// Decode exactly one JSON value, then close the body.
    pub async fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let mut stream = self.into_json_stream::<T>();
        let value = match stream.next().await {
            Some(value) => value?,
            None => return Err(ShellError::decode("empty response body")),
        };
        stream.close();
        Ok(value)
    }

    /// Decode successive JSON values until the body ends.
    pub fn into_json_stream<T: DeserializeOwned>(self) -> JsonStream<T> {
        JsonStream::new(Box::pin(self.inner.bytes_stream()))
    }

    /// Hand the body over as a raw byte stream.
    pub fn into_byte_stream(self) -> ByteStream {
        Box::pin(self.inner.bytes_stream().map_err(ShellError::from))
    }

    /// Read the whole body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        Ok(self.inner.bytes().await?)
    }

    /// Drain and release the body.
    pub async fn close(self) -> Result<()> {
        let mut inner = self.inner;
        while inner.chunk().await?.is_some() {}
        Ok(())
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Read an error response to the end so its connection can be released.
///
/// A failure while draining is dropped: the status already decided the
/// error the caller sees.
async fn drain(mut response: reqwest::Response) {
    while let Ok(Some(_)) = response.chunk().await {}
}

/// Read an error body to its end.
///
/// A read failure keeps the bytes that arrived: the status already decided
/// the error the caller sees.
async fn read_error_body(mut response: reqwest::Response) -> Bytes {
    let mut body = BytesMut::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(error = %err, read = body.len(), "error body cut short");
                break;
            }
        }
    }
    body.freeze()
}

/// Lazily decoded sequence of JSON values from a response body.
///
/// Yields `Ok(value)` per value, then ends. A decode or transport failure is
/// yielded once as the final item; values delivered before it stay valid.
/// Dropping the stream, or calling [`close`](JsonStream::close), abandons the
/// rest of the body.
pub struct JsonStream<T> {
    body: Option<BodyStream>,
    parser: JsonStreamParser<T>,
    ready: VecDeque<T>,
    failed: bool,
}

// No field is structurally pinned.
impl<T> Unpin for JsonStream<T> {}

impl<T: DeserializeOwned> JsonStream<T> {
    fn new(body: BodyStream) -> Self {
        Self {
            body: Some(body),
            parser: JsonStreamParser::new(),
            ready: VecDeque::new(),
            failed: false,
        }
    }

    /// Receive the next value.
    pub async fn next(&mut self) -> Option<Result<T>> {
        StreamExt::next(self).await
    }

    /// Stop reading and release the connection.
    pub fn close(self) {
        drop(self);
    }
}

impl<T: DeserializeOwned> Stream for JsonStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(value) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(value)));
            }
            if this.failed {
                return Poll::Ready(None);
            }
            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(body.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => match this.parser.feed(&chunk) {
                    Ok(values) => this.ready.extend(values),
                    Err(err) => return Poll::Ready(Some(Err(this.fail(err)))),
                },
                Some(Err(err)) => return Poll::Ready(Some(Err(this.fail(err.into())))),
                None => {
                    this.body = None;
                    match this.parser.finish() {
                        Ok(values) => this.ready.extend(values),
                        Err(err) => return Poll::Ready(Some(Err(this.fail(err)))),
                    }
                }
            }
        }
    }
}

impl<T> JsonStream<T> {
    fn fail(&mut self, err: ShellError) -> ShellError {
        self.failed = true;
        self.body = None;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::Value;

    fn stream_of(chunks: Vec<&'static str>) -> JsonStream<Value> {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(Bytes::from_static(c.as_bytes()))),
        );
        JsonStream::new(Box::pin(body))
    }

    #[tokio::test]
    async fn test_stream_yields_all_values_then_ends() {
        let mut s = stream_of(vec!["{\"n\":1}{\"n\"", ":2}\n{\"n\":3}"]);
        let mut seen = Vec::new();
        while let Some(item) = s.next().await {
            seen.push(item.unwrap()["n"].as_i64().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_stream_ends_with_error() {
        let mut s = stream_of(vec!["{\"n\":1}{\"n\":"]);
        assert!(s.next().await.unwrap().is_ok());
        assert!(s.next().await.unwrap().unwrap_err().is_decode());
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn test_values_before_garbage_survive() {
        let mut s = stream_of(vec!["{\"n\":1} oops", "{\"n\":2}"]);
        assert_eq!(s.next().await.unwrap().unwrap()["n"], 1);
        assert!(s.next().await.unwrap().is_err());
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn test_trailing_scalar_is_yielded() {
        let mut s = stream_of(vec!["\"Qm1\"\n\"Qm", "2\"\n7"]);
        assert_eq!(s.next().await.unwrap().unwrap(), "Qm1");
        assert_eq!(s.next().await.unwrap().unwrap(), "Qm2");
        assert_eq!(s.next().await.unwrap().unwrap(), 7);
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_body_ends_cleanly() {
        let mut s = stream_of(vec![]);
        assert!(s.next().await.is_none());
    }
}
