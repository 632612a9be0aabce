//! Stream transport seam.
//!
//! [`EventTransport`] is the narrow interface between the connection layer
//! and the wire: open a URL, get back a stream of byte chunks. The production
//! implementation is [`SseTransport`] over HTTP; tests substitute scripted
//! transports to drive the state machine deterministically.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use url::Url;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError, TransportError, TransportResult};
use crate::types::Channel;

/// Byte-chunk stream handed back by a transport once a connection is open.
pub type FrameStream = Pin<Box<dyn Stream<Item = TransportResult<Bytes>> + Send>>;

/// Opens persistent one-way event streams.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open a stream to `url`.
    ///
    /// Returns once the server has accepted the request; the stream is
    /// considered connected from that point. Every chunk of response bytes is
    /// yielded as-is, ending with `None` when the server closes the stream.
    async fn connect(&self, url: &Url) -> TransportResult<FrameStream>;
}

/// HTTP transport for `text/event-stream` endpoints.
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StreamError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn connect(&self, url: &Url) -> TransportResult<FrameStream> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Http {
                status: response.status().as_u16(),
            });
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| TransportError::Interrupted(e.to_string()));

        Ok(Box::pin(stream))
    }
}

/// Build the stream endpoint URL for a channel.
///
/// Shape: `{base}/v1/{segment}[/{resource_id}]?token={token}`. The token
/// travels as a query credential because the stream transport cannot carry
/// custom request headers.
pub(crate) fn channel_url(base_url: &str, channel: &Channel, token: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| StreamError::Configuration(format!("invalid base url: {e}")))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| StreamError::Configuration("base url cannot be a base".to_string()))?;
        segments
            .pop_if_empty()
            .push("v1")
            .push(channel.channel_type().segment());
        if let Some(id) = channel.resource_id() {
            segments.push(id);
        }
    }

    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}
