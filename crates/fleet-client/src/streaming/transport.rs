//! Transport seam for the feed connection
//!
//! The connection state machine only needs "open a stream of text frames".
//! [`WsTransport`] provides that over WebSocket; tests script it instead.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};
use url::Url;

use super::types::{StreamError, StreamResult};

/// Stream of inbound text frames; ends when the transport closes
pub type MessageStream = Pin<Box<dyn Stream<Item = StreamResult<String>> + Send>>;

/// Something that can open a feed stream
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the transport and return its inbound frames
    async fn open(&self, url: &Url) -> StreamResult<MessageStream>;
}

/// WebSocket transport backed by `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &Url) -> StreamResult<MessageStream> {
        let (socket, response) = connect_async(url.as_str()).await?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        // Reading drives the protocol, so ping replies go out without a writer.
        let frames = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        trace!("Dropping non-UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Server sent close frame");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(StreamError::from(e))),
            }
        });

        Ok(Box::pin(frames))
    }
}
