//! Test utilities for fleet-client
//!
//! Two ways to exercise a connection without a real backend:
//!
//! - [`MockTransport`] scripts what each connection attempt yields and records
//!   when attempts happen. Pair it with `#[tokio::test(start_paused = true)]`
//!   to check retry timing on a virtual clock.
//! - [`FeedServer`] is a real WebSocket server on localhost that pushes
//!   whatever the test tells it to.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use url::Url;

use crate::endpoint::FEED_PATH;
use crate::streaming::{MessageStream, StreamError, StreamResult, Transport};

// =============================================================================
// Mock transport
// =============================================================================

/// What one scripted connection attempt does
#[derive(Debug, Clone)]
pub enum MockConnection {
    /// The attempt fails
    Refuse,
    /// Open, deliver the frames, then close
    CloseAfter(Vec<String>),
    /// Open, deliver the frames, then fail with a transport error; frames
    /// listed after the error are never reached
    FailAfter(Vec<String>, Vec<String>),
    /// Open, deliver the frames, then stay open
    Hold(Vec<String>),
    /// Open, deliver the frames, stay open for the given time, then close
    HoldFor(Vec<String>, Duration),
}

impl MockConnection {
    pub fn close_after(frames: Vec<String>) -> Self {
        Self::CloseAfter(frames)
    }

    pub fn fail_after(frames: Vec<String>, unreachable: Vec<String>) -> Self {
        Self::FailAfter(frames, unreachable)
    }

    pub fn hold(frames: Vec<String>) -> Self {
        Self::Hold(frames)
    }

    pub fn hold_for(frames: Vec<String>, open_for: Duration) -> Self {
        Self::HoldFor(frames, open_for)
    }
}

/// Scripted [`Transport`]
///
/// Attempts consume the script in order; once it is empty every attempt is
/// refused.
pub struct MockTransport {
    script: Mutex<VecDeque<MockConnection>>,
    opens: Mutex<Vec<Instant>>,
    closes: Arc<Mutex<Vec<Instant>>>,
    open_count: watch::Sender<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (open_count, _) = watch::channel(0);
        Self {
            script: Mutex::new(VecDeque::new()),
            opens: Mutex::new(Vec::new()),
            closes: Arc::new(Mutex::new(Vec::new())),
            open_count,
        }
    }

    /// Queue the outcome of the next unscripted attempt
    pub fn push(&self, connection: MockConnection) {
        self.script.lock().push_back(connection);
    }

    /// Clock readings (tokio time) of every attempt so far
    pub fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().clone()
    }

    /// Clock readings of every [`MockConnection::HoldFor`] stream ending
    pub fn close_times(&self) -> Vec<Instant> {
        self.closes.lock().clone()
    }

    /// Wait until at least `n` attempts have been made
    pub async fn wait_for_opens(&self, n: usize) {
        let mut rx = self.open_count.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _url: &Url) -> StreamResult<MessageStream> {
        let attempt = {
            let mut opens = self.opens.lock();
            opens.push(Instant::now());
            opens.len()
        };
        self.open_count.send_replace(attempt);

        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(MockConnection::Refuse);

        match next {
            MockConnection::Refuse => Err(StreamError::Transport(format!(
                "connection refused (attempt {})",
                attempt
            ))),
            MockConnection::CloseAfter(frames) => Ok(Box::pin(stream::iter(ok_frames(frames)))),
            MockConnection::FailAfter(frames, unreachable) => {
                let items = ok_frames(frames)
                    .chain(std::iter::once(Err(StreamError::Closed)))
                    .chain(ok_frames(unreachable))
                    .collect::<Vec<_>>();
                Ok(Box::pin(stream::iter(items)))
            }
            MockConnection::Hold(frames) => Ok(Box::pin(
                stream::iter(ok_frames(frames)).chain(stream::pending()),
            )),
            MockConnection::HoldFor(frames, open_for) => {
                let closes = self.closes.clone();
                let end = stream::once(async move {
                    tokio::time::sleep(open_for).await;
                    closes.lock().push(Instant::now());
                })
                .filter_map(|()| async { None::<StreamResult<String>> });
                Ok(Box::pin(stream::iter(ok_frames(frames)).chain(end)))
            }
        }
    }
}

fn ok_frames(frames: Vec<String>) -> impl Iterator<Item = StreamResult<String>> {
    frames.into_iter().map(Ok)
}

// =============================================================================
// WebSocket feed server
// =============================================================================

#[derive(Debug, Clone)]
enum ServerFrame {
    Text(String),
    Disconnect,
}

#[derive(Clone)]
struct FeedState {
    frames: broadcast::Sender<ServerFrame>,
    accepted: Arc<AtomicUsize>,
}

/// A live feed server that automatically shuts down when dropped
pub struct FeedServer {
    pub addr: SocketAddr,
    origin: Url,
    feed_url: Url,
    frames: broadcast::Sender<ServerFrame>,
    accepted: Arc<AtomicUsize>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl FeedServer {
    /// Start a feed server on an ephemeral localhost port
    ///
    /// # Example
    ///
    /// ```ignore
    /// let server = FeedServer::start().await?;
    /// let (connection, session) =
    ///     LiveSession::connect(server.feed_url(), SessionConfig::default(), renderer);
    /// server.wait_for_connections(1, Duration::from_secs(5)).await;
    /// server.send_update(json!({
    ///     "id": "V1", "lat": 1.0, "lng": 2.0, "speed": 0, "ignition": true
    /// }));
    /// ```
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let origin = Url::parse(&format!("http://{}", addr))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let feed_url = Url::parse(&format!("ws://{}{}", addr, FEED_PATH))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let (frames, _) = broadcast::channel(256);
        let accepted = Arc::new(AtomicUsize::new(0));
        let state = FeedState {
            frames: frames.clone(),
            accepted: accepted.clone(),
        };

        let router = Router::new()
            .route(FEED_PATH, get(feed_socket))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            origin,
            feed_url,
            frames,
            accepted,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Origin of the "page" this server hosts
    pub fn origin(&self) -> Url {
        self.origin.clone()
    }

    /// WebSocket URL of the feed
    pub fn feed_url(&self) -> Url {
        self.feed_url.clone()
    }

    /// Push a raw text frame to every connected client
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.frames.send(ServerFrame::Text(text.into()));
    }

    /// Push a `vehicle_update` message with `data` as payload
    pub fn send_update(&self, data: Value) {
        self.send_text(json!({"type": "vehicle_update", "data": data}).to_string());
    }

    /// Close every open client connection
    pub fn drop_connections(&self) {
        let _ = self.frames.send(ServerFrame::Disconnect);
    }

    /// Number of WebSocket connections accepted since start
    pub fn connections_accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` connections were accepted
    pub async fn wait_for_connections(&self, n: usize, timeout: Duration) -> bool {
        wait_for(move || async move { self.connections_accepted() >= n }, timeout).await
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        self.drop_connections();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for FeedServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn feed_socket(ws: WebSocketUpgrade, State(state): State<FeedState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: FeedState) {
    // Subscribe before counting so frames sent after a wait are not missed
    let mut frames = state.frames.subscribe();
    state.accepted.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(ServerFrame::Text(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(ServerFrame::Disconnect) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(_)) => continue,
                _ => break,
            },
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_url_format() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let url = format!("ws://{}{}", addr, FEED_PATH);
        assert_eq!(url, "ws://127.0.0.1:8080/ws/fleet/live/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unscripted_attempts_are_refused() {
        let transport = MockTransport::new();
        let url = Url::parse("ws://fleet.test/ws/fleet/live/").unwrap();
        assert!(transport.open(&url).await.is_err());
        assert_eq!(transport.open_times().len(), 1);
    }
}
