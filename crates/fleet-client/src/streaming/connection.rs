//! Stream connection implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::parser::{parse_message, FeedMessage};
use super::transport::{MessageStream, Transport, WsTransport};
use super::types::{ConnectionState, FeedEvent};

/// Delay between a failure and the next connection attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default capacity of the event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Fixed wait in `Backoff` before reconnecting; never grows
    pub retry_delay: Duration,
    /// Capacity of the channel created by [`StreamConnection::channel`]
    pub channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// One logical subscription to the live fleet feed
///
/// Once [`connect`](Self::connect) is called the connection is always either
/// open or retrying, until [`close`](Self::close) or drop. Every failure,
/// whatever its cause, is followed by exactly one retry after
/// `retry_delay`.
///
/// # Example
///
/// ```ignore
/// let (connection, mut events) = StreamConnection::channel(
///     feed_url,
///     Arc::new(WsTransport),
///     ConnectionConfig::default(),
/// );
/// connection.connect();
///
/// while let Some(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// ```
pub struct StreamConnection {
    inner: Arc<Inner>,
    task: Mutex<Task>,
    state_rx: watch::Receiver<ConnectionState>,
}

/// The event sender lives in `Idle` until the loop takes it, so aborting
/// the loop or closing an idle connection ends the consumer's channel.
enum Task {
    Idle(mpsc::Sender<FeedEvent>),
    Running(JoinHandle<()>),
    Closed,
}

struct Inner {
    url: Url,
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU64,
}

/// Why a pump over an open stream stopped
enum PumpEnd {
    /// Transport closed or failed; go to backoff
    Disconnected,
    /// Nobody is listening any more; stop the loop
    ConsumerGone,
}

impl StreamConnection {
    /// Create a connection that delivers events to `events`
    pub fn new(
        url: Url,
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
        events: mpsc::Sender<FeedEvent>,
    ) -> Self {
        let (state, state_rx) = watch::channel(ConnectionState::Connecting);
        Self {
            inner: Arc::new(Inner {
                url,
                transport,
                config,
                state,
                attempts: AtomicU64::new(0),
            }),
            task: Mutex::new(Task::Idle(events)),
            state_rx,
        }
    }

    /// Create a connection together with the receiving end of its channel
    pub fn channel(
        url: Url,
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
    ) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        (Self::new(url, transport, config, tx), rx)
    }

    /// WebSocket connection to `url` with its event channel
    pub fn websocket(url: Url, config: ConnectionConfig) -> (Self, mpsc::Receiver<FeedEvent>) {
        Self::channel(url, Arc::new(WsTransport), config)
    }

    /// Start the connection loop
    ///
    /// Idempotent: only the first call spawns the loop. Calling it after
    /// [`close`](Self::close) does nothing. Must be called within a tokio
    /// runtime.
    pub fn connect(&self) {
        let mut task = self.task.lock();
        match std::mem::replace(&mut *task, Task::Closed) {
            Task::Idle(events) => {
                *task = Task::Running(tokio::spawn(self.inner.clone().run(events)));
            }
            Task::Running(handle) => {
                debug!(url = %self.inner.url, "Connection already started");
                *task = Task::Running(handle);
            }
            Task::Closed => {
                warn!(url = %self.inner.url, "Connect called on a closed connection");
            }
        }
    }

    /// Stop the connection permanently
    ///
    /// The event channel closes once the loop has been torn down, so a
    /// consumer draining it sees the end of the stream.
    pub fn close(&self) {
        let mut task = self.task.lock();
        if let Task::Running(handle) = std::mem::replace(&mut *task, Task::Closed) {
            handle.abort();
        }
        self.inner.state.send_replace(ConnectionState::Closed);
        info!(url = %self.inner.url, "Live feed connection closed");
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Current state of the state machine
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Number of connection attempts made so far
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if let Task::Running(handle) = std::mem::replace(self.task.get_mut(), Task::Closed) {
            handle.abort();
        }
        self.inner.state.send_replace(ConnectionState::Closed);
    }
}

impl Inner {
    async fn run(self: Arc<Self>, events: mpsc::Sender<FeedEvent>) {
        loop {
            self.state.send_replace(ConnectionState::Connecting);
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            info!(url = %self.url, attempt, "Connecting to live fleet feed");

            match self.transport.open(&self.url).await {
                Ok(stream) => {
                    self.state.send_replace(ConnectionState::Open);
                    info!(url = %self.url, "Connected to live fleet feed");

                    if events.send(FeedEvent::Connected).await.is_err() {
                        break;
                    }
                    if let PumpEnd::ConsumerGone = self.pump(stream, &events).await {
                        break;
                    }

                    warn!(
                        url = %self.url,
                        "Disconnected from live fleet feed, reconnecting in {:?}",
                        self.config.retry_delay
                    );
                    if events.send(FeedEvent::Disconnected).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        url = %self.url,
                        error = %e,
                        "Failed to connect to live fleet feed, retrying in {:?}",
                        self.config.retry_delay
                    );
                }
            }

            self.state.send_replace(ConnectionState::Backoff);
            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_delay) => {}
                _ = events.closed() => break,
            }
        }

        self.state.send_replace(ConnectionState::Closed);
        debug!(url = %self.url, "Event consumer gone, connection loop stopped");
    }

    /// Forward frames from an open stream until it ends or fails
    ///
    /// The stream is dropped on return, which closes the transport.
    async fn pump(&self, mut stream: MessageStream, events: &mpsc::Sender<FeedEvent>) -> PumpEnd {
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = events.closed() => return PumpEnd::ConsumerGone,
            };

            match next {
                Some(Ok(text)) => match parse_message(&text) {
                    FeedMessage::VehicleUpdate(payload) => {
                        if events.send(FeedEvent::VehicleUpdate(payload)).await.is_err() {
                            return PumpEnd::ConsumerGone;
                        }
                    }
                    FeedMessage::Other(kind) => trace!(%kind, "Ignoring feed message"),
                    FeedMessage::Malformed(reason) => {
                        trace!(%reason, "Ignoring malformed feed message")
                    }
                },
                Some(Err(e)) => {
                    error!(
                        url = %self.url,
                        error = %e,
                        "Live fleet feed error, closing connection"
                    );
                    return PumpEnd::Disconnected;
                }
                None => return PumpEnd::Disconnected,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnection, MockTransport};
    use serde_json::json;

    fn url() -> Url {
        Url::parse("ws://fleet.test/ws/fleet/live/").unwrap()
    }

    fn update_frame(id: &str) -> String {
        json!({
            "type": "vehicle_update",
            "data": {"id": id, "lat": 1.0, "lng": 2.0, "speed": 0, "ignition": true}
        })
        .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_only_vehicle_updates() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockConnection::close_after(vec![
            r#"{"type":"ping"}"#.to_string(),
            "garbage".to_string(),
            update_frame("V1"),
        ]));

        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        conn.connect();

        assert_eq!(events.recv().await, Some(FeedEvent::Connected));
        match events.recv().await {
            Some(FeedEvent::VehicleUpdate(payload)) => assert_eq!(payload["id"], "V1"),
            other => panic!("expected vehicle update, got {:?}", other),
        }
        assert_eq!(events.recv().await, Some(FeedEvent::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_close_schedules_one_retry_after_fixed_delay() {
        let transport = Arc::new(MockTransport::new());
        let closes = 4;
        for _ in 0..closes {
            transport.push(MockConnection::close_after(vec![]));
        }

        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        conn.connect();
        tokio::spawn(async move { while events.recv().await.is_some() {} });

        transport.wait_for_opens(closes + 1).await;
        let opens = transport.open_times();
        assert!(opens.len() >= closes + 1);

        for pair in opens[..closes + 1].windows(2) {
            assert_eq!(pair[1] - pair[0], DEFAULT_RETRY_DELAY);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_counts_from_close() {
        let transport = Arc::new(MockTransport::new());
        let open_for = [Duration::from_secs(3), Duration::from_secs(40), Duration::from_secs(1)];
        for duration in open_for {
            transport.push(MockConnection::hold_for(vec![update_frame("V1")], duration));
        }

        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        conn.connect();
        tokio::spawn(async move { while events.recv().await.is_some() {} });

        transport.wait_for_opens(open_for.len() + 1).await;
        let opens = transport.open_times();
        let closes = transport.close_times();
        assert_eq!(closes.len(), open_for.len());

        for (n, duration) in open_for.iter().enumerate() {
            assert_eq!(closes[n] - opens[n], *duration);
            assert_eq!(opens[n + 1] - closes[n], DEFAULT_RETRY_DELAY);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_ends_event_stream() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockConnection::hold(vec![update_frame("V1")]));

        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        conn.connect();
        assert_eq!(events.recv().await, Some(FeedEvent::Connected));
        assert!(matches!(events.recv().await, Some(FeedEvent::VehicleUpdate(_))));

        conn.close();
        assert_eq!(events.recv().await, None);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_close_before_connect_ends_event_stream() {
        let transport = Arc::new(MockTransport::new());
        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());

        conn.close();
        assert_eq!(events.recv().await, None);
        assert!(transport.open_times().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_publishes_closed() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockConnection::hold(vec![]));

        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        let states = conn.watch_state();
        conn.connect();
        assert_eq!(events.recv().await, Some(FeedEvent::Connected));

        drop(conn);
        assert_eq!(*states.borrow(), ConnectionState::Closed);
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connections_retry_indefinitely() {
        let transport = Arc::new(MockTransport::new());
        let config = ConnectionConfig {
            retry_delay: Duration::from_secs(2),
            ..Default::default()
        };
        let (conn, _events) = StreamConnection::channel(url(), transport.clone(), config);
        conn.connect();

        transport.wait_for_opens(20).await;
        let opens = transport.open_times();
        for pair in opens[..20].windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(2));
        }
        assert!(conn.attempts() >= 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_idempotent() {
        let transport = Arc::new(MockTransport::new());
        let (conn, _events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        conn.connect();
        conn.connect();
        conn.connect();

        // Attempts at t=0, 5 and 10
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(transport.open_times().len(), 3);
        assert_eq!(conn.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_forces_close() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockConnection::fail_after(
            vec![update_frame("V1")],
            vec![update_frame("V2")],
        ));

        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        conn.connect();

        assert_eq!(events.recv().await, Some(FeedEvent::Connected));
        assert!(matches!(
            events.recv().await,
            Some(FeedEvent::VehicleUpdate(p)) if p["id"] == "V1"
        ));
        // Frames after the error are never delivered
        assert_eq!(events.recv().await, Some(FeedEvent::Disconnected));
        assert_eq!(conn.state(), ConnectionState::Backoff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockConnection::hold(vec![]));

        let (conn, mut events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let mut states = conn.watch_state();
        conn.connect();
        assert_eq!(events.recv().await, Some(FeedEvent::Connected));
        states
            .wait_for(|s| *s == ConnectionState::Open)
            .await
            .unwrap();

        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);

        // Closed is permanent
        conn.connect();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.open_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_when_consumer_dropped() {
        let transport = Arc::new(MockTransport::new());
        let (conn, events) =
            StreamConnection::channel(url(), transport.clone(), ConnectionConfig::default());
        let mut states = conn.watch_state();
        conn.connect();
        transport.wait_for_opens(1).await;

        drop(events);
        states
            .wait_for(|s| *s == ConnectionState::Closed)
            .await
            .unwrap();
        let attempts = conn.attempts();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(conn.attempts(), attempts);
    }
}
