//! Live session - drives a vehicle store from the feed
//!
//! The session is the single consumer of a connection's event channel and the
//! only owner of its store, so updates are applied one at a time in arrival
//! order without any locking.

use std::future::Future;
use std::sync::Arc;

use fleet_core::{Applied, MarkerRenderer, StoreConfig, VehicleStateStore};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::streaming::{ConnectionConfig, FeedEvent, StreamConnection, Transport, WsTransport};

/// Configuration for a live session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub connection: ConnectionConfig,
    pub store: StoreConfig,
}

/// Consumes feed events and reconciles them into a [`VehicleStateStore`]
pub struct LiveSession<R: MarkerRenderer> {
    store: VehicleStateStore<R>,
    events: mpsc::Receiver<FeedEvent>,
    rejected: u64,
}

impl<R: MarkerRenderer> LiveSession<R> {
    /// Wrap an existing store and event receiver
    pub fn new(store: VehicleStateStore<R>, events: mpsc::Receiver<FeedEvent>) -> Self {
        Self {
            store,
            events,
            rejected: 0,
        }
    }

    /// Build a connection and session over `transport` and start connecting
    pub fn start(
        url: Url,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
        renderer: R,
    ) -> (StreamConnection, Self) {
        let (connection, events) = StreamConnection::channel(url, transport, config.connection);
        let store = VehicleStateStore::with_config(renderer, config.store);
        connection.connect();
        (connection, Self::new(store, events))
    }

    /// [`start`](Self::start) over WebSocket
    pub fn connect(url: Url, config: SessionConfig, renderer: R) -> (StreamConnection, Self) {
        Self::start(url, Arc::new(WsTransport), config, renderer)
    }

    /// Apply a single event to the store
    ///
    /// Returns what the store did for a vehicle update, `None` for lifecycle
    /// events and rejected updates.
    pub fn handle(&mut self, event: FeedEvent) -> Option<Applied> {
        match event {
            FeedEvent::VehicleUpdate(payload) => match self.store.apply_raw(payload) {
                Ok(applied) => Some(applied),
                Err(e) => {
                    self.rejected += 1;
                    warn!(error = %e, "Rejected vehicle update");
                    None
                }
            },
            FeedEvent::Connected => {
                info!(vehicles = self.store.len(), "Live feed ready");
                None
            }
            FeedEvent::Disconnected => {
                debug!(summary = %self.store.status_counts(), "Live feed interrupted");
                None
            }
        }
    }

    /// Process events until the connection is closed or dropped, then return the store
    pub async fn run(mut self) -> VehicleStateStore<R> {
        while let Some(event) = self.events.recv().await {
            self.handle(event);
        }
        self.store
    }

    /// Process events until `shutdown` resolves or the connection goes away
    pub async fn run_until<F>(mut self, shutdown: F) -> VehicleStateStore<R>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.handle(event);
                    }
                    None => break,
                },
                _ = &mut shutdown => {
                    debug!("Session shutdown requested");
                    break;
                }
            }
        }
        self.store
    }

    pub fn store(&self) -> &VehicleStateStore<R> {
        &self.store
    }

    /// Number of updates rejected as malformed
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
