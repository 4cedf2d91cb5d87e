//! Types for the live feed stream

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// An event delivered by a [`super::StreamConnection`] to its consumer
///
/// Lifecycle notices travel on the same channel as updates so the consumer
/// sees them in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The transport is open and messages will follow
    Connected,

    /// `data` payload of a `vehicle_update` message, not yet validated
    VehicleUpdate(Value),

    /// The transport closed; a retry is scheduled
    Disconnected,
}

/// State of the connection state machine
///
/// ```text
///          ┌──────────── failure ────────────┐
///          ▼                                 │
///   Connecting ── open ──► Open ── close/error ──► Backoff
///          ▲                                          │
///          └──────────── fixed delay ─────────────────┘
/// ```
///
/// `Closed` is terminal: reached through `close()` or once the consumer is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Backoff,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Backoff => "backoff",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Errors that can occur on the feed stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// WebSocket/connection error
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport failure reported by a non-WebSocket transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Feed endpoint could not be derived
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Stream was closed by the server
    #[error("Stream closed")]
    Closed,
}

/// Result type for streaming operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;
