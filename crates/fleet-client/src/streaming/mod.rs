//! Streaming support for the live fleet feed
//!
//! A [`StreamConnection`] keeps one WebSocket subscription alive and turns
//! inbound frames into [`FeedEvent`]s on a single-consumer channel.
//!
//! # Example
//!
//! ```no_run
//! use fleet_client::{ConnectionConfig, FeedEvent, StreamConnection};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("ws://localhost:8000/ws/fleet/live/")?;
//! let (connection, mut events) = StreamConnection::websocket(url, ConnectionConfig::default());
//! connection.connect();
//!
//! while let Some(event) = events.recv().await {
//!     if let FeedEvent::VehicleUpdate(payload) = event {
//!         println!("update: {}", payload);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod connection;
mod parser;
mod transport;
mod types;

pub use connection::{
    ConnectionConfig, StreamConnection, DEFAULT_CHANNEL_CAPACITY, DEFAULT_RETRY_DELAY,
};
pub use parser::{parse_message, FeedMessage, VEHICLE_UPDATE};
pub use transport::{MessageStream, Transport, WsTransport};
pub use types::{ConnectionState, FeedEvent, StreamError, StreamResult};
