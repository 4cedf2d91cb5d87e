//! Fleet Client Library
//!
//! Keeps a live subscription to the fleet feed and reconciles it into a
//! [`fleet_core::VehicleStateStore`].
//!
//! # Example
//!
//! ```rust,no_run
//! use fleet_client::{feed_url_from_origin, LiveSession, SessionConfig};
//! use fleet_core::testing::RecordingRenderer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let url = feed_url_from_origin("https://fleet.example.com")?;
//!     let (renderer, log) = RecordingRenderer::recording();
//!
//!     // Reconnects every 5 seconds until stopped
//!     let (connection, session) = LiveSession::connect(url, SessionConfig::default(), renderer);
//!     let store = session
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!     connection.close();
//!
//!     println!("{} ({} render commands)", store.status_counts(), log.len());
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides a scripted transport for virtual-clock tests
//! and a local WebSocket feed server for integration tests:
//!
//! ```rust,ignore
//! use fleet_client::testing::FeedServer;
//!
//! let server = FeedServer::start().await?;
//! let (connection, session) = LiveSession::connect(server.feed_url(), config, renderer);
//! server.send_update(json!({"id": "V1", "lat": 1.0, "lng": 2.0, "speed": 0, "ignition": true}));
//! ```

pub mod endpoint;
pub mod session;
pub mod streaming;
pub mod testing;

pub use endpoint::{feed_url, feed_url_from_origin, FEED_PATH};
pub use session::{LiveSession, SessionConfig};

// Re-export streaming types for convenience
pub use streaming::{
    ConnectionConfig, ConnectionState, FeedEvent, StreamConnection, StreamError, StreamResult,
    Transport, WsTransport,
};

// Re-export core crate for convenience
pub use fleet_core;
