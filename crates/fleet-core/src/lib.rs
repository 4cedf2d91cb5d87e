//! fleet-core - Core traits and types for the live fleet map
//!
//! This crate owns the reconciliation side of the live map: the vehicle data
//! model, status classification, marker content, the [`MarkerRenderer`] seam
//! to the external map, and the [`VehicleStateStore`] that ties them together.
//! It has no knowledge of how updates arrive; see `fleet-client` for that.

pub mod error;
pub mod models;
pub mod render;
pub mod store;
pub mod testing;

pub use error::{FleetError, FleetResult};
pub use models::*;
pub use render::{CommandRenderer, CommandSink, MarkerId, MarkerRenderer, RenderCommand};
pub use store::{Applied, StatusCounts, StoreConfig, VehicleStateStore};
