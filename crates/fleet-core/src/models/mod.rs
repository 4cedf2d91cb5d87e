//! Shared data models for the live fleet map

mod content;
mod status;
mod vehicle;

pub use content::*;
pub use status::*;
pub use vehicle::*;
