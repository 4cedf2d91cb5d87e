//! Error types for live-state reconciliation

use thiserror::Error;

/// Result type for store operations
pub type FleetResult<T> = Result<T, FleetError>;

/// Errors that can occur while applying a vehicle update
#[derive(Debug, Error)]
pub enum FleetError {
    /// Payload could not be decoded or is missing required fields
    #[error("Invalid vehicle update: {0}")]
    InvalidUpdate(String),

    /// Coordinates are not finite or outside the valid range
    #[error("Invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
}

impl FleetError {
    /// Create an invalid-update error from anything displayable
    pub fn invalid_update(reason: impl std::fmt::Display) -> Self {
        Self::InvalidUpdate(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_update() {
        let err = FleetError::invalid_update("missing field `id`");
        assert_eq!(err.to_string(), "Invalid vehicle update: missing field `id`");
    }

    #[test]
    fn display_invalid_coordinates() {
        let err = FleetError::InvalidCoordinates {
            lat: 91.0,
            lng: 20.0,
        };
        assert_eq!(err.to_string(), "Invalid coordinates: lat=91, lng=20");
    }
}
