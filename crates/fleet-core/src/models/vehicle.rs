//! Vehicle identity, inbound updates and per-vehicle state

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Status;
use crate::error::{FleetError, FleetResult};

/// Opaque vehicle identifier
///
/// The feed may send ids as JSON strings or integers; both are normalised to
/// their string form so `"42"` and `42` address the same vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VehicleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for VehicleId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for VehicleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

/// A geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

/// Inbound position/status report for one vehicle
///
/// This is the `data` payload of a `vehicle_update` feed message. It lives
/// for a single reconciliation step and is not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub id: VehicleId,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub name: String,
    /// Speed in km/h
    pub speed: f64,
    pub ignition: bool,
    /// Driver score for the day, absent when not computed
    #[serde(default)]
    pub score: Option<f64>,
}

impl VehicleUpdate {
    pub fn position(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// Check the constraints serde cannot express
    ///
    /// Stricter than the wire format: coordinates must be finite and within
    /// lat [-90, 90], lng [-180, 180], so a finite but impossible position
    /// such as lat 95 is rejected instead of being handed to the renderer.
    /// Speed and score must be finite; a negative speed is accepted.
    pub fn validate(&self) -> FleetResult<()> {
        if self.id.is_empty() {
            return Err(FleetError::invalid_update("empty vehicle id"));
        }
        if !self.position().is_valid() {
            return Err(FleetError::InvalidCoordinates {
                lat: self.lat,
                lng: self.lng,
            });
        }
        if !self.speed.is_finite() {
            return Err(FleetError::invalid_update(format!(
                "speed is not a finite number: {}",
                self.speed
            )));
        }
        if let Some(score) = self.score {
            if !score.is_finite() {
                return Err(FleetError::invalid_update(format!(
                    "score is not a finite number: {}",
                    score
                )));
            }
        }
        Ok(())
    }
}

/// Last-known state of one vehicle, owned by the store
///
/// `handle` is the renderer's marker for this vehicle. It is created on first
/// sighting and never replaced.
#[derive(Debug, Clone)]
pub struct VehicleState<H> {
    pub id: VehicleId,
    pub position: Coordinates,
    pub name: String,
    pub speed: f64,
    pub ignition: bool,
    pub score: Option<f64>,
    pub status: Status,
    pub handle: H,
    /// When the most recent update was applied
    pub updated_at: DateTime<Utc>,
    /// Number of updates applied, including the one that created the state
    pub update_count: u64,
}
