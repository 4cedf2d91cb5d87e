//! Derived vehicle status and its marker variant

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operational status derived from ignition and speed
///
/// Never transmitted by the feed; always computed with [`Status::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Ignition on and speed above zero
    Moving,
    /// Ignition on, not moving
    Idle,
    /// Ignition off, regardless of speed
    Stopped,
}

impl Status {
    /// Classify a vehicle from its ignition flag and speed.
    ///
    /// Rules apply in order:
    ///
    /// 1. ignition off → `Stopped`
    /// 2. ignition on and `speed > 0` → `Moving`
    /// 3. ignition on otherwise → `Idle`
    ///
    /// A NaN speed fails the `> 0` test and lands on `Idle`.
    pub fn classify(ignition: bool, speed: f64) -> Self {
        if !ignition {
            Status::Stopped
        } else if speed > 0.0 {
            Status::Moving
        } else {
            Status::Idle
        }
    }

    /// The marker variant used to draw this status
    pub fn variant(self) -> MarkerVariant {
        match self {
            Status::Moving => MarkerVariant::Online,
            Status::Idle => MarkerVariant::Idle,
            Status::Stopped => MarkerVariant::Offline,
        }
    }

    /// Human-readable description shown in marker content
    pub fn label(self) -> &'static str {
        match self {
            Status::Moving => "Moving",
            Status::Idle => "Stopped, ignition on",
            Status::Stopped => "Stopped, ignition off",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Moving => "moving",
            Status::Idle => "idle",
            Status::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual style of a marker; maps 1:1 from [`Status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerVariant {
    Online,
    Idle,
    Offline,
}

impl MarkerVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerVariant::Online => "online",
            MarkerVariant::Idle => "idle",
            MarkerVariant::Offline => "offline",
        }
    }
}

impl fmt::Display for MarkerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
