//! Descriptive marker content built from a vehicle update

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Status, VehicleUpdate};

/// The label attached to a vehicle's marker
///
/// Layout is the renderer's business; this carries the values it shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerContent {
    pub title: String,
    pub status: Status,
    pub status_text: String,
    /// Speed rounded to whole km/h
    pub speed_kmh: i64,
    pub ignition: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl MarkerContent {
    pub fn new(update: &VehicleUpdate, status: Status) -> Self {
        Self {
            title: update.name.clone(),
            status,
            status_text: status.label().to_string(),
            speed_kmh: update.speed.round() as i64,
            ignition: update.ignition,
            score: update.score,
        }
    }

    /// Label/value rows in display order; the score row only when present
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Speed", format!("{} km/h", self.speed_kmh)),
            (
                "Ignition",
                if self.ignition { "ON" } else { "OFF" }.to_string(),
            ),
        ];
        if let Some(score) = self.score {
            rows.push(("Score today", score.to_string()));
        }
        rows
    }
}

impl fmt::Display for MarkerContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.status_text)?;
        for (label, value) in self.rows() {
            write!(f, "; {}: {}", label, value)?;
        }
        Ok(())
    }
}
