//! Vehicle state store - per-vehicle reconciliation
//!
//! Each store instance owns its own id → state table and its renderer, so
//! several stores can live side by side (one per map, one per test) without
//! sharing anything.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{FleetError, FleetResult};
use crate::models::{MarkerContent, Status, VehicleId, VehicleState, VehicleUpdate};
use crate::render::MarkerRenderer;

/// Zoom level used when focusing the first vehicle of a session
pub const DEFAULT_FOCUS_ZOOM: u8 = 13;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Zoom level for the one-time viewport focus on the first vehicle
    #[serde(default = "default_focus_zoom")]
    pub focus_zoom: u8,
}

fn default_focus_zoom() -> u8 {
    DEFAULT_FOCUS_ZOOM
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            focus_zoom: DEFAULT_FOCUS_ZOOM,
        }
    }
}

/// Outcome of a successfully applied update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// First sighting: state and marker were created
    Created,
    /// Existing state was mutated in place
    Updated { status_changed: bool },
}

/// Number of vehicles per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub moving: usize,
    pub idle: usize,
    pub stopped: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.moving + self.idle + self.stopped
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vehicles ({} moving, {} idle, {} stopped)",
            self.total(),
            self.moving,
            self.idle,
            self.stopped
        )
    }
}

/// Owns last-known vehicle state and drives the renderer
///
/// Updates are applied in the order they are handed in; with no sequence
/// number on the wire, the last update applied for an id wins.
pub struct VehicleStateStore<R: MarkerRenderer> {
    renderer: R,
    vehicles: HashMap<VehicleId, VehicleState<R::Handle>>,
    config: StoreConfig,
}

impl<R: MarkerRenderer> VehicleStateStore<R> {
    /// Create an empty store driving `renderer`
    pub fn new(renderer: R) -> Self {
        Self::with_config(renderer, StoreConfig::default())
    }

    /// Create an empty store with explicit configuration
    pub fn with_config(renderer: R, config: StoreConfig) -> Self {
        Self {
            renderer,
            vehicles: HashMap::new(),
            config,
        }
    }

    /// Decode a raw `vehicle_update` payload and apply it
    ///
    /// A payload that does not decode is rejected before anything is touched.
    pub fn apply_raw(&mut self, payload: Value) -> FleetResult<Applied> {
        let update: VehicleUpdate =
            serde_json::from_value(payload).map_err(FleetError::invalid_update)?;
        self.apply_update(update)
    }

    /// Apply one update: create the vehicle on first sighting, otherwise
    /// mutate it in place and refresh its marker.
    pub fn apply_update(&mut self, update: VehicleUpdate) -> FleetResult<Applied> {
        update.validate()?;

        let status = Status::classify(update.ignition, update.speed);
        let content = MarkerContent::new(&update, status);
        let position = update.position();
        let first_in_session = self.vehicles.is_empty();

        match self.vehicles.entry(update.id.clone()) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                let previous = state.status;

                state.position = position;
                state.name = update.name;
                state.speed = update.speed;
                state.ignition = update.ignition;
                state.score = update.score;
                state.status = status;
                state.updated_at = Utc::now();
                state.update_count += 1;

                self.renderer.move_marker(&state.handle, position);
                let status_changed = previous != status;
                if status_changed {
                    self.renderer
                        .set_marker_variant(&state.handle, status.variant());
                }
                self.renderer.set_marker_content(&state.handle, &content);

                debug!(
                    vehicle_id = %state.id,
                    %position,
                    %status,
                    status_changed,
                    "Vehicle updated"
                );
                Ok(Applied::Updated { status_changed })
            }
            Entry::Vacant(entry) => {
                let handle = self
                    .renderer
                    .create_marker(position, status.variant(), &content);

                debug!(vehicle_id = %update.id, %position, %status, ?handle, "Vehicle registered");

                entry.insert(VehicleState {
                    id: update.id,
                    position,
                    name: update.name,
                    speed: update.speed,
                    ignition: update.ignition,
                    score: update.score,
                    status,
                    handle,
                    updated_at: Utc::now(),
                    update_count: 1,
                });

                if first_in_session {
                    info!(
                        %position,
                        zoom = self.config.focus_zoom,
                        "Focusing map on first vehicle"
                    );
                    self.renderer
                        .focus_viewport(position, self.config.focus_zoom);
                }
                Ok(Applied::Created)
            }
        }
    }

    /// Look up a vehicle's current state
    pub fn get(&self, id: &VehicleId) -> Option<&VehicleState<R::Handle>> {
        self.vehicles.get(id)
    }

    pub fn contains(&self, id: &VehicleId) -> bool {
        self.vehicles.contains_key(id)
    }

    /// Number of distinct vehicles seen this session
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Iterate over all known vehicles (arbitrary order)
    pub fn iter(&self) -> impl Iterator<Item = &VehicleState<R::Handle>> {
        self.vehicles.values()
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.vehicles
            .values()
            .fold(StatusCounts::default(), |mut counts, state| {
                match state.status {
                    Status::Moving => counts.moving += 1,
                    Status::Idle => counts.idle += 1,
                    Status::Stopped => counts.stopped += 1,
                }
                counts
            })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Tear down the store, keeping the renderer
    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

impl<R: MarkerRenderer> fmt::Debug for VehicleStateStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VehicleStateStore")
            .field("vehicles", &self.vehicles.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, MarkerVariant};
    use crate::render::{MarkerId, RenderCommand};
    use crate::testing::{RecordingRenderer, RenderLog};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> (VehicleStateStore<RecordingRenderer>, RenderLog) {
        let (renderer, log) = RecordingRenderer::recording();
        (VehicleStateStore::new(renderer), log)
    }

    fn truck(lat: f64, lng: f64, speed: f64, ignition: bool, score: Option<f64>) -> Value {
        json!({
            "id": "V1", "lat": lat, "lng": lng, "name": "Truck",
            "speed": speed, "ignition": ignition, "score": score
        })
    }

    #[test]
    fn first_update_creates_idle_vehicle_and_focuses() {
        let (mut store, log) = store();

        let applied = store.apply_raw(truck(10.0, 20.0, 0.0, true, Some(5.0))).unwrap();
        assert_eq!(applied, Applied::Created);

        let state = store.get(&"V1".into()).unwrap();
        assert_eq!(state.status, Status::Idle);
        assert_eq!(state.update_count, 1);

        let commands = log.commands();
        assert_eq!(commands.len(), 2);
        match &commands[0] {
            RenderCommand::CreateMarker {
                marker,
                position,
                variant,
                content,
            } => {
                assert_eq!(*marker, MarkerId(1));
                assert_eq!(*position, Coordinates::new(10.0, 20.0));
                assert_eq!(*variant, MarkerVariant::Idle);
                assert_eq!(content.score, Some(5.0));
            }
            other => panic!("expected create_marker, got {:?}", other),
        }
        assert_eq!(
            commands[1],
            RenderCommand::FocusViewport {
                position: Coordinates::new(10.0, 20.0),
                zoom: DEFAULT_FOCUS_ZOOM,
            }
        );
    }

    #[test]
    fn second_update_mutates_in_place() {
        let (mut store, log) = store();
        store.apply_raw(truck(10.0, 20.0, 0.0, true, Some(5.0))).unwrap();
        log.clear();

        let applied = store.apply_raw(truck(11.0, 21.0, 40.0, true, Some(7.0))).unwrap();
        assert_eq!(
            applied,
            Applied::Updated {
                status_changed: true
            }
        );

        assert_eq!(store.len(), 1);
        let state = store.get(&"V1".into()).unwrap();
        assert_eq!(state.status, Status::Moving);
        assert_eq!(state.position, Coordinates::new(11.0, 21.0));
        assert_eq!(state.score, Some(7.0));
        assert_eq!(state.handle, MarkerId(1));
        assert_eq!(state.update_count, 2);

        let names: Vec<_> = log.commands().iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec!["move_marker", "set_marker_variant", "set_marker_content"]
        );
        assert_eq!(log.count("create_marker"), 0);
        assert_eq!(log.count("focus_viewport"), 0);
    }

    #[test]
    fn unchanged_status_skips_variant_swap() {
        let (mut store, log) = store();
        store.apply_raw(truck(10.0, 20.0, 30.0, true, None)).unwrap();
        log.clear();

        let applied = store.apply_raw(truck(10.1, 20.1, 50.0, true, None)).unwrap();
        assert_eq!(
            applied,
            Applied::Updated {
                status_changed: false
            }
        );
        let names: Vec<_> = log.commands().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["move_marker", "set_marker_content"]);
    }

    #[test]
    fn only_first_vehicle_focuses_viewport() {
        let (mut store, log) = store();
        for (i, id) in ["A", "B", "C"].iter().enumerate() {
            store
                .apply_raw(json!({
                    "id": id, "lat": i as f64, "lng": 0.0,
                    "speed": 0.0, "ignition": false
                }))
                .unwrap();
        }

        assert_eq!(store.len(), 3);
        assert_eq!(log.count("create_marker"), 3);
        assert_eq!(log.count("focus_viewport"), 1);
    }

    #[test]
    fn one_state_per_id_regardless_of_update_count() {
        let (mut store, log) = store();
        for i in 0..50 {
            store
                .apply_raw(truck(1.0, 1.0 + i as f64 * 0.01, i as f64, i % 3 != 0, None))
                .unwrap();
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"V1".into()).unwrap().update_count, 50);
        assert_eq!(log.count("create_marker"), 1);
    }

    #[test]
    fn missing_id_is_rejected_without_side_effects() {
        let (mut store, log) = store();
        store.apply_raw(truck(10.0, 20.0, 0.0, true, None)).unwrap();
        log.clear();

        let err = store
            .apply_raw(json!({"lat": 1.0, "lng": 2.0, "speed": 0, "ignition": true}))
            .unwrap_err();
        assert!(matches!(err, FleetError::InvalidUpdate(_)));

        assert_eq!(store.len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn invalid_payload_on_empty_store_does_not_consume_focus() {
        let (mut store, log) = store();
        assert!(store.apply_raw(json!({"id": "V9", "lat": "north"})).is_err());
        assert!(store.is_empty());
        assert!(log.is_empty());

        store.apply_raw(truck(10.0, 20.0, 0.0, true, None)).unwrap();
        assert_eq!(log.count("focus_viewport"), 1);
    }

    #[test]
    fn out_of_range_update_leaves_existing_state() {
        let (mut store, _log) = store();
        store.apply_raw(truck(10.0, 20.0, 0.0, true, None)).unwrap();

        let err = store.apply_raw(truck(123.0, 20.0, 0.0, true, None)).unwrap_err();
        assert!(matches!(err, FleetError::InvalidCoordinates { .. }));
        assert_eq!(
            store.get(&"V1".into()).unwrap().position,
            Coordinates::new(10.0, 20.0)
        );
    }

    #[test]
    fn status_counts_summary() {
        let (mut store, _log) = store();
        let updates = [
            ("A", 10.0, true),
            ("B", 0.0, true),
            ("C", 0.0, false),
            ("D", 5.0, false),
        ];
        for (id, speed, ignition) in updates {
            store
                .apply_raw(json!({
                    "id": id, "lat": 0.0, "lng": 0.0,
                    "speed": speed, "ignition": ignition
                }))
                .unwrap();
        }
        let counts = store.status_counts();
        assert_eq!(
            counts,
            StatusCounts {
                moving: 1,
                idle: 1,
                stopped: 2
            }
        );
        assert_eq!(counts.to_string(), "4 vehicles (1 moving, 1 idle, 2 stopped)");
    }

    #[test]
    fn custom_focus_zoom() {
        let (renderer, log) = RecordingRenderer::recording();
        let mut store = VehicleStateStore::with_config(renderer, StoreConfig { focus_zoom: 16 });
        store.apply_raw(truck(1.0, 2.0, 0.0, true, None)).unwrap();
        assert!(log
            .commands()
            .contains(&RenderCommand::FocusViewport {
                position: Coordinates::new(1.0, 2.0),
                zoom: 16
            }));
    }

    #[test]
    fn independent_stores_do_not_share_state() {
        let (mut a, log_a) = store();
        let (mut b, log_b) = store();
        a.apply_raw(truck(1.0, 1.0, 0.0, true, None)).unwrap();
        b.apply_raw(truck(2.0, 2.0, 0.0, true, None)).unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(log_a.count("focus_viewport"), 1);
        assert_eq!(log_b.count("focus_viewport"), 1);
    }
}
