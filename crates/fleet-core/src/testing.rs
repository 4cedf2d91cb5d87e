//! Test utilities for fleet-core
//!
//! Provides a renderer that records every marker command so tests can assert
//! on exactly what the store asked the map to do.
//!
//! ```
//! use fleet_core::testing::RecordingRenderer;
//! use fleet_core::VehicleStateStore;
//!
//! let (renderer, log) = RecordingRenderer::recording();
//! let mut store = VehicleStateStore::new(renderer);
//! store
//!     .apply_raw(serde_json::json!({
//!         "id": "V1", "lat": 10.0, "lng": 20.0, "name": "Truck",
//!         "speed": 0.0, "ignition": true
//!     }))
//!     .unwrap();
//! assert_eq!(log.count("create_marker"), 1);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::render::{CommandRenderer, CommandSink, RenderCommand};

/// Shared, cloneable log of render commands
///
/// Clones share the same buffer, so a test can keep one while the renderer
/// (and the store that owns it) moves into a task.
#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    commands: Arc<Mutex<Vec<RenderCommand>>>,
}

impl RenderLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded commands, oldest first
    pub fn commands(&self) -> Vec<RenderCommand> {
        self.commands.lock().clone()
    }

    /// Number of recorded commands with the given name (e.g. `"move_marker"`)
    pub fn count(&self, name: &str) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.name() == name)
            .count()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl CommandSink for RenderLog {
    fn emit(&mut self, command: RenderCommand) {
        self.commands.lock().push(command);
    }
}

/// Renderer that records commands into a [`RenderLog`]
pub type RecordingRenderer = CommandRenderer<RenderLog>;

impl RecordingRenderer {
    /// Create a recording renderer and a handle to its log
    pub fn recording() -> (Self, RenderLog) {
        let log = RenderLog::new();
        (CommandRenderer::new(log.clone()), log)
    }
}
