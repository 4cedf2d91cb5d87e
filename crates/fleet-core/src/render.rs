//! MarkerRenderer trait - the seam to the external map
//!
//! The store never draws anything itself. It issues marker commands through
//! this trait and keeps whatever handle the renderer hands back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Coordinates, MarkerContent, MarkerVariant};

/// Rendering collaborator driven by [`crate::VehicleStateStore`]
///
/// Implementations own the markers; the store only holds their handles.
/// Methods are infallible: a renderer that can fail must deal with it
/// internally, since reconciliation state is authoritative either way.
pub trait MarkerRenderer: Send {
    /// Opaque reference to a marker created by this renderer
    type Handle: Clone + fmt::Debug + Send;

    /// Create a marker at `position` and return its handle
    fn create_marker(
        &mut self,
        position: Coordinates,
        variant: MarkerVariant,
        content: &MarkerContent,
    ) -> Self::Handle;

    /// Move an existing marker
    fn move_marker(&mut self, handle: &Self::Handle, position: Coordinates);

    /// Swap the visual variant of an existing marker
    fn set_marker_variant(&mut self, handle: &Self::Handle, variant: MarkerVariant);

    /// Replace the descriptive content of an existing marker
    fn set_marker_content(&mut self, handle: &Self::Handle, content: &MarkerContent);

    /// Center the viewport on `position` at `zoom`
    fn focus_viewport(&mut self, position: Coordinates, zoom: u8);
}

/// Sequential marker identifier handed out by [`CommandRenderer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A single marker operation, as serialized for external front-ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RenderCommand {
    CreateMarker {
        marker: MarkerId,
        position: Coordinates,
        variant: MarkerVariant,
        content: MarkerContent,
    },
    MoveMarker {
        marker: MarkerId,
        position: Coordinates,
    },
    SetMarkerVariant {
        marker: MarkerId,
        variant: MarkerVariant,
    },
    SetMarkerContent {
        marker: MarkerId,
        content: MarkerContent,
    },
    FocusViewport {
        position: Coordinates,
        zoom: u8,
    },
}

impl RenderCommand {
    /// Short command name, matching the serialized tag
    pub fn name(&self) -> &'static str {
        match self {
            RenderCommand::CreateMarker { .. } => "create_marker",
            RenderCommand::MoveMarker { .. } => "move_marker",
            RenderCommand::SetMarkerVariant { .. } => "set_marker_variant",
            RenderCommand::SetMarkerContent { .. } => "set_marker_content",
            RenderCommand::FocusViewport { .. } => "focus_viewport",
        }
    }
}

/// Destination for render commands
pub trait CommandSink: Send {
    fn emit(&mut self, command: RenderCommand);
}

impl<F> CommandSink for F
where
    F: FnMut(RenderCommand) + Send,
{
    fn emit(&mut self, command: RenderCommand) {
        self(command)
    }
}

/// Renderer that turns every marker operation into a [`RenderCommand`]
///
/// Used when the actual map lives elsewhere (another process, a browser)
/// and only needs a command stream.
pub struct CommandRenderer<S> {
    next_marker: u64,
    sink: S,
}

impl<S: CommandSink> CommandRenderer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            next_marker: 1,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: CommandSink> MarkerRenderer for CommandRenderer<S> {
    type Handle = MarkerId;

    fn create_marker(
        &mut self,
        position: Coordinates,
        variant: MarkerVariant,
        content: &MarkerContent,
    ) -> MarkerId {
        let marker = MarkerId(self.next_marker);
        self.next_marker += 1;
        self.sink.emit(RenderCommand::CreateMarker {
            marker,
            position,
            variant,
            content: content.clone(),
        });
        marker
    }

    fn move_marker(&mut self, handle: &MarkerId, position: Coordinates) {
        self.sink.emit(RenderCommand::MoveMarker {
            marker: *handle,
            position,
        });
    }

    fn set_marker_variant(&mut self, handle: &MarkerId, variant: MarkerVariant) {
        self.sink.emit(RenderCommand::SetMarkerVariant {
            marker: *handle,
            variant,
        });
    }

    fn set_marker_content(&mut self, handle: &MarkerId, content: &MarkerContent) {
        self.sink.emit(RenderCommand::SetMarkerContent {
            marker: *handle,
            content: content.clone(),
        });
    }

    fn focus_viewport(&mut self, position: Coordinates, zoom: u8) {
        self.sink.emit(RenderCommand::FocusViewport { position, zoom });
    }
}
