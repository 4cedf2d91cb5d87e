//! Output formatting for fleet-watch (log lines, json)

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use fleet_core::{CommandSink, MarkerRenderer, MarkerVariant, RenderCommand, VehicleStateStore};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable line per render command (default)
    #[default]
    Log,
    /// One JSON object per render command
    Json,
}

/// Context for output rendering
///
/// Acts as the sink of the command renderer, so every marker operation the
/// store issues is printed as it happens.
#[derive(Debug, Clone, Copy)]
pub struct OutputContext {
    pub format: OutputFormat,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format }
    }

    /// Print one render command in the configured format
    pub fn print_command(&self, command: &RenderCommand) {
        match self.format {
            OutputFormat::Log => println!("{}", format_command(command)),
            OutputFormat::Json => match serde_json::to_string(command) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!(error = %e, "Failed to serialize render command"),
            },
        }
    }

    /// Print the last-known state of every vehicle
    pub fn print_summary<R: MarkerRenderer>(&self, store: &VehicleStateStore<R>) {
        let rows = vehicle_rows(store);
        match self.format {
            OutputFormat::Log => {
                println!();
                println!("{}", store.status_counts().to_string().bold());
                if !rows.is_empty() {
                    println!("{}", Table::new(&rows));
                }
            }
            OutputFormat::Json => {
                let summary = serde_json::json!({
                    "summary": store.status_counts(),
                    "vehicles": rows,
                });
                println!("{}", summary);
            }
        }
    }
}

impl CommandSink for OutputContext {
    fn emit(&mut self, command: RenderCommand) {
        self.print_command(&command);
    }
}

/// One row of the exit summary
#[derive(Debug, Clone, PartialEq, Tabled, Serialize)]
pub struct VehicleRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Position")]
    pub position: String,
    #[tabled(rename = "Speed")]
    pub speed: String,
    #[tabled(rename = "Ignition")]
    pub ignition: String,
    #[tabled(rename = "Score")]
    pub score: String,
    #[tabled(rename = "Updates")]
    pub updates: u64,
}

/// Summary rows sorted by vehicle id
pub fn vehicle_rows<R: MarkerRenderer>(store: &VehicleStateStore<R>) -> Vec<VehicleRow> {
    let mut rows: Vec<VehicleRow> = store
        .iter()
        .map(|state| VehicleRow {
            id: state.id.to_string(),
            name: state.name.clone(),
            status: state.status.to_string(),
            position: state.position.to_string(),
            speed: format!("{} km/h", state.speed.round()),
            ignition: if state.ignition { "ON" } else { "OFF" }.to_string(),
            score: state.score.map(|s| s.to_string()).unwrap_or_default(),
            updates: state.update_count,
        })
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

/// Human-readable form of a render command
pub fn format_command(command: &RenderCommand) -> String {
    match command {
        RenderCommand::CreateMarker {
            marker,
            position,
            variant,
            content,
        } => format!(
            "{} create  {} {} {}",
            marker,
            position,
            paint(*variant),
            content
        ),
        RenderCommand::MoveMarker { marker, position } => {
            format!("{} move    {}", marker, position)
        }
        RenderCommand::SetMarkerVariant { marker, variant } => {
            format!("{} variant {}", marker, paint(*variant))
        }
        RenderCommand::SetMarkerContent { marker, content } => {
            format!("{} content {}", marker, content)
        }
        RenderCommand::FocusViewport { position, zoom } => {
            format!("focus      {} zoom {}", position, zoom)
        }
    }
}

fn paint(variant: MarkerVariant) -> ColoredString {
    match variant {
        MarkerVariant::Online => variant.as_str().green(),
        MarkerVariant::Idle => variant.as_str().yellow(),
        MarkerVariant::Offline => variant.as_str().red(),
    }
}
