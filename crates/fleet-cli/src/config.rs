//! Configuration file handling for fleet-watch

use anyhow::{Context, Result};
use clap::ValueEnum;
use fleet_client::{feed_url_from_origin, ConnectionConfig, SessionConfig};
use fleet_core::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::output::OutputFormat;

/// Origin used when neither flags nor config name one
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Origin of the page hosting the map
    pub origin: Option<String>,
    /// Explicit feed URL, takes precedence over `origin`
    pub url: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Seconds to wait before reconnecting
    pub retry_delay: Option<u64>,
    /// Capacity of the event channel
    pub channel_capacity: Option<usize>,
    /// Zoom level for the first-vehicle focus
    pub focus_zoom: Option<u8>,
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct CliOverrides<'a> {
    pub origin: Option<&'a str>,
    pub url: Option<&'a str>,
    pub output: Option<OutputFormat>,
    pub no_color: bool,
    pub retry_delay: Option<u64>,
    pub focus_zoom: Option<u8>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("fleet-watch");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: &CliOverrides<'_>) -> MergedConfig {
        let output = args.output.or_else(|| {
            self.output.as_deref().and_then(|value| {
                let parsed = OutputFormat::from_str(value, true).ok();
                if parsed.is_none() {
                    tracing::warn!(value, "Unknown output format in config, using default");
                }
                parsed
            })
        });

        let defaults = SessionConfig::default();
        MergedConfig {
            origin: args
                .origin
                .map(String::from)
                .or_else(|| self.origin.clone())
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            url: args.url.map(String::from).or_else(|| self.url.clone()),
            output: output.unwrap_or_default(),
            no_color: args.no_color || self.no_color.unwrap_or(false),
            retry_delay: args
                .retry_delay
                .or(self.retry_delay)
                .map(Duration::from_secs)
                .unwrap_or(defaults.connection.retry_delay),
            channel_capacity: self
                .channel_capacity
                .unwrap_or(defaults.connection.channel_capacity),
            focus_zoom: args
                .focus_zoom
                .or(self.focus_zoom)
                .unwrap_or(defaults.store.focus_zoom),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub origin: String,
    pub url: Option<String>,
    pub output: OutputFormat,
    pub no_color: bool,
    pub retry_delay: Duration,
    pub channel_capacity: usize,
    pub focus_zoom: u8,
}

impl MergedConfig {
    /// The feed to subscribe to: the explicit URL, or the one derived from the origin
    pub fn feed_url(&self) -> Result<Url> {
        match &self.url {
            Some(url) => Url::parse(url).with_context(|| format!("Invalid feed URL: {}", url)),
            None => feed_url_from_origin(&self.origin)
                .with_context(|| format!("Cannot derive feed URL from origin {}", self.origin)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connection: ConnectionConfig {
                retry_delay: self.retry_delay,
                channel_capacity: self.channel_capacity,
            },
            store: StoreConfig {
                focus_zoom: self.focus_zoom,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
origin = "https://fleet.example.com"
output = "json"
retry_delay = 2
focus_zoom = 11
"#,
        );

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.origin.as_deref(), Some("https://fleet.example.com"));
        assert_eq!(config.output.as_deref(), Some("json"));
        assert_eq!(config.retry_delay, Some(2));
        assert_eq!(config.focus_zoom, Some(11));
        assert_eq!(config.url, None);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let file = write_config("retry_delay = \"soon\"");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(Config::load_from(Path::new("/nonexistent/fleet-watch.toml")).is_err());
    }

    #[test]
    fn test_merge_defaults() {
        let merged = Config::default().merge_with_args(&CliOverrides::default());

        assert_eq!(merged.origin, DEFAULT_ORIGIN);
        assert_eq!(merged.output, OutputFormat::Log);
        assert_eq!(merged.session_config(), SessionConfig::default());
        assert_eq!(
            merged.feed_url().unwrap().as_str(),
            "ws://localhost:8000/ws/fleet/live/"
        );
    }

    #[test]
    fn test_args_override_file() {
        let config = Config {
            origin: Some("http://file.example.com".to_string()),
            output: Some("log".to_string()),
            retry_delay: Some(9),
            focus_zoom: Some(4),
            channel_capacity: Some(16),
            ..Config::default()
        };
        let merged = config.merge_with_args(&CliOverrides {
            origin: Some("https://cli.example.com"),
            output: Some(OutputFormat::Json),
            retry_delay: Some(1),
            ..CliOverrides::default()
        });

        assert_eq!(merged.output, OutputFormat::Json);
        assert_eq!(merged.retry_delay, Duration::from_secs(1));
        assert_eq!(merged.focus_zoom, 4);
        assert_eq!(merged.channel_capacity, 16);
        assert_eq!(
            merged.feed_url().unwrap().as_str(),
            "wss://cli.example.com/ws/fleet/live/"
        );
    }

    #[test]
    fn test_explicit_url_wins_over_origin() {
        let config = Config {
            url: Some("ws://10.0.0.5:9000/custom/feed".to_string()),
            ..Config::default()
        };
        let merged = config.merge_with_args(&CliOverrides {
            origin: Some("https://fleet.example.com"),
            ..CliOverrides::default()
        });

        assert_eq!(
            merged.feed_url().unwrap().as_str(),
            "ws://10.0.0.5:9000/custom/feed"
        );
    }

    #[test]
    fn test_unknown_output_in_file_falls_back() {
        let config = Config {
            output: Some("yaml".to_string()),
            ..Config::default()
        };
        let merged = config.merge_with_args(&CliOverrides::default());
        assert_eq!(merged.output, OutputFormat::Log);
    }

    #[test]
    fn test_invalid_origin_is_reported() {
        let merged = Config::default().merge_with_args(&CliOverrides {
            origin: Some("not a url"),
            ..CliOverrides::default()
        });
        assert!(merged.feed_url().is_err());
    }
}
