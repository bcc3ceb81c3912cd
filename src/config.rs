//! Configuration module for send-assessment-test.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::request::{RequestKind, TestRecord, TestRequest};
use crate::sender::Target;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the test request sender
#[derive(Parser, Debug)]
#[command(name = "send-assessment-test")]
#[command(author = "send-assessment-test authors")]
#[command(version = "0.1.0")]
#[command(
    about = "Send an assessment test request to a local metadig controller",
    long_about = None
)]
pub struct CliArgs {
    /// Controller port (default 33000)
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Controller host
    #[arg(long)]
    pub host: Option<String>,

    /// Request kind (quality or graph)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Identifier of a document to assess; repeat for several documents
    #[arg(short, long = "identifier")]
    pub identifiers: Vec<String>,

    /// Directory holding the <id>.xml and <id>.sm test documents
    #[arg(long)]
    pub test_dir: Option<String>,

    /// Assessment suite to run
    #[arg(long)]
    pub suite_id: Option<String>,

    /// Originating node identifier
    #[arg(long)]
    pub node_id: Option<String>,

    /// Give up connecting after this many milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Print the request to stdout instead of connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller connection configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: None,
        }
    }
}

/// Request contents
#[derive(Debug, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_suite_id")]
    pub suite_id: String,
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default = "default_test_dir")]
    pub test_dir: String,
    #[serde(default = "default_identifiers")]
    pub identifiers: Vec<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            suite_id: default_suite_id(),
            node_id: default_node_id(),
            test_dir: default_test_dir(),
            identifiers: default_identifiers(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    33000
}

fn default_kind() -> String {
    "quality".to_string()
}

fn default_suite_id() -> String {
    "test.suite".to_string()
}

fn default_node_id() -> String {
    "urn:node:ARCTIC".to_string()
}

fn default_test_dir() -> String {
    "./src/test/resources/test-docs".to_string()
}

fn default_identifiers() -> Vec<String> {
    vec!["doi:10.18739/A2W08WG3R".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Option<Duration>,
    pub kind: RequestKind,
    pub identifiers: Vec<String>,
    pub test_dir: String,
    pub suite_id: String,
    pub node_id: String,
    pub dry_run: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments against the optional TOML file.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let kind_tag = cli.kind.unwrap_or(toml_config.request.kind);
        let kind = kind_tag
            .parse::<RequestKind>()
            .map_err(ConfigError::InvalidKind)?;

        Ok(Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            connect_timeout: cli
                .connect_timeout_ms
                .or(toml_config.server.connect_timeout_ms)
                .map(Duration::from_millis),
            kind,
            identifiers: if cli.identifiers.is_empty() {
                toml_config.request.identifiers
            } else {
                cli.identifiers
            },
            test_dir: cli.test_dir.unwrap_or(toml_config.request.test_dir),
            suite_id: cli.suite_id.unwrap_or(toml_config.request.suite_id),
            node_id: cli.node_id.unwrap_or(toml_config.request.node_id),
            dry_run: cli.dry_run,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// Connection target for the sender.
    pub fn target(&self) -> Target {
        Target {
            host: self.host.clone(),
            port: self.port,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Build the request described by this configuration.
    pub fn request(&self) -> TestRequest {
        let records = self
            .identifiers
            .iter()
            .map(|id| TestRecord::for_document(id, &self.test_dir, &self.suite_id, &self.node_id))
            .collect();
        TestRequest::new(self.kind, records)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidKind(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidKind(kind) => {
                write!(f, "Unknown request kind '{}' (expected quality or graph)", kind)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
