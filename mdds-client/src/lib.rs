//! MDDS Client - submit linear systems to a remote solving service
//!
//! This crate provides:
//! - Parsing of comma/whitespace delimited matrices and vectors with
//!   row/column level error reporting
//! - Solve request construction for the service's solver catalog
//! - An HTTP client for submitting tasks and querying their status
//! - A bounded, cancellable polling engine that follows a task to completion
//! - Conversion of finished solutions into downloadable CSV/JSON artifacts

pub mod artifact;
pub mod parser;
pub mod poller;
pub mod request;
pub mod service;
pub mod session;
pub mod task;

pub use artifact::{materialize, Artifact, ArtifactFormat};
pub use parser::{parse_matrix, parse_vector, Matrix, ParseError, Vector};
pub use poller::{PollConfig, Poller};
pub use request::{SolveRequest, SolverMethod};
pub use service::{HttpSolverService, ServiceError, SolverService};
pub use session::{SessionError, SolveSession};
pub use task::{Task, TaskId, TaskState};

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading client configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the client
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ClientConfig {
    /// Base URL of the solving service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Wait between status queries (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up on a task this long after submission (s)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for a single HTTP request (s)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Solver used when none is given on the command line
    #[serde(default)]
    pub default_method: SolverMethod,

    /// Serialization of the downloaded solution
    #[serde(default)]
    pub artifact_format: ArtifactFormat,
}

fn default_base_url() -> String { "http://localhost:8080".to_string() }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_timeout_secs() -> u64 { 30 }
fn default_request_timeout_secs() -> u64 { 10 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            default_method: SolverMethod::default(),
            artifact_format: ArtifactFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Load and validate a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        if self.poll_interval_ms >= self.timeout_secs.saturating_mul(1000) {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be shorter than timeout_secs".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
