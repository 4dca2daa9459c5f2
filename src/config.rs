//! Client configuration.
//!
//! Loaded from defaults, a YAML file or `TQ42_*` environment variables.
//! The default project replaces any process-wide "current project" state:
//! list and create operations fall back to it when no project id is given.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tonic::metadata::{Ascii, MetadataValue};

use crate::error::{Result, SdkError};

#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// gRPC endpoint, e.g. "https://api.tq42.com"
    #[serde(default = "default_host")]
    pub host: String,

    /// Bearer token forwarded on every request
    #[serde(default)]
    pub access_token: Option<String>,

    /// Project used when an operation is called without one
    #[serde(default)]
    pub default_project_id: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("default_project_id", &self.default_project_id)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

fn default_host() -> String {
    "https://api.tq42.com".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: default_host(),
            access_token: None,
            default_project_id: None,
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> std::result::Result<Self, ConfigError> {
        let config: ClientConfig =
            serde_yaml_ng::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = ClientConfig::default();

        if let Ok(host) = std::env::var("TQ42_HOST") {
            config.host = host;
        }
        if let Ok(token) = std::env::var("TQ42_ACCESS_TOKEN") {
            config.access_token = Some(token);
        }
        if let Ok(project) = std::env::var("TQ42_PROJECT_ID") {
            config.default_project_id = Some(project);
        }
        if let Ok(timeout) = std::env::var("TQ42_CONNECT_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                config.connect_timeout_seconds = val;
            }
        }
        if let Ok(timeout) = std::env::var("TQ42_REQUEST_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                config.request_timeout_seconds = val;
            }
        }

        config
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "host must be an http:// or https:// URI, got {:?}",
                self.host
            )));
        }
        if self.connect_timeout_seconds == 0 || self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        self.authorization_header()?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub(crate) fn authorization_header(
        &self,
    ) -> std::result::Result<Option<MetadataValue<Ascii>>, ConfigError> {
        match self.access_token.as_deref() {
            None | Some("") => Ok(None),
            Some(token) => format!("Bearer {token}")
                .parse::<MetadataValue<Ascii>>()
                .map(Some)
                .map_err(|_| {
                    ConfigError::Invalid("access token is not valid ASCII metadata".to_string())
                }),
        }
    }

    /// Pick the project an operation runs against.
    ///
    /// An explicit, non-empty id wins over the configured default.
    pub fn resolve_project(&self, project_id: Option<&str>) -> Result<String> {
        project_id
            .filter(|id| !id.is_empty())
            .or_else(|| self.default_project_id.as_deref().filter(|id| !id.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| {
                SdkError::Usage(
                    "no project id given and no default project configured".to_string(),
                )
            })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
