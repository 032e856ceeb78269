//! Merged client configuration with provenance

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

use super::defaults::builtin_layer;
use super::merge::merge_layers;
use crate::logging::LogFormat;
use crate::poll::PollConfig;
use crate::resource::ResourceTimeouts;
use crate::transport::HttpTransportConfig;

/// Longest accepted create/update deadline (24h)
const MAX_RESOURCE_TIMEOUT_SECONDS: u64 = 86_400;

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub create_seconds: u64,
    pub update_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

/// Client configuration after all layers are merged
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Workspace URL
    pub host: Option<String>,
    /// Bearer token
    pub token: Option<String>,
    pub http: HttpSettings,
    pub poll: PollSettings,
    pub timeouts: TimeoutSettings,
    pub logging: LoggingSettings,

    /// Contributing layers in precedence order
    #[serde(skip)]
    pub sources: Vec<ConfigSource>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("http", &self.http)
            .field("poll", &self.poll)
            .field("timeouts", &self.timeouts)
            .field("logging", &self.logging)
            .field("sources", &self.sources)
            .finish()
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub token: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl CliOverrides {
    /// Convert to a merge layer, leaving out unset values
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        if let Some(host) = &self.host {
            root.insert("host".to_string(), Value::String(host.clone()));
        }
        if let Some(token) = &self.token {
            root.insert("token".to_string(), Value::String(token.clone()));
        }

        let mut logging = Map::new();
        if let Some(level) = &self.log_level {
            logging.insert("level".to_string(), Value::String(level.clone()));
        }
        if let Some(format) = self.log_format {
            logging.insert("format".to_string(), Value::String(format.as_str().to_string()));
        }
        if !logging.is_empty() {
            root.insert("logging".to_string(), Value::Object(logging));
        }
        Value::Object(root)
    }

    fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.token.is_none()
            && self.log_level.is_none()
            && self.log_format.is_none()
    }
}

/// `~/.config/jobctl/config.toml`, if a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/jobctl/config.toml"))
}

impl ClientConfig {
    /// Merge built-in defaults, an optional TOML file and CLI overrides.
    ///
    /// A file that does not exist is skipped unless `required` is set.
    pub fn load(
        file: Option<&Path>,
        required: bool,
        overrides: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![builtin_layer()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = file {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            } else if required {
                return Err(ConfigError::Io(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
        }

        if !overrides.is_empty() {
            layers.push(overrides.to_value());
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let mut config: ClientConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::Parse(format!("invalid configuration: {e}")))?;
        config.sources = sources;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::Parse(format!("{}: invalid UTF-8: {e}", path.display())))?;
        let value: Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: TOML parse error: {e}", path.display())))?;

        Ok((value, digest))
    }

    /// Bounds-check every setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        let http = &self.http;
        if http.request_timeout_seconds == 0 || http.request_timeout_seconds > 3600 {
            return Err(ConfigError::Validation(format!(
                "http.request_timeout_seconds must be in 1..=3600, got {}",
                http.request_timeout_seconds
            )));
        }
        if http.connect_timeout_seconds == 0 || http.connect_timeout_seconds > 300 {
            return Err(ConfigError::Validation(format!(
                "http.connect_timeout_seconds must be in 1..=300, got {}",
                http.connect_timeout_seconds
            )));
        }
        if http.retry_initial_delay_ms == 0 || http.retry_initial_delay_ms > http.retry_max_delay_ms {
            return Err(ConfigError::Validation(format!(
                "http.retry_initial_delay_ms must be in 1..={}, got {}",
                http.retry_max_delay_ms, http.retry_initial_delay_ms
            )));
        }

        let poll = &self.poll;
        if poll.initial_interval_ms == 0 || poll.initial_interval_ms > poll.max_interval_ms {
            return Err(ConfigError::Validation(format!(
                "poll.initial_interval_ms must be in 1..={}, got {}",
                poll.max_interval_ms, poll.initial_interval_ms
            )));
        }

        for (name, value) in [
            ("timeouts.create_seconds", self.timeouts.create_seconds),
            ("timeouts.update_seconds", self.timeouts.update_seconds),
        ] {
            if value == 0 || value > MAX_RESOURCE_TIMEOUT_SECONDS {
                return Err(ConfigError::Validation(format!(
                    "{name} must be in 1..={MAX_RESOURCE_TIMEOUT_SECONDS}, got {value}"
                )));
            }
        }

        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Validation(format!(
                "logging.level {:?} is not a valid filter: {e}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Host, or an error naming how to set it
    pub fn require_host(&self) -> Result<&str, ConfigError> {
        match self.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => Ok(host),
            _ => Err(ConfigError::Validation(
                "no host configured: set `host` in the config file, JOBCTL_HOST or --host"
                    .to_string(),
            )),
        }
    }

    pub fn http_transport_config(&self) -> Result<HttpTransportConfig, ConfigError> {
        Ok(HttpTransportConfig {
            host: self.require_host()?.to_string(),
            token: self.token.clone(),
            request_timeout: Duration::from_secs(self.http.request_timeout_seconds),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_seconds),
            max_retries: self.http.max_retries,
            retry_initial_delay: Duration::from_millis(self.http.retry_initial_delay_ms),
            retry_max_delay: Duration::from_millis(self.http.retry_max_delay_ms),
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_millis(self.poll.initial_interval_ms),
            max_interval: Duration::from_millis(self.poll.max_interval_ms),
        }
    }

    pub fn resource_timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts {
            create: Duration::from_secs(self.timeouts.create_seconds),
            update: Duration::from_secs(self.timeouts.update_seconds),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),
}
