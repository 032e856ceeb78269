//! Client configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file (`--config` or `~/.config/jobctl/config.toml`)
//! 3. Environment and CLI flags (`JOBCTL_HOST`, `JOBCTL_TOKEN`, `--host`, ...)

mod client;
mod defaults;
mod merge;

pub use client::{
    default_config_path, CliOverrides, ClientConfig, ConfigError, ConfigOrigin, ConfigSource,
    HttpSettings, LoggingSettings, PollSettings, TimeoutSettings,
};
pub use merge::{deep_merge, merge_layers};
