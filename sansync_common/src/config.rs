//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all SanSync binaries and embedders.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sansync_common::config::{ConfigLoader, SanSyncConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = SanSyncConfig::load(Path::new("sansync.toml"))?;
//!     config.validate()?;
//!     println!("Segment: {}", config.segment.name);
//!     Ok(())
//! }
//! ```

use crate::shm::consts::{DEFAULT_DRAIN_INTERVAL_MS, DEFAULT_SEGMENT_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the segment name.
pub const ENV_SEGMENT_NAME: &str = "SHARED_MEMORY_NAME";

/// Environment variable pointing at a TOML configuration file.
pub const ENV_CONFIG_PATH: &str = "SANSYNC_CONFIG";

/// Accepted drain interval range in milliseconds.
const DRAIN_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=1000;

/// Error type for configuration loading operations.
///
/// This enum represents all possible errors that can occur when loading
/// configuration files.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Represents the verbosity level of logging output.
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Who may open the segment once it has been created.
///
/// The segment is a same-host rendezvous, not a security boundary. The
/// default grants every local principal read/write access so that an
/// unprivileged consumer can attach to a segment created inside another
/// user's process. Deployments that are not fully trusted local IPC should
/// narrow this to `group` or `owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    /// Owner, group and everyone else get read/write.
    #[default]
    Everyone,
    /// Owner and group get read/write.
    Group,
    /// Only the owning user gets read/write.
    Owner,
}

/// Common configuration fields shared across all SanSync applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sansync-host"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "sansync".to_string(),
        }
    }
}

/// Segment rendezvous settings.
///
/// # TOML Example
///
/// ```toml
/// [segment]
/// name = "GTAVCoopSharedMem"
/// access_policy = "everyone"
/// drain_interval_ms = 50
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Well-known segment name, without the leading `/`.
    #[serde(default = "default_segment_name")]
    pub name: String,

    /// Permissions applied to a newly created segment.
    #[serde(default)]
    pub access_policy: AccessPolicy,

    /// Drain loop polling interval in milliseconds.
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
}

fn default_segment_name() -> String {
    DEFAULT_SEGMENT_NAME.to_string()
}

fn default_drain_interval_ms() -> u64 {
    DEFAULT_DRAIN_INTERVAL_MS
}

impl SegmentConfig {
    /// Drain interval as a `Duration`.
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `name` is empty or contains `/` or NUL
    /// - `drain_interval_ms` is outside 1..=1000
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name.strip_prefix('/').unwrap_or(&self.name);
        if name.is_empty() {
            return Err(ConfigError::ValidationError(
                "segment name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\0') {
            return Err(ConfigError::ValidationError(format!(
                "segment name '{}' must not contain '/' or NUL",
                self.name
            )));
        }
        if !DRAIN_INTERVAL_RANGE_MS.contains(&self.drain_interval_ms) {
            return Err(ConfigError::ValidationError(format!(
                "drain_interval_ms {} outside {:?}",
                self.drain_interval_ms, DRAIN_INTERVAL_RANGE_MS
            )));
        }
        Ok(())
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            name: default_segment_name(),
            access_policy: AccessPolicy::default(),
            drain_interval_ms: default_drain_interval_ms(),
        }
    }
}

/// Full SanSync configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanSyncConfig {
    /// Common fields.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Segment rendezvous settings.
    #[serde(default)]
    pub segment: SegmentConfig,
}

impl SanSyncConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.segment.validate()
    }

    /// Apply `SHARED_MEMORY_NAME` if it is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var(ENV_SEGMENT_NAME) {
            if !name.is_empty() {
                self.segment.name = name;
            }
        }
    }

    /// Build the configuration used by embedders that cannot pass arguments.
    ///
    /// Loads the file named by `SANSYNC_CONFIG` when set (defaults otherwise),
    /// applies environment overrides and validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.is_empty() => Self::load(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
