//! # Settings Module
//!
//! Layered settings for survey-hooks front ends.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. `/etc/survey-hooks/settings.yaml` (optional)
//! 3. `config/settings.yaml` relative to the working directory (optional)
//! 4. an explicit file passed by the caller (required when given; format
//!    taken from the extension)
//! 5. environment variables prefixed `SURVEY_HOOKS__`, with `__` separating
//!    nested keys, e.g. `SURVEY_HOOKS__PROBE__TIMEOUT_SECONDS=5`
//!
//! Every field carries a serde default, so an unconfigured environment yields
//! a usable configuration. A malformed file or a value that cannot be coerced
//! is a hard error.

use crate::{
    probe::ProbeConfig,
    triggers::{TriggerCatalog, DEFAULT_TRIGGERS},
    EnvironmentId, PrincipalId,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "SURVEY_HOOKS";

const SYSTEM_SETTINGS: &str = "/etc/survey-hooks/settings";
const LOCAL_SETTINGS: &str = "config/settings";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete settings tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub probe: ProbeConfig,
    pub triggers: TriggerConfig,
    pub storage: StorageConfig,
    pub access: AccessConfig,
    pub logging: LoggingConfig,
}

/// Trigger catalog offered to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub catalog: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_TRIGGERS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Location of the filesystem store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Static membership table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub grants: Vec<MembershipGrant>,
}

/// Environments a principal holds an access role on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipGrant {
    pub principal: String,
    #[serde(default)]
    pub environments: Vec<String>,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Settings {
    /// Load settings from all layered sources
    ///
    /// # Errors
    /// - `ConfigError::Load` - A file is malformed, the explicit file is
    ///   missing, or a value cannot be coerced
    /// - `ConfigError::Invalid` - The merged settings fail validation
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name(SYSTEM_SETTINGS)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name(LOCAL_SETTINGS)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Some(path) = explicit {
            info!(path = %path.display(), "Loading settings from explicit path");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!(
            data_dir = %settings.storage.data_dir.display(),
            triggers = settings.triggers.catalog.len(),
            grants = settings.access.grants.len(),
            "Settings loaded"
        );

        Ok(settings)
    }

    /// Check cross-field rules serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "probe.timeout_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        self.trigger_catalog()?;
        self.membership_grants()?;

        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "storage.data_dir".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid {
                field: "logging.level".to_string(),
                message: format!(
                    "'{}' is not one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }

    /// Build the configured trigger catalog
    pub fn trigger_catalog(&self) -> Result<TriggerCatalog, ConfigError> {
        TriggerCatalog::from_tags(&self.triggers.catalog).map_err(|e| ConfigError::Invalid {
            field: "triggers.catalog".to_string(),
            message: e.to_string(),
        })
    }

    /// Flatten the membership table into (principal, environment) pairs
    pub fn membership_grants(&self) -> Result<Vec<(PrincipalId, EnvironmentId)>, ConfigError> {
        let mut pairs = Vec::new();

        for grant in &self.access.grants {
            let principal = PrincipalId::new(grant.principal.as_str()).map_err(|e| {
                ConfigError::Invalid {
                    field: "access.grants.principal".to_string(),
                    message: e.to_string(),
                }
            })?;

            for environment in &grant.environments {
                let environment = EnvironmentId::new(environment.as_str()).map_err(|e| {
                    ConfigError::Invalid {
                        field: "access.grants.environments".to_string(),
                        message: e.to_string(),
                    }
                })?;
                pairs.push((principal.clone(), environment));
            }
        }

        Ok(pairs)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Settings loading and validation failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid setting '{field}': {message}")]
    Invalid { field: String, message: String },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
