//! Error types for the control plane

use marionette_abntest::ExperimentError;
use marionette_domain::{ConfigError, GatewayError};
use marionette_registry::RegistryError;
use std::path::PathBuf;

/// Settings loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file could not be read
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML for the expected shape
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment variable holds an unusable value
    #[error("environment variable {name}: {reason}")]
    InvalidEnv {
        /// Variable name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// Parsed settings are inconsistent
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl SettingsError {
    /// Create an invalid-settings error
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

/// Control plane errors surfaced to callers
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// Request carries malformed identifiers or behaviours
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry rejected the operation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Experiment could not run
    #[error(transparent)]
    Experiment(#[from] ExperimentError),

    /// Settings unusable
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// External collaborator failed as a whole
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ControlPlaneError {
    /// Check if the caller sent a bad request, as opposed to a server-side failure
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Registry(RegistryError::UnknownService(_) | RegistryError::Config(_)) => true,
            Self::Registry(RegistryError::ServiceNameMismatch { .. }) => false,
            Self::Experiment(_) | Self::Settings(_) | Self::Gateway(_) => false,
        }
    }
}
