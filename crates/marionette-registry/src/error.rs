//! Error types for the configuration registry

use marionette_domain::{ConfigError, ServiceName};

/// Registry operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Service is not registered
    #[error("service `{0}` is not registered")]
    UnknownService(ServiceName),

    /// Template was registered under a name it does not carry
    #[error("configuration of service `{found}` registered as `{expected}`")]
    ServiceNameMismatch {
        /// Name the caller registered
        expected: ServiceName,
        /// Name carried by the configuration
        found: ServiceName,
    },

    /// Point mutation rejected by the configuration itself
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RegistryError {
    /// Check if the error stems from a malformed request rather than registry state
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Config(ConfigError::InvalidBehaviour { .. } | ConfigError::BlankIdentifier { .. }))
    }
}
