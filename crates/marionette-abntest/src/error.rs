//! Error types for experiment runs

use crate::variation::ConfigurationId;
use marionette_registry::RegistryError;

/// Experiment-level errors
///
/// Per-instance and per-service failures never surface here; they degrade
/// into missing data inside the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExperimentError {
    /// Nothing to execute
    #[error("no system configurations to execute")]
    NoConfigurations,

    /// Total time budget cannot be split
    #[error("total experiment time must be positive")]
    InvalidTotalTime,

    /// Another run holds the fleet
    #[error("an experiment run is already in progress")]
    AlreadyRunning,

    /// Configuration space exceeds the configured cap or `usize`
    #[error("configuration space of {size} exceeds the limit of {limit}", size = .count.map_or_else(|| "overflowing size".to_string(), |c| c.to_string()))]
    TooManyConfigurations {
        /// Size of the space, `None` if it overflows
        count: Option<usize>,
        /// Configured cap
        limit: usize,
    },

    /// Metrics recorded twice for one configuration
    #[error("metrics for configuration `{0}` already recorded")]
    DuplicateConfiguration(ConfigurationId),

    /// Metric priority list rejected
    #[error("invalid metrics configuration: {reason}")]
    InvalidMetricsConfiguration {
        /// What is wrong
        reason: String,
    },

    /// Registry rejected an operation
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ExperimentError {
    /// Create a metrics configuration error
    #[must_use]
    pub fn invalid_metrics(reason: impl Into<String>) -> Self {
        Self::InvalidMetricsConfiguration {
            reason: reason.into(),
        }
    }

    /// Check if the run was rejected before touching the fleet
    #[inline]
    #[must_use]
    pub fn is_rejected_before_start(&self) -> bool {
        matches!(
            self,
            Self::NoConfigurations
                | Self::InvalidTotalTime
                | Self::AlreadyRunning
                | Self::TooManyConfigurations { .. }
        )
    }
}
