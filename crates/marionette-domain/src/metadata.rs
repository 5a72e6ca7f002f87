//! Per-service lifecycle metadata kept next to the configuration

use crate::values::ServiceName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle label of a registered service
///
/// A plain label rather than a strict automaton: any state may follow any
/// other in response to the matching event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    /// Configuration fetched by a discovery sweep
    Discovered,
    /// Seen alive by a sweep that did not refetch configuration
    Available,
    /// Runtime configuration changed by a user or an experiment
    Modified,
    /// Absent from the latest sweep
    Unavailable,
    /// Runtime configuration explicitly reset to the template
    ResetToTemplate,
}

impl ServiceStatus {
    /// Check if the service was present in its latest sweep
    #[inline]
    #[must_use]
    pub fn is_reachable(self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

/// Registry-owned metadata of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    /// Service name
    pub service_name: ServiceName,
    /// Address used to reach the service
    pub endpoint: String,
    /// Last time the service was seen or touched
    pub last_seen: DateTime<Utc>,
    /// Lifecycle label
    pub status: ServiceStatus,
}

impl ServiceMetadata {
    /// Metadata for a service just discovered
    #[must_use]
    pub fn discovered(service_name: ServiceName, endpoint: impl Into<String>) -> Self {
        Self {
            service_name,
            endpoint: endpoint.into(),
            last_seen: Utc::now(),
            status: ServiceStatus::Discovered,
        }
    }

    /// Copy with a new status, `last_seen` unchanged
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Copy with a new status and `last_seen` set to now
    #[inline]
    #[must_use]
    pub fn seen(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self.last_seen = Utc::now();
        self
    }
}
