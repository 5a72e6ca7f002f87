//! Inbound-facing collaborators used by discovery
//!
//! The experiment-side ports (behaviour change, instance lookup, metrics)
//! live in [`marionette_abntest::ports`].

use async_trait::async_trait;
use marionette_domain::{GatewayError, ServiceConfigData, ServiceName};
use serde::{Deserialize, Serialize};

/// Addressable service found by the discovery backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCandidate {
    /// Service name
    pub name: ServiceName,
    /// Address the configuration can be fetched from
    pub endpoint: String,
}

impl ServiceCandidate {
    /// Create new candidate
    #[must_use]
    pub fn new(name: ServiceName, endpoint: impl Into<String>) -> Self {
        Self {
            name,
            endpoint: endpoint.into(),
        }
    }
}

/// Lists currently running services
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Every candidate service currently running
    ///
    /// # Errors
    /// The discovery backend could not be queried
    async fn find_candidate_services(&self) -> Result<Vec<ServiceCandidate>, GatewayError>;
}

/// Filters out services that do not take part in experimentation
pub trait ServiceValidator: Send + Sync {
    /// Check if a candidate participates
    fn accepts(&self, candidate: &ServiceCandidate) -> bool;
}

/// Validator accepting every candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ServiceValidator for AcceptAll {
    fn accepts(&self, _candidate: &ServiceCandidate) -> bool {
        true
    }
}

/// Fetches the declared configuration of a service
#[async_trait]
pub trait ConfigurationFetcher: Send + Sync {
    /// Declared classes, methods and behaviours served at `endpoint`
    ///
    /// # Errors
    /// Service unreachable or answer malformed
    async fn fetch_configuration(&self, endpoint: &str) -> Result<ServiceConfigData, GatewayError>;
}
