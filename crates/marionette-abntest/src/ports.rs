//! Outbound collaborators of the experiment engine
//!
//! Implementations live outside the engine (HTTP clients, a metrics
//! backend, an orchestrator API, or the in-process simulated fleet).

use crate::metrics::AggregateMetric;
use async_trait::async_trait;
use marionette_domain::{BehaviourId, ClassName, GatewayError, MethodName, ServiceName};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::time::Duration;

/// Network address of one live service instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceAddress(String);

impl InstanceAddress {
    /// Create new address
    #[inline]
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pushes behaviour changes to single instances
#[async_trait]
pub trait BehaviourChangeGateway: Send + Sync {
    /// Tell one instance to switch a method to a behaviour
    ///
    /// # Errors
    /// Transport failure or non-success answer from the instance
    async fn notify_instance(
        &self,
        instance: &InstanceAddress,
        class: &ClassName,
        method: &MethodName,
        behaviour: &BehaviourId,
    ) -> Result<(), GatewayError>;
}

/// Resolves the live instances of a service
#[async_trait]
pub trait InstanceLocator: Send + Sync {
    /// Addresses of every instance currently running
    ///
    /// # Errors
    /// The orchestrator could not be queried
    async fn live_instances(&self, service: &ServiceName) -> Result<Vec<InstanceAddress>, GatewayError>;
}

/// Reads service metrics from the metrics backend
#[async_trait]
pub trait MetricsGateway: Send + Sync {
    /// Configured metrics of one service over the trailing `window`
    ///
    /// # Errors
    /// Backend unreachable or answer malformed
    async fn fetch_metrics_for_service(
        &self,
        service: &ServiceName,
        window: Duration,
    ) -> Result<Vec<AggregateMetric>, GatewayError>;
}
