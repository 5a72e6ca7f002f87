//! Fan-out of behaviour changes to every live instance
//!
//! One round notifies all instances of a service concurrently and waits for
//! every call to finish before returning. Failures are collected, logged and
//! never retried within the round. A shared semaphore bounds the number of
//! notifications in flight across all concurrent rounds.

use crate::ports::{BehaviourChangeGateway, InstanceAddress, InstanceLocator};
use futures::future::join_all;
use marionette_domain::{BehaviourId, ClassName, GatewayError, MethodName, ServiceName};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default bound on concurrent notifications
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Method behaviour change to push to a service's instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BehaviourChange {
    /// Target service
    pub service: ServiceName,
    /// Target class
    pub class: ClassName,
    /// Target method
    pub method: MethodName,
    /// New behaviour
    pub behaviour: BehaviourId,
}

/// Notification failure of one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceFailure {
    /// Instance that failed
    pub instance: InstanceAddress,
    /// Failure reason
    pub error: String,
}

/// Outcome of one propagation round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    /// Change that was propagated
    pub change: BehaviourChange,
    /// Instances notified
    pub total: usize,
    /// Instances that acknowledged
    pub succeeded: usize,
    /// Per-instance failures
    pub failures: Vec<InstanceFailure>,
    /// Instance lookup failure, in which case nothing was notified
    pub lookup_error: Option<String>,
}

impl PropagationReport {
    /// Check if every instance acknowledged and lookup succeeded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.lookup_error.is_none() && self.succeeded == self.total
    }
}

/// Notifies live instances of behaviour changes
#[derive(Clone)]
pub struct BehaviourPropagator {
    locator: Arc<dyn InstanceLocator>,
    gateway: Arc<dyn BehaviourChangeGateway>,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for BehaviourPropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviourPropagator")
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl BehaviourPropagator {
    /// Create new propagator allowing `max_in_flight` concurrent notifications
    #[must_use]
    pub fn new(
        locator: Arc<dyn InstanceLocator>,
        gateway: Arc<dyn BehaviourChangeGateway>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            locator,
            gateway,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Push one change to every live instance of its service
    pub async fn propagate(&self, change: BehaviourChange) -> PropagationReport {
        let instances = match self.locator.live_instances(&change.service).await {
            Ok(instances) => instances,
            Err(e) => {
                tracing::warn!(service = %change.service, error = %e, "Instance lookup failed; change not propagated");
                return PropagationReport {
                    change,
                    total: 0,
                    succeeded: 0,
                    failures: Vec::new(),
                    lookup_error: Some(e.to_string()),
                };
            }
        };

        let calls = instances.iter().map(|instance| self.notify(instance, &change));
        let results = join_all(calls).await;

        let total = results.len();
        let failures: Vec<InstanceFailure> = instances
            .into_iter()
            .zip(results)
            .filter_map(|(instance, result)| {
                result.err().map(|e| {
                    tracing::warn!(instance = %instance, error = %e, "Instance notification failed");
                    InstanceFailure {
                        instance,
                        error: e.to_string(),
                    }
                })
            })
            .collect();
        let succeeded = total - failures.len();

        tracing::info!(
            service = %change.service,
            class = %change.class,
            method = %change.method,
            behaviour = %change.behaviour,
            "Propagated behaviour change to {succeeded}/{total} instances"
        );

        PropagationReport {
            change,
            total,
            succeeded,
            failures,
            lookup_error: None,
        }
    }

    /// Push independent changes concurrently, waiting for all of them
    pub async fn propagate_all(&self, changes: Vec<BehaviourChange>) -> Vec<PropagationReport> {
        join_all(changes.into_iter().map(|change| self.propagate(change))).await
    }

    async fn notify(&self, instance: &InstanceAddress, change: &BehaviourChange) -> Result<(), GatewayError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GatewayError::unreachable(instance.as_str(), "propagator shut down"))?;
        self.gateway
            .notify_instance(instance, &change.class, &change.method, &change.behaviour)
            .await
    }
}
