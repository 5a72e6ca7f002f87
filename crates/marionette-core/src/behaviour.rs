//! User-driven behaviour changes and template resets
//!
//! Both update the registry first and then push the change to every live
//! instance. An edit made while an experiment runs is last-write-wins: the
//! experiment's next configuration may overwrite it.

use crate::error::ControlPlaneError;
use marionette_abntest::{BehaviourChange, BehaviourPropagator, PropagationReport};
use marionette_domain::{BehaviourId, ClassName, MethodName, ServiceName};
use marionette_registry::{ConfigRegistry, RegistryError};
use serde::Deserialize;
use std::sync::Arc;

/// Raw request to switch one method of one service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BehaviourChangeRequest {
    /// Service name
    pub service: String,
    /// Class name
    pub class: String,
    /// Method name
    pub method: String,
    /// New behaviour
    pub behaviour: String,
}

impl BehaviourChangeRequest {
    /// Create new request
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        class: impl Into<String>,
        method: impl Into<String>,
        behaviour: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            class: class.into(),
            method: method.into(),
            behaviour: behaviour.into(),
        }
    }

    fn validate(&self) -> Result<BehaviourChange, ControlPlaneError> {
        Ok(BehaviourChange {
            service: ServiceName::new(&self.service)?,
            class: ClassName::new(&self.class)?,
            method: MethodName::new(&self.method)?,
            behaviour: BehaviourId::new(&self.behaviour)?,
        })
    }
}

/// Applies single behaviour changes and template resets
#[derive(Debug, Clone)]
pub struct BehaviourChangeService {
    registry: Arc<ConfigRegistry>,
    propagator: BehaviourPropagator,
}

impl BehaviourChangeService {
    /// Create new service
    #[must_use]
    pub fn new(registry: Arc<ConfigRegistry>, propagator: BehaviourPropagator) -> Self {
        Self {
            registry,
            propagator,
        }
    }

    /// Switch one method and notify every live instance
    ///
    /// # Errors
    /// - [`ControlPlaneError::Config`] for blank identifiers
    /// - [`ControlPlaneError::Registry`] for an unknown service, class or
    ///   method, or a behaviour the method does not offer
    pub async fn change_behaviour(
        &self,
        request: &BehaviourChangeRequest,
    ) -> Result<PropagationReport, ControlPlaneError> {
        let change = request.validate()?;
        self.registry.modify_current_behaviour_for_method(
            &change.service,
            &change.class,
            &change.method,
            change.behaviour.clone(),
        )?;
        tracing::info!(
            service = %change.service,
            class = %change.class,
            method = %change.method,
            behaviour = %change.behaviour,
            "Behaviour changed on request"
        );
        Ok(self.propagator.propagate(change).await)
    }

    /// Put a service back on its template and notify every changed method
    ///
    /// # Errors
    /// - [`ControlPlaneError::Config`] for a blank service name
    /// - [`ControlPlaneError::Registry`] if the service has no template
    pub async fn reset_to_template(&self, service: &str) -> Result<Vec<PropagationReport>, ControlPlaneError> {
        let service = ServiceName::new(service)?;
        let outcome = self
            .registry
            .reset_to_template(&service)
            .ok_or_else(|| RegistryError::UnknownService(service.clone()))?;

        let changes: Vec<BehaviourChange> = outcome
            .previous
            .differences(&outcome.template)
            .into_iter()
            .map(|d| BehaviourChange {
                service: service.clone(),
                class: d.class,
                method: d.method,
                behaviour: d.to,
            })
            .collect();
        tracing::info!(service = %service, changed = changes.len(), "Service reset to template");

        Ok(self.propagator.propagate_all(changes).await)
    }
}
