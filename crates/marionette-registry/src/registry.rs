//! Process-wide store of template and runtime configurations
//!
//! Three actors share the registry: periodic discovery, user-driven
//! behaviour changes, and the experiment executor. Every mutator takes the
//! write lock for the whole read-modify-write, computes the new value with
//! the copy-on-write domain API, and swaps the map entry. Readers clone the
//! persistent maps under a short read lock and then iterate lock-free.

use crate::error::RegistryError;
use crate::snapshot::RegistrySnapshot;
use chrono::{DateTime, Utc};
use im::OrdMap;
use marionette_domain::{
    BehaviourId, ClassName, ConfigError, MethodName, ServiceConfig, ServiceMetadata, ServiceName,
    ServiceStatus,
};
use parking_lot::RwLock;

/// Outcome of registering a discovered service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First sighting: runtime configuration seeded from the template
    New,
    /// Known service: template refreshed, runtime left untouched
    Refreshed,
}

/// Runtime configuration before and after a reset
#[derive(Debug, Clone, PartialEq)]
pub struct ResetOutcome {
    /// Runtime configuration replaced by the reset
    pub previous: ServiceConfig,
    /// Template now active as runtime configuration
    pub template: ServiceConfig,
}

#[derive(Debug, Default)]
struct RegistryState {
    templates: OrdMap<ServiceName, ServiceConfig>,
    runtime: OrdMap<ServiceName, ServiceConfig>,
    metadata: OrdMap<ServiceName, ServiceMetadata>,
    last_discovery: Option<DateTime<Utc>>,
}

impl RegistryState {
    fn touch(&mut self, service: &ServiceName, status: ServiceStatus) {
        if let Some(meta) = self.metadata.get(service) {
            let updated = meta.clone().seen(status);
            self.metadata.insert(service.clone(), updated);
        }
    }
}

/// Template and runtime configuration of every known service
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    state: RwLock<RegistryState>,
}

impl ConfigRegistry {
    /// Create new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly discovered template
    ///
    /// The template always replaces the previous one. The runtime
    /// configuration is seeded from the template only on first sighting, so
    /// rediscovery never reverts user edits or experiment state.
    ///
    /// # Errors
    /// [`RegistryError::ServiceNameMismatch`] if the template carries another name
    pub fn add_discovered_service(
        &self,
        service: ServiceName,
        template: ServiceConfig,
        endpoint: impl Into<String>,
    ) -> Result<Registration, RegistryError> {
        if template.name() != &service {
            return Err(RegistryError::ServiceNameMismatch {
                expected: service,
                found: template.name().clone(),
            });
        }

        let endpoint = endpoint.into();
        let mut state = self.state.write();
        let registration = if state.runtime.contains_key(&service) {
            Registration::Refreshed
        } else {
            state.runtime.insert(service.clone(), template.clone());
            Registration::New
        };
        state.templates.insert(service.clone(), template);
        state.metadata.insert(
            service.clone(),
            ServiceMetadata::discovered(service.clone(), endpoint),
        );
        drop(state);

        tracing::debug!(service = %service, ?registration, "Registered discovered service");
        Ok(registration)
    }

    /// Runtime configuration of a service
    #[must_use]
    pub fn runtime_configuration(&self, service: &ServiceName) -> Option<ServiceConfig> {
        self.state.read().runtime.get(service).cloned()
    }

    /// Template configuration of a service
    #[must_use]
    pub fn template_configuration(&self, service: &ServiceName) -> Option<ServiceConfig> {
        self.state.read().templates.get(service).cloned()
    }

    /// Metadata of a service
    #[must_use]
    pub fn service_metadata(&self, service: &ServiceName) -> Option<ServiceMetadata> {
        self.state.read().metadata.get(service).cloned()
    }

    /// Behaviour currently active for one method
    ///
    /// # Errors
    /// - [`RegistryError::UnknownService`] if the service is not registered
    /// - [`RegistryError::Config`] if the class or method does not exist
    pub fn current_behaviour(
        &self,
        service: &ServiceName,
        class: &ClassName,
        method: &MethodName,
    ) -> Result<BehaviourId, RegistryError> {
        let state = self.state.read();
        let config = state
            .runtime
            .get(service)
            .ok_or_else(|| RegistryError::UnknownService(service.clone()))?;
        let class_config = config.class(class).ok_or_else(|| ConfigError::UnknownClass {
            class: class.clone(),
        })?;
        let method_config = class_config
            .method(method)
            .ok_or_else(|| ConfigError::UnknownMethod {
                class: class.clone(),
                method: method.clone(),
            })?;
        Ok(method_config.current_behaviour().clone())
    }

    /// Switch one method of a service to another behaviour
    ///
    /// The runtime entry is replaced in a single swap; on error nothing
    /// changes. Returns the new runtime configuration.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownService`] if the service is not registered
    /// - [`RegistryError::Config`] for unknown class, unknown method or
    ///   unavailable behaviour
    pub fn modify_current_behaviour_for_method(
        &self,
        service: &ServiceName,
        class: &ClassName,
        method: &MethodName,
        behaviour: BehaviourId,
    ) -> Result<ServiceConfig, RegistryError> {
        let mut state = self.state.write();
        let updated = state
            .runtime
            .get(service)
            .ok_or_else(|| RegistryError::UnknownService(service.clone()))?
            .with_current_behaviour(class, method, behaviour.clone())?;
        state.runtime.insert(service.clone(), updated.clone());
        state.touch(service, ServiceStatus::Modified);
        drop(state);

        tracing::debug!(
            service = %service,
            class = %class,
            method = %method,
            behaviour = %behaviour,
            "Runtime behaviour modified"
        );
        Ok(updated)
    }

    /// Replace the runtime configuration with the template
    ///
    /// Returns `None` without touching anything if the service has no template.
    pub fn reset_to_template(&self, service: &ServiceName) -> Option<ResetOutcome> {
        let mut state = self.state.write();
        let template = state.templates.get(service)?.clone();
        let previous = state
            .runtime
            .insert(service.clone(), template.clone())
            .unwrap_or_else(|| template.clone());
        state.touch(service, ServiceStatus::ResetToTemplate);
        drop(state);

        tracing::debug!(service = %service, "Runtime configuration reset to template");
        Some(ResetOutcome { previous, template })
    }

    /// Flag a service as absent from the latest sweep
    ///
    /// Returns `false` if the service is unknown.
    pub fn mark_service_unavailable(&self, service: &ServiceName) -> bool {
        let mut state = self.state.write();
        let Some(meta) = state.metadata.get(service).cloned() else {
            return false;
        };
        state
            .metadata
            .insert(service.clone(), meta.with_status(ServiceStatus::Unavailable));
        drop(state);

        tracing::debug!(service = %service, "Service marked unavailable");
        true
    }

    /// Flag a known service as alive without refetching its configuration
    ///
    /// Returns `false` if the service is unknown.
    pub fn mark_service_available(&self, service: &ServiceName, endpoint: impl Into<String>) -> bool {
        let mut state = self.state.write();
        let Some(meta) = state.metadata.get(service).cloned() else {
            return false;
        };
        let mut meta = meta.seen(ServiceStatus::Available);
        meta.endpoint = endpoint.into();
        state.metadata.insert(service.clone(), meta);
        true
    }

    /// Check if the runtime configuration differs from the template
    ///
    /// Unknown services are never modified.
    #[must_use]
    pub fn is_service_modified(&self, service: &ServiceName) -> bool {
        let state = self.state.read();
        match (state.templates.get(service), state.runtime.get(service)) {
            (Some(template), Some(runtime)) => template != runtime,
            _ => false,
        }
    }

    /// Copy of every runtime configuration
    #[must_use]
    pub fn all_runtime_configurations(&self) -> OrdMap<ServiceName, ServiceConfig> {
        self.state.read().runtime.clone()
    }

    /// Copy of every service's metadata
    #[must_use]
    pub fn all_service_metadata(&self) -> OrdMap<ServiceName, ServiceMetadata> {
        self.state.read().metadata.clone()
    }

    /// Consistent copy of the whole registry
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        RegistrySnapshot::new(
            state.templates.clone(),
            state.runtime.clone(),
            state.metadata.clone(),
        )
    }

    /// Forget a service entirely
    ///
    /// # Errors
    /// [`RegistryError::UnknownService`] if the service is not registered
    pub fn remove_service(&self, service: &ServiceName) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        if state.runtime.remove(service).is_none() {
            return Err(RegistryError::UnknownService(service.clone()));
        }
        state.templates.remove(service);
        state.metadata.remove(service);
        drop(state);

        tracing::debug!(service = %service, "Service removed from registry");
        Ok(())
    }

    /// Registered service names in order
    #[must_use]
    pub fn service_names(&self) -> Vec<ServiceName> {
        self.state.read().runtime.keys().cloned().collect()
    }

    /// Check if a service is registered
    #[must_use]
    pub fn contains(&self, service: &ServiceName) -> bool {
        self.state.read().runtime.contains_key(service)
    }

    /// Number of registered services
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().runtime.len()
    }

    /// Check if no service is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().runtime.is_empty()
    }

    /// Remember that a discovery sweep just finished
    pub fn record_discovery_sweep(&self) -> DateTime<Utc> {
        let now = Utc::now();
        self.state.write().last_discovery = Some(now);
        now
    }

    /// Time of the latest discovery sweep
    #[must_use]
    pub fn last_discovery(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_discovery
    }
}
