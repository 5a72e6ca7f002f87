//! Immutable point-in-time views of the registry
//!
//! Taking a snapshot clones three persistent maps, which is O(1) and shares
//! every entry with the live registry. Later registry writes replace map
//! entries in the live state only, so a snapshot never changes.

use chrono::{DateTime, Utc};
use im::OrdMap;
use marionette_domain::{BehaviourId, ClassName, MethodName, ServiceConfig, ServiceMetadata, ServiceName};
use serde::Serialize;

/// Consistent copy of templates, runtime configurations and metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    taken_at: DateTime<Utc>,
    templates: OrdMap<ServiceName, ServiceConfig>,
    runtime: OrdMap<ServiceName, ServiceConfig>,
    metadata: OrdMap<ServiceName, ServiceMetadata>,
}

impl RegistrySnapshot {
    pub(crate) fn new(
        templates: OrdMap<ServiceName, ServiceConfig>,
        runtime: OrdMap<ServiceName, ServiceConfig>,
        metadata: OrdMap<ServiceName, ServiceMetadata>,
    ) -> Self {
        Self {
            taken_at: Utc::now(),
            templates,
            runtime,
            metadata,
        }
    }

    /// When the snapshot was taken
    #[inline]
    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Runtime configurations by service
    #[inline]
    #[must_use]
    pub fn runtime(&self) -> &OrdMap<ServiceName, ServiceConfig> {
        &self.runtime
    }

    /// Template configurations by service
    #[inline]
    #[must_use]
    pub fn templates(&self) -> &OrdMap<ServiceName, ServiceConfig> {
        &self.templates
    }

    /// Metadata by service
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &OrdMap<ServiceName, ServiceMetadata> {
        &self.metadata
    }

    /// Registered service names in order
    pub fn service_names(&self) -> impl Iterator<Item = &ServiceName> {
        self.runtime.keys()
    }

    /// Current behaviour of a method at snapshot time
    #[must_use]
    pub fn current_behaviour(
        &self,
        service: &ServiceName,
        class: &ClassName,
        method: &MethodName,
    ) -> Option<&BehaviourId> {
        self.runtime
            .get(service)
            .and_then(|config| config.current_behaviour(class, method))
    }

    /// Number of registered services
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.runtime.len()
    }

    /// Check if no service was registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runtime.is_empty()
    }
}
