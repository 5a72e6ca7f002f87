//! Testing utilities for the Marionette workspace
//!
//! Shared fixtures and gateway doubles for integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use marionette_abntest::{
    AggregateMetric, BehaviourChangeGateway, InstanceAddress, InstanceLocator, MetricsGateway,
};
use marionette_core::{ConfigurationFetcher, ServiceCandidate, ServiceDiscovery};
use marionette_domain::{
    BehaviourId, ClassConfigData, ClassName, GatewayError, MethodConfigData, MethodName,
    ServiceConfig, ServiceConfigData, ServiceName,
};
use marionette_registry::ConfigRegistry;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Methods of a fixture service: `(class, method, behaviours)`, first behaviour is the default
pub type MethodSpec<'a> = (&'a str, &'a str, &'a [&'a str]);

pub fn service_name(name: &str) -> ServiceName {
    ServiceName::new(name).unwrap()
}

pub fn class_name(name: &str) -> ClassName {
    ClassName::new(name).unwrap()
}

pub fn method_name(name: &str) -> MethodName {
    MethodName::new(name).unwrap()
}

pub fn behaviour(name: &str) -> BehaviourId {
    BehaviourId::new(name).unwrap()
}

pub fn service_data(name: &str, methods: &[MethodSpec<'_>]) -> ServiceConfigData {
    let mut classes: Vec<ClassConfigData> = Vec::new();
    for (class, method, behaviours) in methods {
        let data = MethodConfigData {
            method_name: (*method).to_string(),
            default_behaviour: behaviours[0].to_string(),
            current_behaviour: None,
            available_behaviours: behaviours.iter().map(ToString::to_string).collect(),
        };
        match classes.iter_mut().find(|c| c.class_name == *class) {
            Some(existing) => existing.methods.push(data),
            None => classes.push(ClassConfigData {
                class_name: (*class).to_string(),
                methods: vec![data],
            }),
        }
    }
    ServiceConfigData {
        service_name: name.to_string(),
        classes,
    }
}

pub fn service_config(name: &str, methods: &[MethodSpec<'_>]) -> ServiceConfig {
    ServiceConfig::try_from(&service_data(name, methods)).unwrap()
}

pub fn registry_with(services: impl IntoIterator<Item = ServiceConfig>) -> Arc<ConfigRegistry> {
    let registry = Arc::new(ConfigRegistry::new());
    for service in services {
        let endpoint = format!("http://{}.test", service.name());
        registry
            .add_discovered_service(service.name().clone(), service, endpoint)
            .unwrap();
    }
    registry
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub instance: InstanceAddress,
    pub class: ClassName,
    pub method: MethodName,
    pub behaviour: BehaviourId,
}

/// Records notifications; listed instances fail
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<HashSet<InstanceAddress>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_instance(&self, instance: &str) {
        self.failing.lock().insert(InstanceAddress::new(instance));
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl BehaviourChangeGateway for RecordingGateway {
    async fn notify_instance(
        &self,
        instance: &InstanceAddress,
        class: &ClassName,
        method: &MethodName,
        behaviour: &BehaviourId,
    ) -> Result<(), GatewayError> {
        self.sent.lock().push(Notification {
            instance: instance.clone(),
            class: class.clone(),
            method: method.clone(),
            behaviour: behaviour.clone(),
        });
        if self.failing.lock().contains(instance) {
            return Err(GatewayError::Status {
                target: instance.to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

/// Gives every service `instances` addresses named `<service>-<i>`
#[derive(Debug)]
pub struct FixedLocator {
    instances: usize,
    failing: Mutex<HashSet<ServiceName>>,
}

impl FixedLocator {
    pub fn new(instances: usize) -> Arc<Self> {
        Arc::new(Self {
            instances,
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_service(&self, service: &str) {
        self.failing.lock().insert(service_name(service));
    }
}

#[async_trait]
impl InstanceLocator for FixedLocator {
    async fn live_instances(&self, service: &ServiceName) -> Result<Vec<InstanceAddress>, GatewayError> {
        if self.failing.lock().contains(service) {
            return Err(GatewayError::unreachable(service.as_str(), "orchestrator down"));
        }
        Ok((0..self.instances)
            .map(|i| InstanceAddress::new(format!("{service}-{i}")))
            .collect())
    }
}

type Scorer = dyn Fn(&ServiceConfig) -> Vec<AggregateMetric> + Send + Sync;

/// Computes metrics from the registry's runtime configuration at call time
pub struct ScriptedMetrics {
    registry: Arc<ConfigRegistry>,
    scorer: Box<Scorer>,
    failing: Mutex<HashSet<ServiceName>>,
    calls: Mutex<Vec<(ServiceName, Duration)>>,
}

impl std::fmt::Debug for ScriptedMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedMetrics").finish_non_exhaustive()
    }
}

impl ScriptedMetrics {
    pub fn new(
        registry: Arc<ConfigRegistry>,
        scorer: impl Fn(&ServiceConfig) -> Vec<AggregateMetric> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            scorer: Box::new(scorer),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_service(&self, service: &str) {
        self.failing.lock().insert(service_name(service));
    }

    pub fn calls(&self) -> Vec<(ServiceName, Duration)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl MetricsGateway for ScriptedMetrics {
    async fn fetch_metrics_for_service(
        &self,
        service: &ServiceName,
        window: Duration,
    ) -> Result<Vec<AggregateMetric>, GatewayError> {
        self.calls.lock().push((service.clone(), window));
        if self.failing.lock().contains(service) {
            return Err(GatewayError::Timeout {
                target: service.to_string(),
                timeout_ms: 5_000,
            });
        }
        let config = self
            .registry
            .runtime_configuration(service)
            .ok_or_else(|| GatewayError::Status {
                target: service.to_string(),
                status: 404,
            })?;
        Ok((self.scorer)(&config))
    }
}

/// Discovery backend returning a settable candidate list
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    candidates: Mutex<Vec<ServiceCandidate>>,
    down: Mutex<bool>,
}

impl StaticDiscovery {
    pub fn new(candidates: &[(&str, &str)]) -> Arc<Self> {
        let discovery = Arc::new(Self::default());
        discovery.set_candidates(candidates);
        discovery
    }

    pub fn set_candidates(&self, candidates: &[(&str, &str)]) {
        *self.candidates.lock() = candidates
            .iter()
            .map(|(name, endpoint)| ServiceCandidate::new(service_name(name), *endpoint))
            .collect();
    }

    pub fn set_down(&self, down: bool) {
        *self.down.lock() = down;
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn find_candidate_services(&self) -> Result<Vec<ServiceCandidate>, GatewayError> {
        if *self.down.lock() {
            return Err(GatewayError::unreachable("discovery", "api server unavailable"));
        }
        Ok(self.candidates.lock().clone())
    }
}

/// Serves configuration documents by endpoint
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: Mutex<HashMap<String, ServiceConfigData>>,
}

impl StaticFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, endpoint: &str, document: ServiceConfigData) {
        self.documents.lock().insert(endpoint.to_string(), document);
    }
}

#[async_trait]
impl ConfigurationFetcher for StaticFetcher {
    async fn fetch_configuration(&self, endpoint: &str) -> Result<ServiceConfigData, GatewayError> {
        self.documents
            .lock()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| GatewayError::unreachable(endpoint, "connection refused"))
    }
}
