//! In-process simulated fleet
//!
//! Generates a reproducible fleet from a seed and implements every outbound
//! port against it. Each behaviour carries a fixed latency, throughput and
//! error-rate profile, so the metrics of a configuration are deterministic
//! and the best configuration can be computed independently in tests.

use crate::control_plane::Gateways;
use crate::ports::{AcceptAll, ConfigurationFetcher, ServiceCandidate, ServiceDiscovery};
use crate::settings::MetricQuery;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use marionette_abntest::{
    AggregateMetric, BehaviourChangeGateway, InstanceAddress, InstanceLocator, MetricsGateway,
    OptimizationDirection,
};
use marionette_domain::{
    BehaviourId, ClassConfigData, ClassName, GatewayError, MethodConfigData, MethodName,
    ServiceConfigData, ServiceName,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mean request latency across instances
pub const LATENCY_METRIC: &str = "latency_ms";
/// Sustained request rate across instances
pub const THROUGHPUT_METRIC: &str = "throughput_rps";
/// Failed request ratio across instances
pub const ERROR_RATE_METRIC: &str = "error_rate";

/// Shape of the generated fleet
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of services
    pub services: usize,
    /// Classes per service
    pub classes_per_service: usize,
    /// Methods per class
    pub methods_per_class: usize,
    /// Upper bound of behaviours per method, at least 1
    pub max_behaviours: usize,
    /// Instances per service
    pub instances_per_service: usize,
    /// Probability that an instance rejects notifications
    pub unreachable_ratio: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            services: 3,
            classes_per_service: 1,
            methods_per_class: 2,
            max_behaviours: 3,
            instances_per_service: 2,
            unreachable_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BehaviourProfile {
    latency_ms: f64,
    throughput_rps: f64,
    error_rate: f64,
}

#[derive(Debug, Clone)]
struct SimulatedMethod {
    class: ClassName,
    method: MethodName,
    behaviours: Vec<(BehaviourId, BehaviourProfile)>,
}

impl SimulatedMethod {
    fn profile(&self, behaviour: &BehaviourId) -> Option<BehaviourProfile> {
        self.behaviours
            .iter()
            .find(|(id, _)| id == behaviour)
            .map(|(_, profile)| *profile)
    }

    fn default_behaviour(&self) -> &BehaviourId {
        &self.behaviours[0].0
    }
}

#[derive(Debug, Clone)]
struct SimulatedService {
    name: ServiceName,
    endpoint: String,
    methods: Vec<SimulatedMethod>,
    instances: Vec<InstanceAddress>,
}

#[derive(Debug, Clone)]
struct InstanceState {
    service: ServiceName,
    unreachable: bool,
    active: HashMap<(ClassName, MethodName), BehaviourId>,
}

/// Reproducible in-process fleet implementing every outbound port
#[derive(Debug)]
pub struct SimulatedFleet {
    services: Vec<SimulatedService>,
    instances: DashMap<InstanceAddress, InstanceState>,
    offline: DashSet<ServiceName>,
    notifications: AtomicUsize,
}

impl SimulatedFleet {
    /// Generate a fleet
    ///
    /// # Errors
    /// [`GatewayError::Malformed`] if a generated name is not a valid identifier
    pub fn generate(config: &SimulationConfig) -> Result<Self, GatewayError> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let invalid = |e: marionette_domain::ConfigError| GatewayError::Malformed {
            target: "simulation".to_string(),
            reason: e.to_string(),
        };

        let mut services = Vec::with_capacity(config.services);
        let instances = DashMap::new();

        for s in 0..config.services {
            let name = ServiceName::new(format!("service-{s}")).map_err(invalid)?;
            let mut methods = Vec::new();
            for c in 0..config.classes_per_service {
                let class = ClassName::new(format!("Component{c}")).map_err(invalid)?;
                for m in 0..config.methods_per_class {
                    let method = MethodName::new(format!("operation{m}")).map_err(invalid)?;
                    let count = rng.gen_range(1..=config.max_behaviours.max(1));
                    let behaviours = (0..count)
                        .map(|b| {
                            let profile = BehaviourProfile {
                                latency_ms: rng.gen_range(20.0..200.0),
                                throughput_rps: rng.gen_range(50.0..500.0),
                                error_rate: rng.gen_range(0.0..0.05),
                            };
                            BehaviourId::new(format!("variant-{b}")).map(|id| (id, profile))
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(invalid)?;
                    methods.push(SimulatedMethod {
                        class: class.clone(),
                        method,
                        behaviours,
                    });
                }
            }

            let active: HashMap<(ClassName, MethodName), BehaviourId> = methods
                .iter()
                .map(|m| ((m.class.clone(), m.method.clone()), m.default_behaviour().clone()))
                .collect();
            let mut addresses = Vec::with_capacity(config.instances_per_service);
            for i in 0..config.instances_per_service {
                let address = InstanceAddress::new(format!("http://{name}-{i}.sim:8080"));
                instances.insert(
                    address.clone(),
                    InstanceState {
                        service: name.clone(),
                        unreachable: rng.gen_bool(config.unreachable_ratio.clamp(0.0, 1.0)),
                        active: active.clone(),
                    },
                );
                addresses.push(address);
            }

            services.push(SimulatedService {
                endpoint: format!("http://{name}.sim:8080"),
                name,
                methods,
                instances: addresses,
            });
        }

        tracing::info!(
            seed = config.seed,
            services = services.len(),
            instances = instances.len(),
            "Simulated fleet generated"
        );
        Ok(Self {
            services,
            instances,
            offline: DashSet::new(),
            notifications: AtomicUsize::new(0),
        })
    }

    /// Metric queries matching what the fleet reports
    #[must_use]
    pub fn metric_queries() -> Vec<MetricQuery> {
        [
            (LATENCY_METRIC, OptimizationDirection::Minimize, "ms"),
            (ERROR_RATE_METRIC, OptimizationDirection::Minimize, "ratio"),
            (THROUGHPUT_METRIC, OptimizationDirection::Maximize, "req/s"),
        ]
        .into_iter()
        .zip(1_u32..)
        .map(|((name, direction, unit), order)| MetricQuery {
            direction,
            order: Some(order),
            unit: Some(unit.to_string()),
            ..MetricQuery::new(name, format!("simulated:{name}"))
        })
        .collect()
    }

    /// Names of the generated services
    #[must_use]
    pub fn service_names(&self) -> Vec<ServiceName> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Take a service out of discovery, or bring it back
    pub fn set_offline(&self, service: &ServiceName, offline: bool) {
        if offline {
            self.offline.insert(service.clone());
        } else {
            self.offline.remove(service);
        }
    }

    /// Make an instance reject notifications, or accept them again
    pub fn set_unreachable(&self, instance: &InstanceAddress, unreachable: bool) {
        if let Some(mut state) = self.instances.get_mut(instance) {
            state.unreachable = unreachable;
        }
    }

    /// Behaviour an instance is running for a method
    #[must_use]
    pub fn active_behaviour(
        &self,
        instance: &InstanceAddress,
        class: &ClassName,
        method: &MethodName,
    ) -> Option<BehaviourId> {
        self.instances
            .get(instance)
            .and_then(|state| state.active.get(&(class.clone(), method.clone())).cloned())
    }

    /// Successful notifications handled so far
    #[must_use]
    pub fn notifications(&self) -> usize {
        self.notifications.load(Ordering::Relaxed)
    }

    fn service(&self, name: &ServiceName) -> Option<&SimulatedService> {
        self.services.iter().find(|s| &s.name == name)
    }

    fn instance_metrics(service: &SimulatedService, state: &InstanceState) -> BehaviourProfile {
        let mut latency_ms = 0.0;
        let mut throughput_rps = f64::INFINITY;
        let mut success = 1.0;
        for method in &service.methods {
            let profile = state
                .active
                .get(&(method.class.clone(), method.method.clone()))
                .and_then(|b| method.profile(b));
            if let Some(profile) = profile {
                latency_ms += profile.latency_ms;
                throughput_rps = f64::min(throughput_rps, profile.throughput_rps);
                success *= 1.0 - profile.error_rate;
            }
        }
        BehaviourProfile {
            latency_ms,
            throughput_rps: if throughput_rps.is_finite() { throughput_rps } else { 0.0 },
            error_rate: 1.0 - success,
        }
    }
}

impl Gateways {
    /// Every port served by one simulated fleet
    #[must_use]
    pub fn simulated(fleet: Arc<SimulatedFleet>) -> Self {
        Self {
            discovery: fleet.clone(),
            validator: Arc::new(AcceptAll),
            fetcher: fleet.clone(),
            locator: fleet.clone(),
            notifier: fleet.clone(),
            metrics: fleet,
        }
    }
}

#[async_trait]
impl ServiceDiscovery for SimulatedFleet {
    async fn find_candidate_services(&self) -> Result<Vec<ServiceCandidate>, GatewayError> {
        Ok(self
            .services
            .iter()
            .filter(|s| !self.offline.contains(&s.name))
            .map(|s| ServiceCandidate::new(s.name.clone(), s.endpoint.clone()))
            .collect())
    }
}

#[async_trait]
impl ConfigurationFetcher for SimulatedFleet {
    async fn fetch_configuration(&self, endpoint: &str) -> Result<ServiceConfigData, GatewayError> {
        let service = self
            .services
            .iter()
            .find(|s| s.endpoint == endpoint)
            .ok_or_else(|| GatewayError::Status {
                target: endpoint.to_string(),
                status: 404,
            })?;

        let mut classes: Vec<ClassConfigData> = Vec::new();
        for method in &service.methods {
            let data = MethodConfigData {
                method_name: method.method.to_string(),
                default_behaviour: method.default_behaviour().to_string(),
                current_behaviour: None,
                available_behaviours: method.behaviours.iter().map(|(id, _)| id.to_string()).collect(),
            };
            match classes.iter_mut().find(|c| c.class_name == method.class.as_str()) {
                Some(class) => class.methods.push(data),
                None => classes.push(ClassConfigData {
                    class_name: method.class.to_string(),
                    methods: vec![data],
                }),
            }
        }

        Ok(ServiceConfigData {
            service_name: service.name.to_string(),
            classes,
        })
    }
}

#[async_trait]
impl InstanceLocator for SimulatedFleet {
    async fn live_instances(&self, service: &ServiceName) -> Result<Vec<InstanceAddress>, GatewayError> {
        self.service(service)
            .map(|s| s.instances.clone())
            .ok_or_else(|| GatewayError::Status {
                target: service.to_string(),
                status: 404,
            })
    }
}

#[async_trait]
impl BehaviourChangeGateway for SimulatedFleet {
    async fn notify_instance(
        &self,
        instance: &InstanceAddress,
        class: &ClassName,
        method: &MethodName,
        behaviour: &BehaviourId,
    ) -> Result<(), GatewayError> {
        let mut state = self
            .instances
            .get_mut(instance)
            .ok_or_else(|| GatewayError::unreachable(instance.as_str(), "no such instance"))?;
        if state.unreachable {
            return Err(GatewayError::unreachable(instance.as_str(), "connection refused"));
        }
        let key = (class.clone(), method.clone());
        if !state.active.contains_key(&key) {
            return Err(GatewayError::Status {
                target: instance.to_string(),
                status: 404,
            });
        }
        state.active.insert(key, behaviour.clone());
        drop(state);
        self.notifications.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl MetricsGateway for SimulatedFleet {
    async fn fetch_metrics_for_service(
        &self,
        service: &ServiceName,
        _window: Duration,
    ) -> Result<Vec<AggregateMetric>, GatewayError> {
        let simulated = self.service(service).ok_or_else(|| GatewayError::Status {
            target: service.to_string(),
            status: 404,
        })?;

        let samples: Vec<BehaviourProfile> = simulated
            .instances
            .iter()
            .filter_map(|address| self.instances.get(address))
            .filter(|state| !state.unreachable && &state.service == service)
            .map(|state| Self::instance_metrics(simulated, &state))
            .collect();
        if samples.is_empty() {
            return Err(GatewayError::Malformed {
                target: service.to_string(),
                reason: "no reachable instance reported metrics".to_string(),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let n = samples.len() as f64;
        let mean = |f: fn(&BehaviourProfile) -> f64| samples.iter().map(f).sum::<f64>() / n;
        Ok(vec![
            AggregateMetric::new(LATENCY_METRIC, mean(|p| p.latency_ms)).with_unit("ms"),
            AggregateMetric::new(THROUGHPUT_METRIC, mean(|p| p.throughput_rps)).with_unit("req/s"),
            AggregateMetric::new(ERROR_RATE_METRIC, mean(|p| p.error_rate)).with_unit("ratio"),
        ])
    }
}
