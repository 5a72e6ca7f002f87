//! Control plane facade and background scheduling
//!
//! Wires the registry, discovery, behaviour changes, the experiment use case
//! and results storage from settings plus a bundle of port implementations.
//! [`ControlPlane::spawn_background`] starts the periodic actors:
//! - quick and full discovery sweeps
//! - experiment runs, when an interval is configured

use crate::behaviour::{BehaviourChangeRequest, BehaviourChangeService};
use crate::discovery::{DiscoveryReport, ServiceDiscoveryService};
use crate::error::ControlPlaneError;
use crate::ports::{ConfigurationFetcher, ServiceDiscovery, ServiceValidator};
use crate::settings::ControlPlaneSettings;
use marionette_abntest::{
    AbnTestAllSystemConfigurationsUseCase, AbnTestOutcome, AbnTestResultsStorage,
    BehaviourChangeGateway, BehaviourPropagator, ExperimentCancellation, InstanceLocator,
    MetricsGateway, PropagationReport, SingleAbnTestResult, SystemConfigurationsGenerator,
    SystemConfigurationsRanker, UniformAbnTestExecutor,
};
use marionette_registry::ConfigRegistry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Implementations of every outbound port
#[derive(Clone)]
pub struct Gateways {
    /// Lists running services
    pub discovery: Arc<dyn ServiceDiscovery>,
    /// Filters non-participating services
    pub validator: Arc<dyn ServiceValidator>,
    /// Fetches declared configurations
    pub fetcher: Arc<dyn ConfigurationFetcher>,
    /// Resolves live instances
    pub locator: Arc<dyn InstanceLocator>,
    /// Notifies instances of behaviour changes
    pub notifier: Arc<dyn BehaviourChangeGateway>,
    /// Reads service metrics
    pub metrics: Arc<dyn MetricsGateway>,
}

impl std::fmt::Debug for Gateways {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateways").finish_non_exhaustive()
    }
}

/// Handles of the background tasks
#[derive(Debug)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Number of spawned loops
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if nothing was spawned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every loop to exit
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
    }
}

/// The assembled control plane
#[derive(Debug)]
pub struct ControlPlane {
    settings: ControlPlaneSettings,
    registry: Arc<ConfigRegistry>,
    discovery: Arc<ServiceDiscoveryService>,
    behaviours: BehaviourChangeService,
    experiments: Arc<AbnTestAllSystemConfigurationsUseCase>,
    results: Arc<AbnTestResultsStorage>,
}

impl ControlPlane {
    /// Assemble a control plane
    ///
    /// # Errors
    /// Inconsistent settings or an invalid metric priority list
    pub fn new(settings: ControlPlaneSettings, gateways: Gateways) -> Result<Self, ControlPlaneError> {
        settings.validate()?;
        let metrics = settings.metrics_configuration()?;

        let registry = Arc::new(ConfigRegistry::new());
        let results = Arc::new(AbnTestResultsStorage::new());
        let propagator = BehaviourPropagator::new(
            Arc::clone(&gateways.locator),
            Arc::clone(&gateways.notifier),
            settings.experiment.max_in_flight_notifications,
        );

        let discovery = Arc::new(ServiceDiscoveryService::new(
            Arc::clone(&registry),
            gateways.discovery,
            gateways.validator,
            gateways.fetcher,
        ));
        let behaviours = BehaviourChangeService::new(Arc::clone(&registry), propagator.clone());

        let executor = UniformAbnTestExecutor::new(Arc::clone(&registry), propagator, gateways.metrics)
            .with_policy(settings.experiment.time_slice_policy());
        let generator = settings
            .experiment
            .max_configurations
            .map_or_else(SystemConfigurationsGenerator::new, |limit| {
                SystemConfigurationsGenerator::new().with_limit(limit)
            });
        let experiments = Arc::new(
            AbnTestAllSystemConfigurationsUseCase::new(
                Arc::clone(&registry),
                Arc::new(executor),
                SystemConfigurationsRanker::new(metrics),
                Arc::clone(&results),
            )
            .with_total_time(settings.experiment.total_time())
            .with_generator(generator),
        );

        Ok(Self {
            settings,
            registry,
            discovery,
            behaviours,
            experiments,
            results,
        })
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ControlPlaneSettings {
        &self.settings
    }

    /// Shared registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    /// Stored run results
    #[inline]
    #[must_use]
    pub fn results(&self) -> &Arc<AbnTestResultsStorage> {
        &self.results
    }

    /// Run a full discovery sweep now
    ///
    /// # Errors
    /// The discovery backend could not be queried
    pub async fn discover(&self) -> Result<DiscoveryReport, ControlPlaneError> {
        Ok(self.discovery.full_sweep().await?)
    }

    /// Run a quick availability sweep now
    ///
    /// # Errors
    /// The discovery backend could not be queried
    pub async fn refresh_availability(&self) -> Result<DiscoveryReport, ControlPlaneError> {
        Ok(self.discovery.quick_sweep().await?)
    }

    /// Switch one method of one service
    ///
    /// # Errors
    /// Malformed request or unknown target
    pub async fn change_behaviour(
        &self,
        request: &BehaviourChangeRequest,
    ) -> Result<PropagationReport, ControlPlaneError> {
        self.behaviours.change_behaviour(request).await
    }

    /// Put a service back on its template
    ///
    /// # Errors
    /// Blank or unknown service
    pub async fn reset_to_template(&self, service: &str) -> Result<Vec<PropagationReport>, ControlPlaneError> {
        self.behaviours.reset_to_template(service).await
    }

    /// Run one experiment now
    ///
    /// # Errors
    /// Another run in progress, oversized space, or unusable time budget
    pub async fn run_experiment(&self, cancel: &ExperimentCancellation) -> Result<AbnTestOutcome, ControlPlaneError> {
        Ok(self.experiments.execute(cancel).await?)
    }

    /// Most recent experiment result
    #[must_use]
    pub fn latest_result(&self) -> Option<Arc<SingleAbnTestResult>> {
        self.results.latest()
    }

    /// Experiment result by index
    #[must_use]
    pub fn result(&self, index: usize) -> Option<Arc<SingleAbnTestResult>> {
        self.results.get(index)
    }

    /// Start the periodic loops; each exits when `shutdown` fires
    ///
    /// The full discovery sweep runs immediately, the other loops after their
    /// first period. Must be called inside a tokio runtime. An experiment in
    /// progress is cancelled by the same token.
    #[must_use]
    pub fn spawn_background(&self, shutdown: &ExperimentCancellation) -> BackgroundTasks {
        let mut handles = Vec::new();

        if self.settings.discovery.enabled {
            let discovery = Arc::clone(&self.discovery);
            handles.push(spawn_periodic(
                "full discovery",
                Duration::from_secs(self.settings.discovery.full_interval_secs),
                true,
                shutdown.clone(),
                move || {
                    let discovery = Arc::clone(&discovery);
                    async move {
                        if let Err(e) = discovery.full_sweep().await {
                            tracing::warn!(error = %e, "Full discovery sweep failed");
                        }
                    }
                },
            ));

            let discovery = Arc::clone(&self.discovery);
            handles.push(spawn_periodic(
                "quick discovery",
                Duration::from_secs(self.settings.discovery.quick_interval_secs),
                false,
                shutdown.clone(),
                move || {
                    let discovery = Arc::clone(&discovery);
                    async move {
                        if let Err(e) = discovery.quick_sweep().await {
                            tracing::warn!(error = %e, "Quick discovery sweep failed");
                        }
                    }
                },
            ));
        }

        if let Some(interval) = self.settings.experiment.interval_secs {
            let experiments = Arc::clone(&self.experiments);
            let cancel = shutdown.clone();
            handles.push(spawn_periodic(
                "experiment",
                Duration::from_secs(interval),
                false,
                shutdown.clone(),
                move || {
                    let experiments = Arc::clone(&experiments);
                    let cancel = cancel.clone();
                    async move {
                        match experiments.execute(&cancel).await {
                            Ok(outcome) => tracing::debug!(?outcome, "Scheduled experiment finished"),
                            Err(e) => tracing::warn!(error = %e, "Scheduled experiment failed"),
                        }
                    }
                },
            ));
        }

        tracing::info!(loops = handles.len(), "Background loops started");
        BackgroundTasks { handles }
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    immediate: bool,
    shutdown: ExperimentCancellation,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let start = if immediate {
            tokio::time::Instant::now()
        } else {
            tokio::time::Instant::now() + period
        };
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => tick().await,
                () = shutdown.cancelled() => break,
            }
        }
        tracing::debug!(task = name, "Background loop stopped");
    })
}
