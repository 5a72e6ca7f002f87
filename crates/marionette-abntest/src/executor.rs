//! Drives the live fleet through generated configurations
//!
//! Configurations run strictly one after another. For each one the
//! executor:
//! 1. applies it with diff-and-apply (registry first, then fan-out)
//! 2. waits one time slice without holding any lock
//! 3. snapshots the registry and collects metrics from every service
//! 4. records the sample under the configuration id
//!
//! Instance and service failures degrade to missing data; only invalid
//! input rejects a run.

use crate::cancel::ExperimentCancellation;
use crate::error::ExperimentError;
use crate::generator::ConfigurationIter;
use crate::metrics::{ConfigurationSample, GlobalMetricsRegistry, ServiceMetricsDataPoint, SystemMetricsDataPoint};
use crate::ports::MetricsGateway;
use crate::propagation::{BehaviourChange, BehaviourPropagator, PropagationReport};
use crate::variation::{ConfigurationId, SystemBehaviourConfiguration};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use marionette_registry::{ConfigRegistry, RegistrySnapshot};
use std::sync::Arc;
use std::time::Duration;

/// Time slice below which a warning recommends a larger budget
pub const DEFAULT_MIN_RECOMMENDED_SLICE: Duration = Duration::from_secs(30);

/// Time slice above which an informational warning is emitted
pub const DEFAULT_MAX_RECOMMENDED_SLICE: Duration = Duration::from_secs(600);

/// Runs a set of configurations against the fleet
#[async_trait]
pub trait AbnTestExecutor: Send + Sync {
    /// Apply, stabilize and sample every configuration in order
    ///
    /// Stops early, returning what was sampled so far, when `cancel` fires.
    ///
    /// # Errors
    /// Empty configuration set or a total time that cannot be split
    async fn execute_abn_test(
        &self,
        configurations: ConfigurationIter,
        total_time: Duration,
        cancel: &ExperimentCancellation,
    ) -> Result<GlobalMetricsRegistry, ExperimentError>;
}

/// Recommended bounds of the per-configuration time slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlicePolicy {
    /// Slices shorter than this trigger a warning
    pub min_recommended: Duration,
    /// Slices longer than this trigger an informational warning
    pub max_recommended: Duration,
}

impl Default for TimeSlicePolicy {
    fn default() -> Self {
        Self {
            min_recommended: DEFAULT_MIN_RECOMMENDED_SLICE,
            max_recommended: DEFAULT_MAX_RECOMMENDED_SLICE,
        }
    }
}

impl TimeSlicePolicy {
    /// Split `total_time` evenly over `configurations`, in whole seconds
    ///
    /// A slice that would be zero is clamped to one second.
    ///
    /// # Errors
    /// - [`ExperimentError::NoConfigurations`] if `configurations` is zero
    /// - [`ExperimentError::InvalidTotalTime`] if `total_time` is zero
    pub fn compute_time_slice(
        &self,
        total_time: Duration,
        configurations: usize,
    ) -> Result<Duration, ExperimentError> {
        if configurations == 0 {
            return Err(ExperimentError::NoConfigurations);
        }
        if total_time.is_zero() {
            return Err(ExperimentError::InvalidTotalTime);
        }
        let total_secs = total_time.as_secs();
        let count = u64::try_from(configurations).unwrap_or(u64::MAX);
        let slice_secs = total_secs / count;
        let recommended_total = count.saturating_mul(self.min_recommended.as_secs());

        if slice_secs == 0 {
            tracing::warn!(
                total_secs,
                configurations,
                recommended_total_secs = recommended_total,
                "Time slice rounds to zero; clamping to 1s"
            );
            return Ok(Duration::from_secs(1));
        }

        let slice = Duration::from_secs(slice_secs);
        if slice < self.min_recommended {
            tracing::warn!(
                slice_secs,
                configurations,
                recommended_total_secs = recommended_total,
                "Time slice is short; metrics may not be representative"
            );
        } else if slice > self.max_recommended {
            tracing::warn!(
                slice_secs,
                configurations,
                "Time slice is long; the experiment will take a while"
            );
        }
        Ok(slice)
    }
}

/// Result of applying one configuration
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// Selections already in place
    pub skipped: usize,
    /// Selections written to the registry and propagated
    pub applied: usize,
    /// Selections the registry rejected
    pub rejected: usize,
    /// Fan-out outcome per applied selection
    pub propagation: Vec<PropagationReport>,
}

impl ApplyReport {
    /// Number of instance notifications issued
    #[must_use]
    pub fn notifications(&self) -> usize {
        self.propagation.iter().map(|p| p.total).sum()
    }
}

/// Executor giving every configuration an equal share of the time budget
#[derive(Clone)]
pub struct UniformAbnTestExecutor {
    registry: Arc<ConfigRegistry>,
    propagator: BehaviourPropagator,
    metrics: Arc<dyn MetricsGateway>,
    policy: TimeSlicePolicy,
}

impl std::fmt::Debug for UniformAbnTestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformAbnTestExecutor")
            .field("registry", &self.registry)
            .field("propagator", &self.propagator)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl UniformAbnTestExecutor {
    /// Create new executor
    #[must_use]
    pub fn new(
        registry: Arc<ConfigRegistry>,
        propagator: BehaviourPropagator,
        metrics: Arc<dyn MetricsGateway>,
    ) -> Self {
        Self {
            registry,
            propagator,
            metrics,
            policy: TimeSlicePolicy::default(),
        }
    }

    /// Use other recommended slice bounds
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: TimeSlicePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Slice policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> TimeSlicePolicy {
        self.policy
    }

    /// Bring the registry and fleet to one configuration
    ///
    /// Selections already active are skipped, so applying the same
    /// configuration twice issues no notifications the second time.
    pub async fn apply_configuration(&self, configuration: &SystemBehaviourConfiguration) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut changes = Vec::new();

        for selection in configuration.selections() {
            let point = selection.point();
            let target = selection.behaviour();
            match self
                .registry
                .current_behaviour(point.service(), point.class(), point.method())
            {
                Ok(current) if &current == target => {
                    report.skipped += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(point = %point, error = %e, "Variation point no longer resolvable");
                    report.rejected += 1;
                    continue;
                }
            }

            match self.registry.modify_current_behaviour_for_method(
                point.service(),
                point.class(),
                point.method(),
                target.clone(),
            ) {
                Ok(_) => {
                    report.applied += 1;
                    changes.push(BehaviourChange {
                        service: point.service().clone(),
                        class: point.class().clone(),
                        method: point.method().clone(),
                        behaviour: target.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(point = %point, behaviour = %target, error = %e, "Registry rejected selection");
                    report.rejected += 1;
                }
            }
        }

        report.propagation = self.propagator.propagate_all(changes).await;
        tracing::debug!(
            configuration = %configuration.id(),
            applied = report.applied,
            skipped = report.skipped,
            rejected = report.rejected,
            "Configuration applied"
        );
        report
    }

    async fn collect_metrics(
        &self,
        configuration: ConfigurationId,
        snapshot: &RegistrySnapshot,
        window: Duration,
    ) -> SystemMetricsDataPoint {
        let fetches = snapshot.service_names().map(|service| async move {
            let metrics = match self.metrics.fetch_metrics_for_service(service, window).await {
                Ok(metrics) => metrics,
                Err(e) => {
                    tracing::warn!(
                        configuration = %configuration,
                        service = %service,
                        error = %e,
                        "Metrics unavailable; recording empty sample"
                    );
                    Vec::new()
                }
            };
            ServiceMetricsDataPoint {
                service: service.clone(),
                metrics,
            }
        });

        SystemMetricsDataPoint {
            configuration,
            collected_at: Utc::now(),
            services: join_all(fetches).await,
        }
    }
}

#[async_trait]
impl AbnTestExecutor for UniformAbnTestExecutor {
    async fn execute_abn_test(
        &self,
        configurations: ConfigurationIter,
        total_time: Duration,
        cancel: &ExperimentCancellation,
    ) -> Result<GlobalMetricsRegistry, ExperimentError> {
        let planned = configurations.len();
        let slice = self.policy.compute_time_slice(total_time, planned)?;
        let mut results = GlobalMetricsRegistry::new(planned);

        tracing::info!(
            configurations = planned,
            slice_secs = slice.as_secs(),
            "Starting A/B/n test"
        );

        for configuration in configurations {
            let id = configuration.id();
            if cancel.is_cancelled() {
                tracing::warn!(next = %id, "Experiment cancelled before apply");
                break;
            }

            let applied = self.apply_configuration(&configuration).await;
            tracing::info!(
                configuration = %id,
                notifications = applied.notifications(),
                "Configuration live; stabilizing"
            );

            tokio::select! {
                () = tokio::time::sleep(slice) => {}
                () = cancel.cancelled() => {
                    tracing::warn!(configuration = %id, "Experiment cancelled while stabilizing; sample discarded");
                    break;
                }
            }

            let snapshot = self.registry.snapshot();
            let metrics = self.collect_metrics(id, &snapshot, slice).await;
            results.record(ConfigurationSample {
                configuration,
                metrics,
                snapshot,
            })?;
        }

        tracing::info!(
            sampled = results.len(),
            planned,
            "A/B/n test finished"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TimeSlicePolicy {
        TimeSlicePolicy::default()
    }

    #[test]
    fn slice_is_even_whole_seconds() {
        assert_eq!(
            policy().compute_time_slice(Duration::from_secs(120), 4),
            Ok(Duration::from_secs(30))
        );
        assert_eq!(
            policy().compute_time_slice(Duration::from_millis(125_900), 4),
            Ok(Duration::from_secs(31))
        );
    }

    #[test]
    fn zero_slice_clamps_to_one_second() {
        assert_eq!(
            policy().compute_time_slice(Duration::from_secs(3), 8),
            Ok(Duration::from_secs(1))
        );
    }

    #[test]
    fn sub_second_budget_clamps_to_one_second() {
        assert_eq!(
            policy().compute_time_slice(Duration::from_millis(500), 2),
            Ok(Duration::from_secs(1))
        );
    }

    #[test]
    fn long_slice_is_not_fatal() {
        assert_eq!(
            policy().compute_time_slice(Duration::from_secs(3600), 2),
            Ok(Duration::from_secs(1800))
        );
    }

    #[test]
    fn invalid_inputs_rejected() {
        assert_eq!(
            policy().compute_time_slice(Duration::from_secs(60), 0),
            Err(ExperimentError::NoConfigurations)
        );
        assert_eq!(
            policy().compute_time_slice(Duration::ZERO, 3),
            Err(ExperimentError::InvalidTotalTime)
        );
        assert_eq!(
            policy().compute_time_slice(Duration::from_millis(999), 3),
            Ok(Duration::from_secs(1))
        );
    }
}
