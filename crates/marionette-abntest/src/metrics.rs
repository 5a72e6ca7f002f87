//! Metric samples collected while configurations are live

use crate::error::ExperimentError;
use crate::variation::{ConfigurationId, SystemBehaviourConfiguration};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use marionette_domain::ServiceName;
use marionette_registry::RegistrySnapshot;
use serde::{Deserialize, Serialize};

/// One named metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetric {
    /// Metric name, as configured in the metric priority list
    pub name: String,
    /// Observed value
    pub value: f64,
    /// Unit label, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl AggregateMetric {
    /// Create new metric
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
        }
    }

    /// Attach a unit label
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Metrics one service reported for one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetricsDataPoint {
    /// Reporting service
    pub service: ServiceName,
    /// Reported metrics; empty when the fetch failed
    pub metrics: Vec<AggregateMetric>,
}

impl ServiceMetricsDataPoint {
    /// Value of a metric, if reported
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }
}

/// Per-service metrics observed for one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricsDataPoint {
    /// Configuration that was live
    pub configuration: ConfigurationId,
    /// Collection time
    pub collected_at: DateTime<Utc>,
    /// One entry per queried service
    pub services: Vec<ServiceMetricsDataPoint>,
}

/// Everything recorded for one tested configuration
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationSample {
    /// Configuration that was applied
    pub configuration: SystemBehaviourConfiguration,
    /// Metrics observed while it was live
    pub metrics: SystemMetricsDataPoint,
    /// Registry state at collection time
    pub snapshot: RegistrySnapshot,
}

/// Write-once map of configuration id to its sample, in execution order
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalMetricsRegistry {
    expected: usize,
    samples: IndexMap<ConfigurationId, ConfigurationSample>,
}

impl GlobalMetricsRegistry {
    /// Create new registry expecting `expected` samples
    #[must_use]
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            samples: IndexMap::with_capacity(expected),
        }
    }

    /// Record the sample of a configuration
    ///
    /// # Errors
    /// [`ExperimentError::DuplicateConfiguration`] if the id was already recorded
    pub fn record(&mut self, sample: ConfigurationSample) -> Result<(), ExperimentError> {
        let id = sample.configuration.id();
        if self.samples.contains_key(&id) {
            return Err(ExperimentError::DuplicateConfiguration(id));
        }
        self.samples.insert(id, sample);
        Ok(())
    }

    /// Sample of a configuration
    #[must_use]
    pub fn get(&self, id: ConfigurationId) -> Option<&ConfigurationSample> {
        self.samples.get(&id)
    }

    /// Samples in execution order
    pub fn samples(&self) -> impl Iterator<Item = &ConfigurationSample> {
        self.samples.values()
    }

    /// Metrics of every configuration in execution order
    pub fn data_points(&self) -> impl Iterator<Item = (ConfigurationId, &SystemMetricsDataPoint)> {
        self.samples.iter().map(|(id, sample)| (*id, &sample.metrics))
    }

    /// Number of recorded samples
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if nothing was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples the run set out to collect
    #[inline]
    #[must_use]
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Check if every planned configuration was sampled
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.samples.len() == self.expected
    }
}
