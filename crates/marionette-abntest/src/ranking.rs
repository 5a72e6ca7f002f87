//! Lexicographic multi-metric ranking of tested configurations
//!
//! Configurations are compared metric by metric in priority order. A side
//! missing the metric loses; both missing falls through to the next metric.
//! The sort is stable, so configurations equal on every metric keep their
//! execution order.

use crate::aggregator::SystemMetricsAggregator;
use crate::error::ExperimentError;
use crate::metrics::{AggregateMetric, GlobalMetricsRegistry, SystemMetricsDataPoint};
use crate::variation::ConfigurationId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::str::FromStr;

/// Which values of a metric are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationDirection {
    /// Lower is better
    #[serde(alias = "minimize", alias = "min")]
    Minimize,
    /// Higher is better
    #[serde(alias = "maximize", alias = "max")]
    Maximize,
}

impl OptimizationDirection {
    /// Order two values so that the better one compares `Less`
    #[inline]
    #[must_use]
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            Self::Minimize => a.total_cmp(&b),
            Self::Maximize => b.total_cmp(&a),
        }
    }
}

impl FromStr for OptimizationDirection {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimize" | "min" => Ok(Self::Minimize),
            "maximize" | "max" => Ok(Self::Maximize),
            other => Err(ExperimentError::invalid_metrics(format!(
                "unknown optimization direction `{other}`"
            ))),
        }
    }
}

/// One entry of the metric priority list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPriority {
    /// Metric name as reported by the metrics gateway
    pub name: String,
    /// Better direction
    pub direction: OptimizationDirection,
    /// Priority, 1 is highest
    pub order: u32,
}

impl MetricPriority {
    /// Create new priority entry
    #[must_use]
    pub fn new(name: impl Into<String>, direction: OptimizationDirection, order: u32) -> Self {
        Self {
            name: name.into(),
            direction,
            order,
        }
    }
}

/// Validated metric priority list, sorted by order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsConfiguration {
    priorities: Vec<MetricPriority>,
}

impl MetricsConfiguration {
    /// Create new configuration
    ///
    /// # Errors
    /// [`ExperimentError::InvalidMetricsConfiguration`] for blank or duplicate
    /// names and duplicate orders
    pub fn new(mut priorities: Vec<MetricPriority>) -> Result<Self, ExperimentError> {
        let mut names = HashSet::new();
        let mut orders = HashSet::new();
        for priority in &priorities {
            if priority.name.trim().is_empty() {
                return Err(ExperimentError::invalid_metrics("metric name is blank"));
            }
            if !names.insert(priority.name.as_str()) {
                return Err(ExperimentError::invalid_metrics(format!(
                    "metric `{}` configured twice",
                    priority.name
                )));
            }
            if !orders.insert(priority.order) {
                return Err(ExperimentError::invalid_metrics(format!(
                    "priority order {} used twice",
                    priority.order
                )));
            }
        }
        priorities.sort_by_key(|p| p.order);
        Ok(Self { priorities })
    }

    /// Priorities, highest first
    #[inline]
    #[must_use]
    pub fn priorities(&self) -> &[MetricPriority] {
        &self.priorities
    }

    /// Compare two aggregated metric sets; `Less` means `a` is better
    #[must_use]
    pub fn compare(&self, a: &[AggregateMetric], b: &[AggregateMetric]) -> Ordering {
        for priority in &self.priorities {
            let ordering = match (value_of(a, &priority.name), value_of(b, &priority.name)) {
                (Some(x), Some(y)) => priority.direction.compare(x, y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn value_of(metrics: &[AggregateMetric], name: &str) -> Option<f64> {
    metrics.iter().find(|m| m.name == name).map(|m| m.value)
}

/// Ranked position of one tested configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleConfigurationRanking {
    /// 1-based rank, 1 is best
    pub rank: usize,
    /// Ranked configuration
    pub configuration: ConfigurationId,
    /// Aggregated system metrics it was ranked on
    pub system_metrics: Vec<AggregateMetric>,
}

/// Orders tested configurations by the metric priority list
#[derive(Debug, Clone, Default)]
pub struct SystemConfigurationsRanker {
    metrics: MetricsConfiguration,
}

impl SystemConfigurationsRanker {
    /// Create new ranker
    #[inline]
    #[must_use]
    pub fn new(metrics: MetricsConfiguration) -> Self {
        Self { metrics }
    }

    /// Metric priority list in use
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &MetricsConfiguration {
        &self.metrics
    }

    /// Rank every sample of a finished run
    #[must_use]
    pub fn rank(&self, registry: &GlobalMetricsRegistry) -> Vec<SimpleConfigurationRanking> {
        self.rank_data_points(registry.data_points())
    }

    /// Rank metrics data points given in execution order
    pub fn rank_data_points<'a>(
        &self,
        data_points: impl IntoIterator<Item = (ConfigurationId, &'a SystemMetricsDataPoint)>,
    ) -> Vec<SimpleConfigurationRanking> {
        let mut aggregated: Vec<(ConfigurationId, Vec<AggregateMetric>)> = data_points
            .into_iter()
            .map(|(id, point)| (id, SystemMetricsAggregator::aggregate(point)))
            .collect();
        aggregated.sort_by(|(_, a), (_, b)| self.metrics.compare(a, b));

        let ranking: Vec<SimpleConfigurationRanking> = aggregated
            .into_iter()
            .enumerate()
            .map(|(i, (configuration, system_metrics))| SimpleConfigurationRanking {
                rank: i + 1,
                configuration,
                system_metrics,
            })
            .collect();

        tracing::info!("Configuration ranking:\n{}", render_table(&self.metrics, &ranking));
        ranking
    }
}

/// Plain-text table of a ranking, one column per prioritized metric
#[must_use]
pub fn render_table(metrics: &MetricsConfiguration, ranking: &[SimpleConfigurationRanking]) -> String {
    let mut table = format!("{:>4}  {:<10}", "rank", "config");
    for priority in metrics.priorities() {
        table.push_str(&format!("  {:>14}", priority.name));
    }
    table.push('\n');

    for entry in ranking {
        table.push_str(&format!("{:>4}  {:<10}", entry.rank, entry.configuration.to_string()));
        for priority in metrics.priorities() {
            let cell = match value_of(&entry.system_metrics, &priority.name) {
                Some(value) => format!("  {value:>14.3}"),
                None => format!("  {:>14}", "-"),
            };
            table.push_str(&cell);
        }
        table.push('\n');
    }
    table
}
