//! Per-service to system-level metric aggregation

use crate::metrics::{AggregateMetric, SystemMetricsDataPoint};
use indexmap::IndexMap;

/// Averages each metric across the services that reported it
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMetricsAggregator;

impl SystemMetricsAggregator {
    /// One system-level metric per distinct name, in first-seen order
    ///
    /// Services missing a metric do not count towards its mean, and
    /// non-finite values are ignored. A metric nobody reported is absent.
    #[must_use]
    pub fn aggregate(data_point: &SystemMetricsDataPoint) -> Vec<AggregateMetric> {
        let mut sums: IndexMap<&str, (f64, u32, Option<&str>)> = IndexMap::new();

        for metric in data_point.services.iter().flat_map(|s| &s.metrics) {
            if !metric.value.is_finite() {
                tracing::debug!(
                    configuration = %data_point.configuration,
                    metric = %metric.name,
                    "Ignoring non-finite metric value"
                );
                continue;
            }
            let entry = sums
                .entry(metric.name.as_str())
                .or_insert((0.0, 0, metric.unit.as_deref()));
            entry.0 += metric.value;
            entry.1 += 1;
            if entry.2.is_none() {
                entry.2 = metric.unit.as_deref();
            }
        }

        sums.into_iter()
            .map(|(name, (sum, count, unit))| AggregateMetric {
                name: name.to_string(),
                value: sum / f64::from(count),
                unit: unit.map(str::to_string),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServiceMetricsDataPoint;
    use crate::variation::ConfigurationId;
    use chrono::Utc;
    use marionette_domain::ServiceName;

    fn service(name: &str, metrics: Vec<AggregateMetric>) -> ServiceMetricsDataPoint {
        ServiceMetricsDataPoint {
            service: ServiceName::new(name).unwrap(),
            metrics,
        }
    }

    fn point(services: Vec<ServiceMetricsDataPoint>) -> SystemMetricsDataPoint {
        SystemMetricsDataPoint {
            configuration: ConfigurationId::from_index(0),
            collected_at: Utc::now(),
            services,
        }
    }

    #[test]
    fn missing_metrics_are_excluded_not_zero() {
        let aggregated = SystemMetricsAggregator::aggregate(&point(vec![
            service("a", vec![AggregateMetric::new("latency", 100.0).with_unit("ms")]),
            service("b", vec![
                AggregateMetric::new("latency", 200.0),
                AggregateMetric::new("throughput", 40.0),
            ]),
            service("c", vec![]),
        ]));

        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].name, "latency");
        assert!((aggregated[0].value - 150.0).abs() < f64::EPSILON);
        assert_eq!(aggregated[0].unit.as_deref(), Some("ms"));
        assert_eq!(aggregated[1].name, "throughput");
        assert!((aggregated[1].value - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_values_ignored() {
        let aggregated = SystemMetricsAggregator::aggregate(&point(vec![
            service("a", vec![AggregateMetric::new("errors", f64::NAN)]),
            service("b", vec![AggregateMetric::new("errors", 2.0)]),
            service("c", vec![AggregateMetric::new("only_nan", f64::INFINITY)]),
        ]));

        assert_eq!(aggregated.len(), 1);
        assert!((aggregated[0].value - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_sample_aggregates_to_nothing() {
        assert!(SystemMetricsAggregator::aggregate(&point(vec![])).is_empty());
    }
}
