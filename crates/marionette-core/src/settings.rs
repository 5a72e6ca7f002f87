//! Control plane settings
//!
//! Resolution order:
//! 1. built-in defaults
//! 2. optional TOML file
//! 3. environment overrides
//!
//! Environment overrides cover the metrics backend URL and metric queries.
//! A query is defined by a group of variables sharing a key, e.g.
//! `MARIONETTE_METRICS_CONFIG_LATENCY_QUERY` and
//! `MARIONETTE_METRICS_CONFIG_LATENCY_DIRECTION` both configure `latency`.

use crate::error::SettingsError;
use marionette_abntest::{
    MetricPriority, MetricsConfiguration, OptimizationDirection, TimeSlicePolicy,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Variables naming the metrics backend, first non-blank wins
pub const BACKEND_URL_VARIABLES: [&str; 4] = [
    "PROMETHEUS_URL",
    "PROMETHEUS_ENDPOINT",
    "PROMETHEUS_SERVICE_URL",
    "MONITORING_PROMETHEUS_URL",
];

static METRIC_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^MARIONETTE_METRICS_CONFIG_([A-Z_]+)_(QUERY|DIRECTION|ORDER|DISPLAYNAME|UNIT|DESCRIPTION)$",
    )
    .expect("metric variable pattern is a valid regex")
});

/// Complete control plane settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlPlaneSettings {
    /// Discovery scheduling
    pub discovery: DiscoverySettings,
    /// Experiment parameters
    pub experiment: ExperimentSettings,
    /// Metrics backend and metric priorities
    pub metrics: MetricsSettings,
}

/// Discovery scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoverySettings {
    /// Run periodic discovery at all
    pub enabled: bool,
    /// Availability-only sweep period
    pub quick_interval_secs: u64,
    /// Full sweep period, refetching configurations
    pub full_interval_secs: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quick_interval_secs: 300,
            full_interval_secs: 1800,
        }
    }
}

/// Experiment parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentSettings {
    /// Total time budget of one run
    pub total_time_secs: u64,
    /// Period of automatic runs; manual only when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    /// Largest configuration space accepted; unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_configurations: Option<usize>,
    /// Bound on concurrent instance notifications
    pub max_in_flight_notifications: usize,
    /// Shorter time slices trigger a warning
    pub min_recommended_slice_secs: u64,
    /// Longer time slices trigger an informational warning
    pub max_recommended_slice_secs: u64,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            total_time_secs: 120,
            interval_secs: None,
            max_configurations: None,
            max_in_flight_notifications: 16,
            min_recommended_slice_secs: 30,
            max_recommended_slice_secs: 600,
        }
    }
}

impl ExperimentSettings {
    /// Total time budget as a duration
    #[inline]
    #[must_use]
    pub fn total_time(&self) -> Duration {
        Duration::from_secs(self.total_time_secs)
    }

    /// Time slice policy for the executor
    #[must_use]
    pub fn time_slice_policy(&self) -> TimeSlicePolicy {
        TimeSlicePolicy {
            min_recommended: Duration::from_secs(self.min_recommended_slice_secs),
            max_recommended: Duration::from_secs(self.max_recommended_slice_secs),
        }
    }
}

/// Metrics backend and metric priorities
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSettings {
    /// Base URL of the metrics backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    /// Metric queries
    pub queries: Vec<MetricQuery>,
}

/// One configured metric query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricQuery {
    /// Metric name used for ranking
    pub name: String,
    /// Backend query text
    #[serde(default)]
    pub query: String,
    /// Better direction
    #[serde(default = "default_direction")]
    pub direction: OptimizationDirection,
    /// Ranking priority, 1 is highest; appended after ordered metrics when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Unit label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_direction() -> OptimizationDirection {
    OptimizationDirection::Minimize
}

impl MetricQuery {
    /// Create new query minimizing the metric
    #[must_use]
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            direction: default_direction(),
            order: None,
            unit: None,
            display_name: None,
            description: None,
        }
    }
}

impl ControlPlaneSettings {
    /// Defaults, then the optional file, then the process environment
    ///
    /// # Errors
    /// Unreadable or malformed file, unusable environment values, or
    /// inconsistent result
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(std::env::vars())?;
        settings.validate()?;
        tracing::info!(
            metrics = settings.metrics.queries.len(),
            backend = settings.metrics.backend_url.as_deref().unwrap_or("<unset>"),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Parse a TOML settings file
    ///
    /// # Errors
    /// Unreadable or malformed file
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML settings text
    ///
    /// # Errors
    /// Malformed TOML or unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply environment overrides from `(name, value)` pairs
    ///
    /// # Errors
    /// [`SettingsError::InvalidEnv`] for an unparsable direction or order
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if let Some((name, url)) = BACKEND_URL_VARIABLES.iter().find_map(|name| {
            vars.get(*name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| (*name, v))
        }) {
            tracing::debug!(variable = name, "Metrics backend URL taken from environment");
            self.metrics.backend_url = Some(url.to_string());
        }

        for (name, value) in &vars {
            let Some(captures) = METRIC_VARIABLE.captures(name) else {
                continue;
            };
            let key = captures[1].to_lowercase();
            let query = self.query_entry(&key);
            match &captures[2] {
                "QUERY" => query.query = value.clone(),
                "DIRECTION" => {
                    query.direction = value.parse().map_err(|e| SettingsError::InvalidEnv {
                        name: name.clone(),
                        reason: format!("{e}"),
                    })?;
                }
                "ORDER" => {
                    let order = value.trim().parse().map_err(|e| SettingsError::InvalidEnv {
                        name: name.clone(),
                        reason: format!("order is not a positive integer: {e}"),
                    })?;
                    query.order = Some(order);
                }
                "DISPLAYNAME" => query.display_name = Some(value.clone()),
                "UNIT" => query.unit = Some(value.clone()),
                "DESCRIPTION" => query.description = Some(value.clone()),
                _ => {}
            }
        }
        Ok(())
    }

    fn query_entry(&mut self, name: &str) -> &mut MetricQuery {
        let position = self.metrics.queries.iter().position(|q| q.name == name);
        let index = position.unwrap_or_else(|| {
            self.metrics.queries.push(MetricQuery::new(name, ""));
            self.metrics.queries.len() - 1
        });
        &mut self.metrics.queries[index]
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    /// [`SettingsError::Invalid`] describing the first problem found
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.experiment.total_time_secs == 0 {
            return Err(SettingsError::invalid("experiment.total_time_secs must be positive"));
        }
        if self.experiment.max_in_flight_notifications == 0 {
            return Err(SettingsError::invalid(
                "experiment.max_in_flight_notifications must be positive",
            ));
        }
        if self.experiment.interval_secs == Some(0) {
            return Err(SettingsError::invalid("experiment.interval_secs must be positive"));
        }
        if self.discovery.enabled
            && (self.discovery.quick_interval_secs == 0 || self.discovery.full_interval_secs == 0)
        {
            return Err(SettingsError::invalid("discovery intervals must be positive"));
        }

        let mut names = HashSet::new();
        let mut orders = HashSet::new();
        for query in &self.metrics.queries {
            if query.name.trim().is_empty() {
                return Err(SettingsError::invalid("metric name is blank"));
            }
            if !names.insert(query.name.as_str()) {
                return Err(SettingsError::invalid(format!("metric `{}` defined twice", query.name)));
            }
            if query.query.trim().is_empty() {
                return Err(SettingsError::invalid(format!("metric `{}` has no query", query.name)));
            }
            if let Some(order) = query.order {
                if order == 0 {
                    return Err(SettingsError::invalid(format!(
                        "metric `{}` order must be at least 1",
                        query.name
                    )));
                }
                if !orders.insert(order) {
                    return Err(SettingsError::invalid(format!("priority order {order} used twice")));
                }
            }
        }
        Ok(())
    }

    /// Metric priority list for the ranker
    ///
    /// Metrics with an explicit order come first by order; the rest follow
    /// in name order.
    ///
    /// # Errors
    /// Invalid metric queries
    pub fn metrics_configuration(&self) -> Result<MetricsConfiguration, SettingsError> {
        self.validate()?;

        let mut ordered: Vec<&MetricQuery> =
            self.metrics.queries.iter().filter(|q| q.order.is_some()).collect();
        ordered.sort_by_key(|q| q.order);
        let mut unordered: Vec<&MetricQuery> =
            self.metrics.queries.iter().filter(|q| q.order.is_none()).collect();
        unordered.sort_by(|a, b| a.name.cmp(&b.name));

        let priorities = ordered
            .into_iter()
            .chain(unordered)
            .zip(1_u32..)
            .map(|(query, order)| MetricPriority::new(query.name.clone(), query.direction, order))
            .collect();

        MetricsConfiguration::new(priorities).map_err(|e| SettingsError::invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let settings = ControlPlaneSettings::default();
        assert!(settings.discovery.enabled);
        assert_eq!(settings.discovery.quick_interval_secs, 300);
        assert_eq!(settings.discovery.full_interval_secs, 1800);
        assert_eq!(settings.experiment.total_time(), Duration::from_secs(120));
        assert_eq!(settings.experiment.max_in_flight_notifications, 16);
        assert!(settings.experiment.interval_secs.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let settings = ControlPlaneSettings::from_toml_str(
            r#"
            [experiment]
            total_time_secs = 600
            max_configurations = 64

            [[metrics.queries]]
            name = "throughput"
            query = "sum(rate(requests_total[1m]))"
            direction = "MAXIMIZE"
            order = 2

            [[metrics.queries]]
            name = "latency"
            query = "avg(latency_ms)"
            order = 1
            unit = "ms"
            "#,
        )
        .unwrap();

        assert_eq!(settings.experiment.total_time_secs, 600);
        assert_eq!(settings.experiment.max_configurations, Some(64));
        assert_eq!(settings.experiment.min_recommended_slice_secs, 30);
        assert!(settings.discovery.enabled);

        let priorities = settings.metrics_configuration().unwrap();
        let names: Vec<_> = priorities.priorities().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["latency", "throughput"]);
        assert_eq!(
            priorities.priorities()[1].direction,
            OptimizationDirection::Maximize
        );
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = ControlPlaneSettings::from_toml_str("[experiment]\ntotal_secs = 3\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn backend_url_first_non_blank_variable_wins() {
        let mut settings = ControlPlaneSettings::default();
        settings
            .apply_env([
                ("PROMETHEUS_URL", "  "),
                ("PROMETHEUS_SERVICE_URL", "http://prometheus.monitoring:9090"),
                ("MONITORING_PROMETHEUS_URL", "http://other:9090"),
            ])
            .unwrap();
        assert_eq!(
            settings.metrics.backend_url.as_deref(),
            Some("http://prometheus.monitoring:9090")
        );
    }

    #[test]
    fn env_defines_and_overrides_metrics() {
        let mut settings = ControlPlaneSettings::from_toml_str(
            "[[metrics.queries]]\nname = \"latency\"\nquery = \"old\"\norder = 1\n",
        )
        .unwrap();
        settings
            .apply_env([
                ("MARIONETTE_METRICS_CONFIG_LATENCY_QUERY", "avg(new)"),
                ("MARIONETTE_METRICS_CONFIG_ERROR_RATE_QUERY", "sum(errors)"),
                ("MARIONETTE_METRICS_CONFIG_ERROR_RATE_UNIT", "%"),
                ("MARIONETTE_METRICS_CONFIG_ERROR_RATE_DISPLAYNAME", "Error rate"),
                ("MARIONETTE_METRICS_CONFIG_CPU_QUERY", "avg(cpu)"),
                ("MARIONETTE_METRICS_CONFIG_CPU_DIRECTION", "minimize"),
                ("UNRELATED", "x"),
            ])
            .unwrap();

        assert_eq!(settings.metrics.queries.len(), 3);
        assert_eq!(settings.metrics.queries[0].query, "avg(new)");
        let error_rate = settings
            .metrics
            .queries
            .iter()
            .find(|q| q.name == "error_rate")
            .unwrap();
        assert_eq!(error_rate.unit.as_deref(), Some("%"));
        assert_eq!(error_rate.display_name.as_deref(), Some("Error rate"));

        let names: Vec<_> = settings
            .metrics_configuration()
            .unwrap()
            .priorities()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["latency", "cpu", "error_rate"]);
    }

    #[test]
    fn repeated_env_passes_share_the_metric_pattern() {
        let mut settings = ControlPlaneSettings::default();
        for round in 1..=3 {
            settings
                .apply_env([
                    ("MARIONETTE_METRICS_CONFIG_CPU_QUERY", format!("avg(cpu[{round}m])")),
                    ("MARIONETTE_METRICS_CONFIG_CPU_COLOUR", "red".to_string()),
                    ("marionette_metrics_config_cpu_query", "ignored".to_string()),
                ])
                .unwrap();
        }

        assert_eq!(settings.metrics.queries.len(), 1);
        assert_eq!(settings.metrics.queries[0].name, "cpu");
        assert_eq!(settings.metrics.queries[0].query, "avg(cpu[3m])");
    }

    #[test]
    fn bad_env_values_rejected() {
        let mut settings = ControlPlaneSettings::default();
        let err = settings
            .apply_env([("MARIONETTE_METRICS_CONFIG_CPU_DIRECTION", "upwards")])
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnv { .. }));

        let err = settings
            .apply_env([("MARIONETTE_METRICS_CONFIG_CPU_ORDER", "first")])
            .unwrap_err();
        assert!(err.to_string().contains("MARIONETTE_METRICS_CONFIG_CPU_ORDER"));
    }

    #[test]
    fn validation_catches_inconsistencies() {
        let mut settings = ControlPlaneSettings::default();
        settings.metrics.queries = vec![MetricQuery::new("cpu", "")];
        assert!(settings.validate().is_err());

        settings.metrics.queries = vec![
            MetricQuery {
                order: Some(1),
                ..MetricQuery::new("cpu", "q")
            },
            MetricQuery {
                order: Some(1),
                ..MetricQuery::new("mem", "q")
            },
        ];
        assert!(settings.validate().unwrap_err().to_string().contains("order 1"));

        settings.metrics.queries = vec![MetricQuery::new("cpu", "q"), MetricQuery::new("cpu", "q")];
        assert!(settings.validate().is_err());

        let mut zero_budget = ControlPlaneSettings::default();
        zero_budget.experiment.total_time_secs = 0;
        assert!(zero_budget.validate().is_err());
    }

    #[test]
    fn serializes_back_to_toml() {
        let settings = ControlPlaneSettings::default();
        let text = toml::to_string(&settings).unwrap();
        assert_eq!(ControlPlaneSettings::from_toml_str(&text).unwrap(), settings);
    }
}
