//! Marionette A/B/n - exhaustive experimentation over service behaviours
//!
//! Pipeline, leaf first:
//! - [`VariationPointsExtractor`]: methods offering more than one behaviour
//! - [`SystemConfigurationsGenerator`]: lazy Cartesian product of their behaviours
//! - [`UniformAbnTestExecutor`]: applies each configuration, waits, samples metrics
//! - [`SystemMetricsAggregator`] / [`SystemConfigurationsRanker`]: lexicographic ranking
//! - [`AbnTestResultsStorage`]: append-only run history
//! - [`AbnTestAllSystemConfigurationsUseCase`]: the whole pipeline behind a run guard
//!
//! Remote instances and the metrics backend are reached through the traits in
//! [`ports`].

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod aggregator;
pub mod cancel;
pub mod error;
pub mod executor;
pub mod generator;
pub mod metrics;
pub mod ports;
pub mod propagation;
pub mod ranking;
pub mod storage;
pub mod usecase;
pub mod variation;

pub use aggregator::SystemMetricsAggregator;
pub use cancel::ExperimentCancellation;
pub use error::ExperimentError;
pub use executor::{AbnTestExecutor, ApplyReport, TimeSlicePolicy, UniformAbnTestExecutor};
pub use generator::{ConfigurationIter, SystemConfigurationsGenerator};
pub use metrics::{
    AggregateMetric, ConfigurationSample, GlobalMetricsRegistry, ServiceMetricsDataPoint,
    SystemMetricsDataPoint,
};
pub use ports::{BehaviourChangeGateway, InstanceAddress, InstanceLocator, MetricsGateway};
pub use propagation::{BehaviourChange, BehaviourPropagator, InstanceFailure, PropagationReport};
pub use ranking::{
    MetricPriority, MetricsConfiguration, OptimizationDirection, SimpleConfigurationRanking,
    SystemConfigurationsRanker,
};
pub use storage::{AbnTestResultsStorage, SingleAbnTestResult};
pub use usecase::{AbnTestAllSystemConfigurationsUseCase, AbnTestOutcome, SkipReason};
pub use variation::{
    ConfigurationId, SingleBehaviourSelection, SystemBehaviourConfiguration, VariationPoint,
    VariationPointsExtractor,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring an experiment
    pub use crate::{
        AbnTestAllSystemConfigurationsUseCase, AbnTestExecutor, AbnTestOutcome,
        AbnTestResultsStorage, BehaviourPropagator, ExperimentCancellation, ExperimentError,
        MetricsConfiguration, SystemConfigurationsRanker, UniformAbnTestExecutor,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
