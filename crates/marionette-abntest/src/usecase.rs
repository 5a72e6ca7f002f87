//! Top-level A/B/n run over every system configuration
//!
//! Pipeline: snapshot the registry, extract variation points, generate the
//! configuration space, execute it, rank the samples, and store the result.
//! Only one run may hold the fleet at a time.

use crate::cancel::ExperimentCancellation;
use crate::error::ExperimentError;
use crate::executor::AbnTestExecutor;
use crate::generator::SystemConfigurationsGenerator;
use crate::ranking::SystemConfigurationsRanker;
use crate::storage::{AbnTestResultsStorage, SingleAbnTestResult};
use crate::variation::VariationPointsExtractor;
use chrono::Utc;
use marionette_registry::ConfigRegistry;
use serde::Serialize;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use ulid::Ulid;

/// Default total time budget of a run
pub const DEFAULT_TOTAL_TIME: Duration = Duration::from_secs(120);

/// Why a run did not touch the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No method offers more than one behaviour
    NoVariationPoints,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoVariationPoints => f.write_str("no variation points in the fleet"),
        }
    }
}

/// Outcome of one use-case invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AbnTestOutcome {
    /// Nothing to experiment on
    Skipped {
        /// Why the run was skipped
        reason: SkipReason,
    },
    /// Run executed and stored
    Completed {
        /// Index in the results storage
        index: usize,
        /// Run identifier
        run_id: Ulid,
        /// Number of configurations planned
        configurations: usize,
        /// Whether every planned configuration was sampled
        complete: bool,
    },
}

/// Runs every system configuration and stores the ranked result
pub struct AbnTestAllSystemConfigurationsUseCase {
    registry: Arc<ConfigRegistry>,
    generator: SystemConfigurationsGenerator,
    executor: Arc<dyn AbnTestExecutor>,
    ranker: SystemConfigurationsRanker,
    storage: Arc<AbnTestResultsStorage>,
    total_time: Duration,
    run_guard: Mutex<()>,
}

impl fmt::Debug for AbnTestAllSystemConfigurationsUseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbnTestAllSystemConfigurationsUseCase")
            .field("generator", &self.generator)
            .field("total_time", &self.total_time)
            .finish_non_exhaustive()
    }
}

impl AbnTestAllSystemConfigurationsUseCase {
    /// Create new use case with the default total time
    #[must_use]
    pub fn new(
        registry: Arc<ConfigRegistry>,
        executor: Arc<dyn AbnTestExecutor>,
        ranker: SystemConfigurationsRanker,
        storage: Arc<AbnTestResultsStorage>,
    ) -> Self {
        Self {
            registry,
            generator: SystemConfigurationsGenerator::new(),
            executor,
            ranker,
            storage,
            total_time: DEFAULT_TOTAL_TIME,
            run_guard: Mutex::new(()),
        }
    }

    /// Use another total time budget
    #[inline]
    #[must_use]
    pub fn with_total_time(mut self, total_time: Duration) -> Self {
        self.total_time = total_time;
        self
    }

    /// Use another generator, e.g. one with a size cap
    #[inline]
    #[must_use]
    pub fn with_generator(mut self, generator: SystemConfigurationsGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Total time budget of a run
    #[inline]
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Check if a run currently holds the fleet
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    /// Run the whole pipeline once
    ///
    /// # Errors
    /// - [`ExperimentError::AlreadyRunning`] if another run is in progress
    /// - [`ExperimentError::TooManyConfigurations`] if the space exceeds the cap
    /// - executor errors for an unusable time budget
    pub async fn execute(&self, cancel: &ExperimentCancellation) -> Result<AbnTestOutcome, ExperimentError> {
        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| ExperimentError::AlreadyRunning)?;

        let snapshot = self.registry.snapshot();
        let points = VariationPointsExtractor::extract(snapshot.runtime());
        if points.is_empty() {
            let reason = SkipReason::NoVariationPoints;
            tracing::info!(services = snapshot.len(), "Skipping A/B/n test: {reason}");
            return Ok(AbnTestOutcome::Skipped { reason });
        }

        let configurations = self.generator.iter(&points)?;
        let planned = configurations.len();
        let run_id = Ulid::new();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            variation_points = points.len(),
            configurations = planned,
            "A/B/n run started"
        );

        let metrics_registry = self
            .executor
            .execute_abn_test(configurations, self.total_time, cancel)
            .await?;
        let ranking = self.ranker.rank(&metrics_registry);
        let complete = metrics_registry.is_complete();

        let index = self.storage.push(SingleAbnTestResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            complete,
            metrics_registry,
            ranking,
        });
        tracing::info!(run_id = %run_id, index, complete, "A/B/n run stored");

        Ok(AbnTestOutcome::Completed {
            index,
            run_id,
            configurations: planned,
            complete,
        })
    }
}
