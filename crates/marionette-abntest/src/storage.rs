//! Append-only history of completed experiment runs

use crate::metrics::GlobalMetricsRegistry;
use crate::ranking::SimpleConfigurationRanking;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use ulid::Ulid;

/// Outcome of one full experiment run
#[derive(Debug, Clone, Serialize)]
pub struct SingleAbnTestResult {
    /// Sortable run identifier
    pub run_id: Ulid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Whether every planned configuration was sampled
    pub complete: bool,
    /// Samples per configuration
    pub metrics_registry: GlobalMetricsRegistry,
    /// Configurations best first
    pub ranking: Vec<SimpleConfigurationRanking>,
}

impl SingleAbnTestResult {
    /// Best configuration of the run, if any was sampled
    #[must_use]
    pub fn best(&self) -> Option<&SimpleConfigurationRanking> {
        self.ranking.first()
    }
}

/// In-memory list of run results, retrievable by index
#[derive(Debug, Default)]
pub struct AbnTestResultsStorage {
    results: RwLock<Vec<Arc<SingleAbnTestResult>>>,
}

impl AbnTestResultsStorage {
    /// Create new empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result, returning its index
    pub fn push(&self, result: SingleAbnTestResult) -> usize {
        let mut results = self.results.write();
        results.push(Arc::new(result));
        results.len() - 1
    }

    /// Result at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arc<SingleAbnTestResult>> {
        self.results.read().get(index).cloned()
    }

    /// Most recent result
    #[must_use]
    pub fn latest(&self) -> Option<Arc<SingleAbnTestResult>> {
        self.results.read().last().cloned()
    }

    /// Every result, oldest first
    #[must_use]
    pub fn all(&self) -> Vec<Arc<SingleAbnTestResult>> {
        self.results.read().clone()
    }

    /// Number of stored results
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    /// Check if nothing was stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}
