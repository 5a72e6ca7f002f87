//! Periodic discovery of the service fleet
//!
//! Two sweep kinds keep the registry in line with what is running:
//! - full: refetch every configuration and refresh templates
//! - quick: availability only, no configuration traffic
//!
//! A failing service is recorded in the report and skipped; the sweep
//! always continues with the others.

use crate::ports::{ConfigurationFetcher, ServiceCandidate, ServiceDiscovery, ServiceValidator};
use futures::future::join_all;
use marionette_domain::{GatewayError, ServiceConfig, ServiceName};
use marionette_registry::{ConfigRegistry, Registration};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Which sweep produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    /// Configurations refetched
    Full,
    /// Availability only
    Quick,
}

/// Service skipped by a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryFailure {
    /// Skipped service
    pub service: ServiceName,
    /// Why it was skipped
    pub reason: String,
}

/// Summary of one discovery sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Sweep kind
    pub kind: SweepKind,
    /// Candidates accepted by the validator
    pub candidates: usize,
    /// Candidates the validator filtered out
    pub rejected: usize,
    /// Services registered for the first time
    pub registered: Vec<ServiceName>,
    /// Known services whose template was refreshed
    pub refreshed: Vec<ServiceName>,
    /// Known services confirmed alive by a quick sweep
    pub available: Vec<ServiceName>,
    /// Known services absent from the sweep
    pub unavailable: Vec<ServiceName>,
    /// Running services a quick sweep does not know yet
    pub unknown: Vec<ServiceName>,
    /// Services skipped because of fetch or mapping errors
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    fn new(kind: SweepKind, candidates: usize, rejected: usize) -> Self {
        Self {
            kind,
            candidates,
            rejected,
            registered: Vec::new(),
            refreshed: Vec::new(),
            available: Vec::new(),
            unavailable: Vec::new(),
            unknown: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, service: &ServiceName, reason: impl ToString) {
        let reason = reason.to_string();
        tracing::warn!(service = %service, reason = %reason, "Service skipped by discovery");
        self.failures.push(DiscoveryFailure {
            service: service.clone(),
            reason,
        });
    }
}

/// Keeps the registry in line with the running fleet
pub struct ServiceDiscoveryService {
    registry: Arc<ConfigRegistry>,
    discovery: Arc<dyn ServiceDiscovery>,
    validator: Arc<dyn ServiceValidator>,
    fetcher: Arc<dyn ConfigurationFetcher>,
}

impl std::fmt::Debug for ServiceDiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDiscoveryService")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ServiceDiscoveryService {
    /// Create new discovery service
    #[must_use]
    pub fn new(
        registry: Arc<ConfigRegistry>,
        discovery: Arc<dyn ServiceDiscovery>,
        validator: Arc<dyn ServiceValidator>,
        fetcher: Arc<dyn ConfigurationFetcher>,
    ) -> Self {
        Self {
            registry,
            discovery,
            validator,
            fetcher,
        }
    }

    async fn accepted_candidates(&self) -> Result<(Vec<ServiceCandidate>, usize), GatewayError> {
        let found = self.discovery.find_candidate_services().await?;
        let total = found.len();
        let accepted: Vec<ServiceCandidate> = found
            .into_iter()
            .filter(|c| self.validator.accepts(c))
            .collect();
        let rejected = total - accepted.len();
        Ok((accepted, rejected))
    }

    fn mark_missing(&self, present: &BTreeSet<&ServiceName>, report: &mut DiscoveryReport) {
        for service in self.registry.service_names() {
            if !present.contains(&service) && self.registry.mark_service_unavailable(&service) {
                report.unavailable.push(service);
            }
        }
    }

    /// Refetch every configuration and refresh the registry
    ///
    /// # Errors
    /// The candidate list itself could not be obtained; the registry is
    /// left untouched in that case
    pub async fn full_sweep(&self) -> Result<DiscoveryReport, GatewayError> {
        let (candidates, rejected) = self.accepted_candidates().await?;
        let mut report = DiscoveryReport::new(SweepKind::Full, candidates.len(), rejected);

        let present: BTreeSet<&ServiceName> = candidates.iter().map(|c| &c.name).collect();
        self.mark_missing(&present, &mut report);

        let fetches = candidates.iter().map(|candidate| async move {
            (candidate, self.fetcher.fetch_configuration(&candidate.endpoint).await)
        });
        for (candidate, fetched) in join_all(fetches).await {
            let data = match fetched {
                Ok(data) => data,
                Err(e) => {
                    report.fail(&candidate.name, e);
                    continue;
                }
            };
            let template = match ServiceConfig::try_from(&data) {
                Ok(template) => template,
                Err(e) => {
                    report.fail(&candidate.name, e);
                    continue;
                }
            };
            match self.registry.add_discovered_service(
                candidate.name.clone(),
                template,
                candidate.endpoint.clone(),
            ) {
                Ok(Registration::New) => report.registered.push(candidate.name.clone()),
                Ok(Registration::Refreshed) => report.refreshed.push(candidate.name.clone()),
                Err(e) => report.fail(&candidate.name, e),
            }
        }

        self.registry.record_discovery_sweep();
        tracing::info!(
            candidates = report.candidates,
            registered = report.registered.len(),
            refreshed = report.refreshed.len(),
            unavailable = report.unavailable.len(),
            failed = report.failures.len(),
            "Full discovery sweep finished"
        );
        Ok(report)
    }

    /// Refresh availability without fetching configurations
    ///
    /// # Errors
    /// The candidate list itself could not be obtained
    pub async fn quick_sweep(&self) -> Result<DiscoveryReport, GatewayError> {
        let (candidates, rejected) = self.accepted_candidates().await?;
        let mut report = DiscoveryReport::new(SweepKind::Quick, candidates.len(), rejected);

        let present: BTreeSet<&ServiceName> = candidates.iter().map(|c| &c.name).collect();
        self.mark_missing(&present, &mut report);

        for candidate in &candidates {
            if self
                .registry
                .mark_service_available(&candidate.name, candidate.endpoint.clone())
            {
                report.available.push(candidate.name.clone());
            } else {
                report.unknown.push(candidate.name.clone());
            }
        }

        self.registry.record_discovery_sweep();
        if !report.unknown.is_empty() {
            tracing::info!(
                unknown = report.unknown.len(),
                "New services seen; next full sweep will register them"
            );
        }
        tracing::debug!(
            available = report.available.len(),
            unavailable = report.unavailable.len(),
            "Quick discovery sweep finished"
        );
        Ok(report)
    }
}
