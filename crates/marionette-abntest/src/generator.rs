//! Cartesian expansion of variation points into system configurations
//!
//! The space grows as the product of every point's behaviour count, which
//! bounds how many variation points a fleet can practically experiment on.
//! Configurations are therefore produced lazily, one at a time, by
//! [`ConfigurationIter`]. Full enumeration is the default; a cap can be set
//! with [`SystemConfigurationsGenerator::with_limit`] to reject oversized
//! spaces up front.
//!
//! Order is an odometer over the variation-point list: the last point varies
//! fastest. The `n`-th configuration produced is `conf-<n>`.

use crate::error::ExperimentError;
use crate::variation::{
    ConfigurationId, SingleBehaviourSelection, SystemBehaviourConfiguration, VariationPoint,
};
use std::iter::FusedIterator;
use std::sync::Arc;

/// Expands variation points into system configurations
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemConfigurationsGenerator {
    limit: Option<usize>,
}

impl SystemConfigurationsGenerator {
    /// Create new generator enumerating the full space
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject spaces larger than `limit`
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Configured cap, if any
    #[inline]
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Size of the space, `None` if it overflows `usize`
    ///
    /// Zero variation points yield zero configurations, not one.
    #[must_use]
    pub fn count(points: &[VariationPoint]) -> Option<usize> {
        if points.is_empty() {
            return Some(0);
        }
        points
            .iter()
            .try_fold(1_usize, |acc, p| acc.checked_mul(p.available_behaviours().len()))
    }

    /// Lazy iterator over every configuration
    ///
    /// # Errors
    /// [`ExperimentError::TooManyConfigurations`] if the space overflows or
    /// exceeds the configured cap
    pub fn iter(&self, points: &[VariationPoint]) -> Result<ConfigurationIter, ExperimentError> {
        let limit = self.limit.unwrap_or(usize::MAX);
        match Self::count(points) {
            Some(count) if count <= limit => Ok(ConfigurationIter::new(points, count)),
            count => Err(ExperimentError::TooManyConfigurations { count, limit }),
        }
    }

    /// Every configuration collected eagerly
    ///
    /// # Errors
    /// Same as [`Self::iter`]
    pub fn generate(
        &self,
        points: &[VariationPoint],
    ) -> Result<Vec<SystemBehaviourConfiguration>, ExperimentError> {
        Ok(self.iter(points)?.collect())
    }
}

/// Lazy odometer over the configuration space
#[derive(Debug, Clone)]
pub struct ConfigurationIter {
    points: Vec<Arc<VariationPoint>>,
    digits: Vec<usize>,
    next: usize,
    total: usize,
}

impl ConfigurationIter {
    fn new(points: &[VariationPoint], total: usize) -> Self {
        Self {
            points: points.iter().cloned().map(Arc::new).collect(),
            digits: vec![0; points.len()],
            next: 0,
            total,
        }
    }

    /// Variation points every configuration assigns
    #[must_use]
    pub fn points(&self) -> &[Arc<VariationPoint>] {
        &self.points
    }

    fn advance(&mut self) {
        for (digit, point) in self.digits.iter_mut().zip(&self.points).rev() {
            *digit += 1;
            if *digit < point.available_behaviours().len() {
                return;
            }
            *digit = 0;
        }
    }
}

impl Iterator for ConfigurationIter {
    type Item = SystemBehaviourConfiguration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let selections = self
            .points
            .iter()
            .zip(&self.digits)
            .map(|(point, &digit)| {
                SingleBehaviourSelection::new(
                    Arc::clone(point),
                    point.available_behaviours()[digit].clone(),
                )
            })
            .collect();
        let configuration =
            SystemBehaviourConfiguration::new(ConfigurationId::from_index(self.next), selections);
        self.next += 1;
        self.advance();
        Some(configuration)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ConfigurationIter {}

impl FusedIterator for ConfigurationIter {}
