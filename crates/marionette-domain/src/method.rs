//! Per-method experimentation surface
//!
//! A [`MethodConfig`] records which behaviours a method offers, which one it
//! started with and which one is active now. The available set is an
//! [`im::OrdSet`], so iteration is sorted and copies share structure.

use crate::error::ConfigError;
use crate::values::BehaviourId;
use im::OrdSet;
use serde::{Deserialize, Serialize};

/// Behaviour configuration of a single method
///
/// # Invariants
/// - `available_behaviours` is non-empty
/// - `default_behaviour` and `current_behaviour` are members of it
///
/// Only `current_behaviour` ever changes after construction, and only
/// through [`MethodConfig::with_current_behaviour`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MethodConfigRepr")]
pub struct MethodConfig {
    default_behaviour: BehaviourId,
    current_behaviour: BehaviourId,
    available_behaviours: OrdSet<BehaviourId>,
}

#[derive(Deserialize)]
struct MethodConfigRepr {
    default_behaviour: BehaviourId,
    current_behaviour: BehaviourId,
    available_behaviours: OrdSet<BehaviourId>,
}

impl TryFrom<MethodConfigRepr> for MethodConfig {
    type Error = ConfigError;

    fn try_from(repr: MethodConfigRepr) -> Result<Self, Self::Error> {
        Self::new(
            repr.default_behaviour,
            repr.current_behaviour,
            repr.available_behaviours,
        )
    }
}

impl MethodConfig {
    /// Create a validated method configuration
    ///
    /// # Errors
    /// - [`ConfigError::EmptyBehaviourSet`] if no behaviour is given
    /// - [`ConfigError::DefaultNotAvailable`] / [`ConfigError::CurrentNotAvailable`]
    ///   if either selected behaviour is outside the available set
    pub fn new(
        default_behaviour: BehaviourId,
        current_behaviour: BehaviourId,
        available_behaviours: impl IntoIterator<Item = BehaviourId>,
    ) -> Result<Self, ConfigError> {
        let available_behaviours: OrdSet<BehaviourId> = available_behaviours.into_iter().collect();

        if available_behaviours.is_empty() {
            return Err(ConfigError::EmptyBehaviourSet);
        }
        if !available_behaviours.contains(&default_behaviour) {
            return Err(ConfigError::DefaultNotAvailable {
                default: default_behaviour,
            });
        }
        if !available_behaviours.contains(&current_behaviour) {
            return Err(ConfigError::CurrentNotAvailable {
                current: current_behaviour,
            });
        }

        Ok(Self {
            default_behaviour,
            current_behaviour,
            available_behaviours,
        })
    }

    /// Create a configuration freshly discovered: current equals default
    ///
    /// # Errors
    /// Same as [`MethodConfig::new`]
    pub fn discovered(
        default_behaviour: BehaviourId,
        available_behaviours: impl IntoIterator<Item = BehaviourId>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            default_behaviour.clone(),
            default_behaviour,
            available_behaviours,
        )
    }

    /// Parse raw strings into a validated configuration
    ///
    /// # Errors
    /// Identifier validation errors, then the errors of [`MethodConfig::new`]
    pub fn parse(
        default_behaviour: &str,
        current_behaviour: &str,
        available_behaviours: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self, ConfigError> {
        let available = available_behaviours
            .into_iter()
            .map(BehaviourId::new)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(
            BehaviourId::new(default_behaviour)?,
            BehaviourId::new(current_behaviour)?,
            available,
        )
    }

    /// Behaviour active when the method was first discovered
    #[inline]
    #[must_use]
    pub fn default_behaviour(&self) -> &BehaviourId {
        &self.default_behaviour
    }

    /// Behaviour currently selected
    #[inline]
    #[must_use]
    pub fn current_behaviour(&self) -> &BehaviourId {
        &self.current_behaviour
    }

    /// All behaviours the method offers, in sorted order
    #[inline]
    #[must_use]
    pub fn available_behaviours(&self) -> &OrdSet<BehaviourId> {
        &self.available_behaviours
    }

    /// Check if the method offers the given behaviour
    #[inline]
    #[must_use]
    pub fn offers(&self, behaviour: &BehaviourId) -> bool {
        self.available_behaviours.contains(behaviour)
    }

    /// Check if the method has more than one behaviour to choose from
    #[inline]
    #[must_use]
    pub fn is_variation_point(&self) -> bool {
        self.available_behaviours.len() > 1
    }

    /// Check if the current behaviour is still the default one
    #[inline]
    #[must_use]
    pub fn is_at_default(&self) -> bool {
        self.current_behaviour == self.default_behaviour
    }

    /// Copy of this configuration with a different current behaviour
    ///
    /// # Errors
    /// [`ConfigError::InvalidBehaviour`] if `behaviour` is not available;
    /// `self` is left untouched
    pub fn with_current_behaviour(&self, behaviour: BehaviourId) -> Result<Self, ConfigError> {
        if !self.offers(&behaviour) {
            return Err(ConfigError::InvalidBehaviour {
                behaviour,
                available: self.available_behaviours.iter().cloned().collect(),
            });
        }

        Ok(Self {
            current_behaviour: behaviour,
            ..self.clone()
        })
    }

    /// Copy of this configuration with current reset to default
    #[must_use]
    pub fn reset_to_default(&self) -> Self {
        Self {
            current_behaviour: self.default_behaviour.clone(),
            ..self.clone()
        }
    }
}
