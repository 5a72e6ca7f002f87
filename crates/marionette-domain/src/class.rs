//! Class-level configuration
//!
//! Provides [`ClassConfig`], a persistent map from [`MethodName`] to
//! [`MethodConfig`]. Every update returns a new value sharing the untouched
//! method entries with the original.

use crate::error::ConfigError;
use crate::method::MethodConfig;
use crate::values::{BehaviourId, ClassName, MethodName};
use im::OrdMap;
use serde::{Deserialize, Serialize};

/// Methods of one class and their behaviour configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassConfig {
    name: ClassName,
    methods: OrdMap<MethodName, MethodConfig>,
}

impl ClassConfig {
    /// Create a class configuration from its methods
    ///
    /// # Errors
    /// [`ConfigError::DuplicateMethod`] if a method name appears twice
    pub fn new(
        name: ClassName,
        methods: impl IntoIterator<Item = (MethodName, MethodConfig)>,
    ) -> Result<Self, ConfigError> {
        let mut map = OrdMap::new();
        for (method, config) in methods {
            if map.contains_key(&method) {
                return Err(ConfigError::DuplicateMethod {
                    class: name,
                    method,
                });
            }
            map.insert(method, config);
        }

        Ok(Self { name, methods: map })
    }

    /// Create a class without methods
    #[inline]
    #[must_use]
    pub fn empty(name: ClassName) -> Self {
        Self {
            name,
            methods: OrdMap::new(),
        }
    }

    /// Class name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// Lookup a method
    #[inline]
    #[must_use]
    pub fn method(&self, method: &MethodName) -> Option<&MethodConfig> {
        self.methods.get(method)
    }

    /// Iterate methods in name order
    pub fn methods(&self) -> impl Iterator<Item = (&MethodName, &MethodConfig)> {
        self.methods.iter()
    }

    /// Number of methods
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if the class has no methods
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Copy with a method added or replaced
    #[must_use]
    pub fn with_method(&self, method: MethodName, config: MethodConfig) -> Self {
        Self {
            name: self.name.clone(),
            methods: self.methods.update(method, config),
        }
    }

    /// Copy with a method removed
    ///
    /// # Errors
    /// [`ConfigError::UnknownMethod`] if the method does not exist
    pub fn without_method(&self, method: &MethodName) -> Result<Self, ConfigError> {
        self.ensure_method(method)?;
        Ok(Self {
            name: self.name.clone(),
            methods: self.methods.without(method),
        })
    }

    /// Copy with one method switched to another behaviour
    ///
    /// # Errors
    /// - [`ConfigError::UnknownMethod`] if the method does not exist
    /// - [`ConfigError::InvalidBehaviour`] if the behaviour is not available
    pub fn with_current_behaviour(
        &self,
        method: &MethodName,
        behaviour: BehaviourId,
    ) -> Result<Self, ConfigError> {
        let updated = self.ensure_method(method)?.with_current_behaviour(behaviour)?;
        Ok(self.with_method(method.clone(), updated))
    }

    /// Copy with every method back on its default behaviour
    #[must_use]
    pub fn reset_to_defaults(&self) -> Self {
        Self {
            name: self.name.clone(),
            methods: self
                .methods
                .iter()
                .map(|(name, config)| (name.clone(), config.reset_to_default()))
                .collect(),
        }
    }

    fn ensure_method(&self, method: &MethodName) -> Result<&MethodConfig, ConfigError> {
        self.methods
            .get(method)
            .ok_or_else(|| ConfigError::UnknownMethod {
                class: self.name.clone(),
                method: method.clone(),
            })
    }
}
