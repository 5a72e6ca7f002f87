//! Service-level configuration
//!
//! A [`ServiceConfig`] is the unit the registry stores and swaps. It is a
//! persistent value: every update returns a new `ServiceConfig` that shares
//! all unmodified classes and methods with its predecessor, so template,
//! runtime and in-flight snapshots can never alias mutable state.

use crate::class::ClassConfig;
use crate::error::ConfigError;
use crate::method::MethodConfig;
use crate::values::{BehaviourId, ClassName, MethodName, ServiceName};
use im::OrdMap;
use serde::{Deserialize, Serialize};

/// Complete behaviour configuration of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ServiceConfigRepr", into = "ServiceConfigRepr")]
pub struct ServiceConfig {
    name: ServiceName,
    classes: OrdMap<ClassName, ClassConfig>,
}

#[derive(Serialize, Deserialize)]
struct ServiceConfigRepr {
    name: ServiceName,
    classes: Vec<ClassConfig>,
}

impl TryFrom<ServiceConfigRepr> for ServiceConfig {
    type Error = ConfigError;

    fn try_from(repr: ServiceConfigRepr) -> Result<Self, Self::Error> {
        Self::new(repr.name, repr.classes)
    }
}

impl From<ServiceConfig> for ServiceConfigRepr {
    fn from(config: ServiceConfig) -> Self {
        Self {
            name: config.name,
            classes: config.classes.into_iter().map(|(_, class)| class).collect(),
        }
    }
}

/// One method whose current behaviour differs between two configurations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BehaviourDifference {
    /// Owning class
    pub class: ClassName,
    /// Method that differs
    pub method: MethodName,
    /// Behaviour in the configuration compared from
    pub from: BehaviourId,
    /// Behaviour in the configuration compared to
    pub to: BehaviourId,
}

impl ServiceConfig {
    /// Create a service configuration from its classes
    ///
    /// # Errors
    /// [`ConfigError::DuplicateClass`] if two classes share a name
    pub fn new(
        name: ServiceName,
        classes: impl IntoIterator<Item = ClassConfig>,
    ) -> Result<Self, ConfigError> {
        let mut map = OrdMap::new();
        for class in classes {
            if map.contains_key(class.name()) {
                return Err(ConfigError::DuplicateClass {
                    class: class.name().clone(),
                });
            }
            map.insert(class.name().clone(), class);
        }

        Ok(Self { name, classes: map })
    }

    /// Create a service without classes
    #[inline]
    #[must_use]
    pub fn empty(name: ServiceName) -> Self {
        Self {
            name,
            classes: OrdMap::new(),
        }
    }

    /// Service name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    /// Lookup a class
    #[inline]
    #[must_use]
    pub fn class(&self, class: &ClassName) -> Option<&ClassConfig> {
        self.classes.get(class)
    }

    /// Iterate classes in name order
    pub fn classes(&self) -> impl Iterator<Item = &ClassConfig> {
        self.classes.values()
    }

    /// Iterate every method of every class, classes then methods in name order
    pub fn methods(&self) -> impl Iterator<Item = (&ClassName, &MethodName, &MethodConfig)> {
        self.classes.iter().flat_map(|(class_name, class)| {
            class
                .methods()
                .map(move |(method_name, method)| (class_name, method_name, method))
        })
    }

    /// Lookup a method
    #[must_use]
    pub fn method(&self, class: &ClassName, method: &MethodName) -> Option<&MethodConfig> {
        self.classes.get(class).and_then(|c| c.method(method))
    }

    /// Current behaviour of a method, if the method exists
    #[must_use]
    pub fn current_behaviour(&self, class: &ClassName, method: &MethodName) -> Option<&BehaviourId> {
        self.method(class, method).map(MethodConfig::current_behaviour)
    }

    /// Number of classes
    #[inline]
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of methods across all classes
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.classes.values().map(ClassConfig::len).sum()
    }

    /// Copy with a class added or replaced
    #[must_use]
    pub fn with_class(&self, class: ClassConfig) -> Self {
        Self {
            name: self.name.clone(),
            classes: self.classes.update(class.name().clone(), class),
        }
    }

    /// Copy with a class removed
    ///
    /// # Errors
    /// [`ConfigError::UnknownClass`] if the class does not exist
    pub fn removing_class(&self, class: &ClassName) -> Result<Self, ConfigError> {
        self.ensure_class(class)?;
        Ok(Self {
            name: self.name.clone(),
            classes: self.classes.without(class),
        })
    }

    /// Copy with one method switched to another behaviour
    ///
    /// Only the touched class entry is replaced; all other classes are
    /// shared with `self`.
    ///
    /// # Errors
    /// - [`ConfigError::UnknownClass`] if the class does not exist
    /// - [`ConfigError::UnknownMethod`] if the method does not exist
    /// - [`ConfigError::InvalidBehaviour`] if the behaviour is not available
    pub fn with_current_behaviour(
        &self,
        class: &ClassName,
        method: &MethodName,
        behaviour: BehaviourId,
    ) -> Result<Self, ConfigError> {
        let updated = self
            .ensure_class(class)?
            .with_current_behaviour(method, behaviour)?;
        Ok(self.with_class(updated))
    }

    /// Copy with every method back on its default behaviour
    #[must_use]
    pub fn reset_to_defaults(&self) -> Self {
        Self {
            name: self.name.clone(),
            classes: self
                .classes
                .iter()
                .map(|(name, class)| (name.clone(), class.reset_to_defaults()))
                .collect(),
        }
    }

    /// Methods present in both configurations whose current behaviour differs
    ///
    /// Ordered by class, then method.
    #[must_use]
    pub fn differences(&self, target: &ServiceConfig) -> Vec<BehaviourDifference> {
        self.methods()
            .filter_map(|(class, method, config)| {
                let to = target.current_behaviour(class, method)?;
                (config.current_behaviour() != to).then(|| BehaviourDifference {
                    class: class.clone(),
                    method: method.clone(),
                    from: config.current_behaviour().clone(),
                    to: to.clone(),
                })
            })
            .collect()
    }

    fn ensure_class(&self, class: &ClassName) -> Result<&ClassConfig, ConfigError> {
        self.classes
            .get(class)
            .ok_or_else(|| ConfigError::UnknownClass {
                class: class.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn svc() -> ServiceConfig {
        let checkout = ClassConfig::new(
            ClassName::new("Checkout").unwrap(),
            [(
                MethodName::new("pay").unwrap(),
                MethodConfig::parse("sync", "sync", ["sync", "async"]).unwrap(),
            )],
        )
        .unwrap();
        let catalog = ClassConfig::new(
            ClassName::new("Catalog").unwrap(),
            [(
                MethodName::new("search").unwrap(),
                MethodConfig::parse("linear", "linear", ["linear", "indexed"]).unwrap(),
            )],
        )
        .unwrap();
        ServiceConfig::new(ServiceName::new("shop").unwrap(), [checkout, catalog]).unwrap()
    }

    fn names(class: &str, method: &str) -> (ClassName, MethodName) {
        (ClassName::new(class).unwrap(), MethodName::new(method).unwrap())
    }

    #[test]
    fn point_mutation_routes_to_class() {
        let (class, method) = names("Checkout", "pay");
        let changed = svc()
            .with_current_behaviour(&class, &method, BehaviourId::new("async").unwrap())
            .unwrap();

        assert_eq!(
            changed.current_behaviour(&class, &method).map(BehaviourId::as_str),
            Some("async")
        );
    }

    #[test]
    fn point_mutation_shares_untouched_classes() {
        let original = svc();
        let (class, method) = names("Checkout", "pay");
        let changed = original
            .with_current_behaviour(&class, &method, BehaviourId::new("async").unwrap())
            .unwrap();

        let catalog = ClassName::new("Catalog").unwrap();
        assert_eq!(original.class(&catalog), changed.class(&catalog));
        assert_ne!(original, changed);
    }

    #[test]
    fn unknown_class_rejected() {
        let (class, method) = names("Billing", "pay");
        let err = svc()
            .with_current_behaviour(&class, &method, BehaviourId::new("sync").unwrap())
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownClass { class });
    }

    #[test]
    fn duplicate_classes_rejected() {
        let class = ClassConfig::empty(ClassName::new("A").unwrap());
        let err = ServiceConfig::new(ServiceName::new("s").unwrap(), [class.clone(), class])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateClass { .. }));
    }

    #[test]
    fn methods_iterate_classes_then_methods() {
        let order: Vec<_> = svc()
            .methods()
            .map(|(c, m, _)| format!("{c}.{m}"))
            .collect();
        assert_eq!(order, vec!["Catalog.search", "Checkout.pay"]);
    }

    #[test]
    fn differences_and_reset() {
        let template = svc();
        let (class, method) = names("Checkout", "pay");
        let runtime = template
            .with_current_behaviour(&class, &method, BehaviourId::new("async").unwrap())
            .unwrap();

        let diff = runtime.differences(&template);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].from.as_str(), "async");
        assert_eq!(diff[0].to.as_str(), "sync");

        assert_eq!(runtime.reset_to_defaults(), template);
    }

    #[test]
    fn serde_round_trip_keeps_class_order() {
        let config = svc();
        let json = serde_json::to_string(&config).unwrap();
        let back: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.method_count(), 2);
    }
}
