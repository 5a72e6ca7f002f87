//! Variation points and system-wide behaviour configurations
//!
//! A variation point is a method with more than one available behaviour.
//! Points are extracted in service, class, method order, and their
//! behaviours are kept in sorted order, so the same registry contents always
//! produce the same experiment space and the same configuration ids.

use im::OrdMap;
use marionette_domain::{BehaviourId, ClassName, MethodName, ServiceConfig, ServiceName};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

const CONFIGURATION_PREFIX: &str = "conf-";

/// One independently variable decision point of the fleet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VariationPoint {
    service: ServiceName,
    class: ClassName,
    method: MethodName,
    available: Vec<BehaviourId>,
}

impl VariationPoint {
    /// Service owning the method
    #[inline]
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Class owning the method
    #[inline]
    #[must_use]
    pub fn class(&self) -> &ClassName {
        &self.class
    }

    /// Method name
    #[inline]
    #[must_use]
    pub fn method(&self) -> &MethodName {
        &self.method
    }

    /// Available behaviours in sorted order
    #[inline]
    #[must_use]
    pub fn available_behaviours(&self) -> &[BehaviourId] {
        &self.available
    }
}

impl Display for VariationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.service, self.class, self.method)
    }
}

/// Behaviour chosen for one variation point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleBehaviourSelection {
    point: Arc<VariationPoint>,
    behaviour: BehaviourId,
}

impl SingleBehaviourSelection {
    /// Create new selection
    #[inline]
    #[must_use]
    pub fn new(point: Arc<VariationPoint>, behaviour: BehaviourId) -> Self {
        Self { point, behaviour }
    }

    /// Variation point the selection applies to
    #[inline]
    #[must_use]
    pub fn point(&self) -> &VariationPoint {
        &self.point
    }

    /// Chosen behaviour
    #[inline]
    #[must_use]
    pub fn behaviour(&self) -> &BehaviourId {
        &self.behaviour
    }
}

/// Identifier of a generated configuration: `conf-<n>` in generation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigurationId(usize);

impl ConfigurationId {
    /// Identifier of the `index`-th generated configuration
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position in generation order
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CONFIGURATION_PREFIX}{}", self.0)
    }
}

impl FromStr for ConfigurationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(CONFIGURATION_PREFIX)
            .and_then(|n| n.parse().ok())
            .map(Self)
            .ok_or_else(|| format!("`{s}` is not a configuration id"))
    }
}

impl TryFrom<String> for ConfigurationId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfigurationId> for String {
    fn from(id: ConfigurationId) -> Self {
        id.to_string()
    }
}

/// One point of the experiment space: a behaviour for every variation point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemBehaviourConfiguration {
    id: ConfigurationId,
    selections: Vec<SingleBehaviourSelection>,
}

impl SystemBehaviourConfiguration {
    /// Create new configuration
    #[must_use]
    pub fn new(id: ConfigurationId, selections: Vec<SingleBehaviourSelection>) -> Self {
        Self { id, selections }
    }

    /// Configuration id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    /// Selections in variation point order
    #[inline]
    #[must_use]
    pub fn selections(&self) -> &[SingleBehaviourSelection] {
        &self.selections
    }

    /// Behaviour selected for a method, if it is a variation point
    #[must_use]
    pub fn selected_behaviour(
        &self,
        service: &ServiceName,
        class: &ClassName,
        method: &MethodName,
    ) -> Option<&BehaviourId> {
        self.selections
            .iter()
            .find(|s| {
                s.point.service() == service && s.point.class() == class && s.point.method() == method
            })
            .map(SingleBehaviourSelection::behaviour)
    }
}

/// Projects runtime configurations onto their variation points
#[derive(Debug, Clone, Copy, Default)]
pub struct VariationPointsExtractor;

impl VariationPointsExtractor {
    /// Every method offering more than one behaviour, in service, class, method order
    #[must_use]
    pub fn extract(configurations: &OrdMap<ServiceName, ServiceConfig>) -> Vec<VariationPoint> {
        configurations
            .values()
            .flat_map(|service| {
                service
                    .methods()
                    .filter(|(_, _, method)| method.is_variation_point())
                    .map(move |(class, name, method)| VariationPoint {
                        service: service.name().clone(),
                        class: class.clone(),
                        method: name.clone(),
                        available: method.available_behaviours().iter().cloned().collect(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_domain::{ClassConfig, MethodConfig};
    use pretty_assertions::assert_eq;

    fn service(name: &str, methods: &[(&str, &[&str])]) -> ServiceConfig {
        let methods = methods.iter().map(|(method, behaviours)| {
            (
                MethodName::new(method).unwrap(),
                MethodConfig::parse(behaviours[0], behaviours[0], behaviours.iter()).unwrap(),
            )
        });
        ServiceConfig::new(
            ServiceName::new(name).unwrap(),
            [ClassConfig::new(ClassName::new("Handler").unwrap(), methods).unwrap()],
        )
        .unwrap()
    }

    fn registry(services: Vec<ServiceConfig>) -> OrdMap<ServiceName, ServiceConfig> {
        services.into_iter().map(|s| (s.name().clone(), s)).collect()
    }

    #[test]
    fn single_option_methods_are_excluded() {
        let configs = registry(vec![service("svc", &[("A", &["v1", "v2"]), ("B", &["v1"])])]);
        let points = VariationPointsExtractor::extract(&configs);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].method().as_str(), "A");
        assert_eq!(points[0].to_string(), "svc/Handler#A");
    }

    #[test]
    fn extraction_order_is_deterministic() {
        let configs = registry(vec![
            service("zeta", &[("run", &["x", "y"])]),
            service("alpha", &[("b", &["q", "p"]), ("a", &["m", "n"])]),
        ]);
        let points = VariationPointsExtractor::extract(&configs);
        let order: Vec<String> = points.iter().map(ToString::to_string).collect();

        assert_eq!(
            order,
            vec!["alpha/Handler#a", "alpha/Handler#b", "zeta/Handler#run"]
        );
        let behaviours: Vec<&str> = points[1]
            .available_behaviours()
            .iter()
            .map(BehaviourId::as_str)
            .collect();
        assert_eq!(behaviours, vec!["p", "q"]);
    }

    #[test]
    fn empty_registry_has_no_points() {
        assert!(VariationPointsExtractor::extract(&OrdMap::new()).is_empty());
    }

    #[test]
    fn configuration_id_format() {
        let id = ConfigurationId::from_index(12);
        assert_eq!(id.to_string(), "conf-12");
        assert_eq!("conf-12".parse::<ConfigurationId>(), Ok(id));
        assert!("config-1".parse::<ConfigurationId>().is_err());
        assert!(ConfigurationId::from_index(9) < ConfigurationId::from_index(10));
    }
}
