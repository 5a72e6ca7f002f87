//! Raw configuration documents as fetched from a service instance
//!
//! These DTOs carry unvalidated strings. [`ServiceConfig::try_from`] turns a
//! document into a validated configuration; any malformed entry rejects the
//! whole document so the caller can skip that service.

use crate::class::ClassConfig;
use crate::error::ConfigError;
use crate::method::MethodConfig;
use crate::service::ServiceConfig;
use crate::values::{BehaviourId, ClassName, MethodName, ServiceName};
use serde::{Deserialize, Serialize};

/// Declared configuration of one service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceConfigData {
    /// Service name
    pub service_name: String,
    /// Declared classes
    #[serde(default)]
    pub classes: Vec<ClassConfigData>,
}

/// Declared configuration of one class
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassConfigData {
    /// Class name
    pub class_name: String,
    /// Declared methods
    #[serde(default)]
    pub methods: Vec<MethodConfigData>,
}

/// Declared configuration of one method
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodConfigData {
    /// Method name
    pub method_name: String,
    /// Behaviour active at startup
    pub default_behaviour: String,
    /// Behaviour active now, if the instance reports it
    ///
    /// Informational only: ingestion always starts a method at its default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_behaviour: Option<String>,
    /// All behaviours the method offers
    pub available_behaviours: Vec<String>,
}

impl TryFrom<&MethodConfigData> for MethodConfig {
    type Error = ConfigError;

    fn try_from(data: &MethodConfigData) -> Result<Self, Self::Error> {
        let available = data
            .available_behaviours
            .iter()
            .map(BehaviourId::new)
            .collect::<Result<Vec<_>, _>>()?;
        MethodConfig::discovered(BehaviourId::new(&data.default_behaviour)?, available)
    }
}

impl TryFrom<&ClassConfigData> for ClassConfig {
    type Error = ConfigError;

    fn try_from(data: &ClassConfigData) -> Result<Self, Self::Error> {
        let methods = data
            .methods
            .iter()
            .map(|m| Ok((MethodName::new(&m.method_name)?, MethodConfig::try_from(m)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        ClassConfig::new(ClassName::new(&data.class_name)?, methods)
    }
}

impl TryFrom<&ServiceConfigData> for ServiceConfig {
    type Error = ConfigError;

    fn try_from(data: &ServiceConfigData) -> Result<Self, Self::Error> {
        let classes = data
            .classes
            .iter()
            .map(ClassConfig::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        ServiceConfig::new(ServiceName::new(&data.service_name)?, classes)
    }
}

impl From<&ServiceConfig> for ServiceConfigData {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            service_name: config.name().to_string(),
            classes: config
                .classes()
                .map(|class| ClassConfigData {
                    class_name: class.name().to_string(),
                    methods: class
                        .methods()
                        .map(|(name, method)| MethodConfigData {
                            method_name: name.to_string(),
                            default_behaviour: method.default_behaviour().to_string(),
                            current_behaviour: Some(method.current_behaviour().to_string()),
                            available_behaviours: method
                                .available_behaviours()
                                .iter()
                                .map(ToString::to_string)
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
