//! Marionette Domain - behaviour configuration value objects
//!
//! Describes what each service of a fleet can do and what it is doing now:
//! - [`BehaviourId`], [`ClassName`], [`MethodName`], [`ServiceName`]: validated identifiers
//! - [`MethodConfig`]: default, current and available behaviours of one method
//! - [`ClassConfig`] / [`ServiceConfig`]: persistent maps with copy-on-write updates
//! - [`ServiceMetadata`]: registry-owned lifecycle information
//! - [`ServiceConfigData`]: raw documents fetched from instances
//!
//! # Example
//!
//! ```rust
//! use marionette_domain::{BehaviourId, ClassName, MethodName, ServiceConfigData, ServiceConfig};
//! use marionette_domain::{ClassConfigData, MethodConfigData};
//!
//! let data = ServiceConfigData {
//!     service_name: "checkout".into(),
//!     classes: vec![ClassConfigData {
//!         class_name: "Payment".into(),
//!         methods: vec![MethodConfigData {
//!             method_name: "charge".into(),
//!             default_behaviour: "sync".into(),
//!             current_behaviour: None,
//!             available_behaviours: vec!["sync".into(), "async".into()],
//!         }],
//!     }],
//! };
//!
//! let template = ServiceConfig::try_from(&data)?;
//! let runtime = template.with_current_behaviour(
//!     &ClassName::new("Payment")?,
//!     &MethodName::new("charge")?,
//!     BehaviourId::new("async")?,
//! )?;
//! assert_ne!(template, runtime);
//! # Ok::<(), marionette_domain::ConfigError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod class;
pub mod data;
pub mod error;
pub mod metadata;
pub mod method;
pub mod service;
pub mod values;

// Re-exports for convenience
pub use class::ClassConfig;
pub use data::{ClassConfigData, MethodConfigData, ServiceConfigData};
pub use error::{ConfigError, GatewayError};
pub use metadata::{ServiceMetadata, ServiceStatus};
pub use method::MethodConfig;
pub use service::{BehaviourDifference, ServiceConfig};
pub use values::{BehaviourId, ClassName, MethodName, ServiceName};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the domain model
    pub use crate::{
        BehaviourId, ClassConfig, ClassName, ConfigError, MethodConfig, MethodName,
        ServiceConfig, ServiceMetadata, ServiceName, ServiceStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
