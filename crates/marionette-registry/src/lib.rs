//! Marionette Registry - single source of truth for fleet configuration
//!
//! Holds, per service:
//! - the template configuration, refreshed on every discovery
//! - the runtime configuration, changed by user edits and experiments
//! - lifecycle metadata (endpoint, last seen, status)
//!
//! All mutators are atomic entry swaps under one registry lock; whole-map
//! reads return persistent-map copies that never observe later writes.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod registry;
pub mod snapshot;

pub use error::RegistryError;
pub use registry::{ConfigRegistry, Registration, ResetOutcome};
pub use snapshot::RegistrySnapshot;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
