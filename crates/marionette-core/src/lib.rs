//! Marionette Core - the control plane around the registry and experiment engine
//!
//! Provides:
//! - [`ControlPlaneSettings`]: TOML file plus environment overrides
//! - [`ServiceDiscoveryService`]: full and quick discovery sweeps
//! - [`BehaviourChangeService`]: single behaviour changes and template resets
//! - [`ControlPlane`]: wiring and background scheduling
//! - [`SimulatedFleet`]: in-process fleet implementing every outbound port

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod behaviour;
pub mod control_plane;
pub mod discovery;
pub mod error;
pub mod ports;
pub mod settings;
pub mod simulation;

pub use behaviour::{BehaviourChangeRequest, BehaviourChangeService};
pub use control_plane::{BackgroundTasks, ControlPlane, Gateways};
pub use discovery::{DiscoveryFailure, DiscoveryReport, ServiceDiscoveryService, SweepKind};
pub use error::{ControlPlaneError, SettingsError};
pub use ports::{AcceptAll, ConfigurationFetcher, ServiceCandidate, ServiceDiscovery, ServiceValidator};
pub use settings::{
    ControlPlaneSettings, DiscoverySettings, ExperimentSettings, MetricQuery, MetricsSettings,
};
pub use simulation::{SimulatedFleet, SimulationConfig};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running a control plane
    pub use crate::{
        BehaviourChangeRequest, ControlPlane, ControlPlaneError, ControlPlaneSettings, Gateways,
        SimulatedFleet, SimulationConfig,
    };
    pub use marionette_abntest::{AbnTestOutcome, ExperimentCancellation};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
