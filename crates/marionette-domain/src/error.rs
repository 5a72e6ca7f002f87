//! Error types for the domain model
//!
//! Two families:
//! - [`ConfigError`]: validation failures raised synchronously by the value
//!   objects (blank identifiers, behaviours outside the available set,
//!   references to unknown classes or methods)
//! - [`GatewayError`]: transport failures reported by outbound collaborators
//!   (unreachable instance, non-success status, malformed payload, timeout)

use crate::values::{BehaviourId, ClassName, MethodName};

/// Validation errors for configuration value objects
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Identifier was empty or whitespace only
    #[error("{kind} cannot be blank")]
    BlankIdentifier {
        /// Identifier kind (e.g. "class name")
        kind: &'static str,
    },

    /// Method declared without any behaviour
    #[error("method declares no available behaviours")]
    EmptyBehaviourSet,

    /// Default behaviour missing from the available set
    #[error("default behaviour `{default}` is not among the available behaviours")]
    DefaultNotAvailable {
        /// Offending default behaviour
        default: BehaviourId,
    },

    /// Current behaviour missing from the available set
    #[error("current behaviour `{current}` is not among the available behaviours")]
    CurrentNotAvailable {
        /// Offending current behaviour
        current: BehaviourId,
    },

    /// Requested behaviour is not one of the method's variants
    #[error("behaviour `{behaviour}` is not available; expected one of [{}]", join_ids(.available))]
    InvalidBehaviour {
        /// Requested behaviour
        behaviour: BehaviourId,
        /// Behaviours the method actually offers
        available: Vec<BehaviourId>,
    },

    /// Class not present in the service configuration
    #[error("class `{class}` does not exist in the service configuration")]
    UnknownClass {
        /// Missing class
        class: ClassName,
    },

    /// Method not present in the class configuration
    #[error("method `{method}` does not exist in class `{class}`")]
    UnknownMethod {
        /// Owning class
        class: ClassName,
        /// Missing method
        method: MethodName,
    },

    /// Class declared twice in one service
    #[error("class `{class}` is declared more than once")]
    DuplicateClass {
        /// Duplicated class
        class: ClassName,
    },

    /// Method declared twice in one class
    #[error("method `{method}` is declared more than once in class `{class}`")]
    DuplicateMethod {
        /// Owning class
        class: ClassName,
        /// Duplicated method
        method: MethodName,
    },
}

impl ConfigError {
    /// Check if error refers to a class or method that does not exist
    #[inline]
    #[must_use]
    pub fn is_unknown_target(&self) -> bool {
        matches!(self, Self::UnknownClass { .. } | Self::UnknownMethod { .. })
    }
}

fn join_ids(ids: &[BehaviourId]) -> String {
    ids.iter()
        .map(BehaviourId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Transport failures reported by outbound gateways
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Target could not be reached
    #[error("{target} unreachable: {reason}")]
    Unreachable {
        /// Address or service that was called
        target: String,
        /// Underlying cause
        reason: String,
    },

    /// Target answered with a non-success status
    #[error("{target} answered with status {status}")]
    Status {
        /// Address or service that was called
        target: String,
        /// Status code returned
        status: u16,
    },

    /// Target answered with something we could not interpret
    #[error("malformed response from {target}: {reason}")]
    Malformed {
        /// Address or service that was called
        target: String,
        /// Parse failure
        reason: String,
    },

    /// Call did not complete in time
    #[error("request to {target} timed out after {timeout_ms}ms")]
    Timeout {
        /// Address or service that was called
        target: String,
        /// Elapsed budget
        timeout_ms: u64,
    },
}

impl GatewayError {
    /// Create an unreachable error
    #[inline]
    pub fn unreachable(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Address or service the failed call was aimed at
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Unreachable { target, .. }
            | Self::Status { target, .. }
            | Self::Malformed { target, .. }
            | Self::Timeout { target, .. } => target,
        }
    }

    /// Check if a later attempt could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed { .. } => false,
        }
    }
}
