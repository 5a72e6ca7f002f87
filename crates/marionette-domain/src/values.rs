//! Validated identifiers
//!
//! [`ServiceName`], [`ClassName`], [`MethodName`] and [`BehaviourId`] are
//! non-blank strings stored trimmed. Equality, ordering and hashing are by
//! the underlying string, so they are used directly as map keys.
//!
//! Deserialization goes through the same validation, so a payload can never
//! smuggle in a blank identifier.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and trim a raw identifier
            ///
            /// # Errors
            /// Returns [`ConfigError::BlankIdentifier`] for empty or
            /// whitespace-only input
            pub fn new(raw: impl AsRef<str>) -> Result<Self, ConfigError> {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(ConfigError::BlankIdentifier { kind: $kind });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the identifier as a string slice
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ConfigError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ConfigError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// Name of a deployed service
    ServiceName,
    "service name"
);

identifier!(
    /// Fully qualified name of a class exposing switchable methods
    ClassName,
    "class name"
);

identifier!(
    /// Name of a method with one or more behaviours
    MethodName,
    "method name"
);

identifier!(
    /// Opaque identifier of one implementation variant of a method
    BehaviourId,
    "behaviour id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_trimmed() {
        let name = ServiceName::new("  orders \n").unwrap();
        assert_eq!(name.as_str(), "orders");
        assert_eq!(name, ServiceName::new("orders").unwrap());
    }

    #[test]
    fn blank_identifiers_rejected() {
        assert_eq!(
            ClassName::new("   "),
            Err(ConfigError::BlankIdentifier { kind: "class name" })
        );
        assert!(MethodName::new("").is_err());
        assert!(BehaviourId::from_str("\t").is_err());
    }

    #[test]
    fn identifiers_order_by_string() {
        let a = BehaviourId::new("alpha").unwrap();
        let b = BehaviourId::new("beta").unwrap();
        assert!(a < b);
    }

    #[test]
    fn deserialization_validates() {
        let ok: MethodName = serde_json::from_str("\" pay \"").unwrap();
        assert_eq!(ok.as_str(), "pay");

        let blank: Result<MethodName, _> = serde_json::from_str("\"  \"");
        assert!(blank.is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = BehaviourId::new("cached").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cached\"");
    }
}
