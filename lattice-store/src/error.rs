//! Error types.

use thiserror::Error;

use crate::object::PropertyKey;
use crate::reactive::SubscriberId;

/// Errors raised by proxied state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `define_property` was given a descriptor a single reactive cell cannot
    /// represent: an accessor, or one with a flag explicitly set to `false`.
    #[error(
        "property `{key}` must be defined with a writable, enumerable and configurable value descriptor"
    )]
    UnsupportedDescriptor { key: PropertyKey },

    /// Something tried to change the prototype of proxied state.
    #[error("cannot set the prototype of proxied state")]
    PrototypeFixed,

    /// A computation mutated state it was never given ownership of.
    ///
    /// This is a diagnostic: it is logged and queued, never returned.
    #[error("{owner} mutated {} it does not own", describe(.key))]
    OwnershipViolation {
        key: Option<PropertyKey>,
        owner: SubscriberId,
    },
}

fn describe(key: &Option<PropertyKey>) -> String {
    match key {
        Some(key) => format!("property `{key}` of state"),
        None => String::from("state"),
    }
}

/// Result alias for proxy operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_property() {
        let err = StoreError::UnsupportedDescriptor { key: "a".into() };
        assert!(err.to_string().contains("`a`"));

        let owner = SubscriberId::new();
        let err = StoreError::OwnershipViolation {
            key: Some(PropertyKey::Index(2)),
            owner,
        };
        assert_eq!(
            err.to_string(),
            format!("{owner} mutated property `2` of state it does not own")
        );
    }
}
