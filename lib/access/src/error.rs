//! Error types for the access crate.
//!
//! Errors are designed for layered context using rootcause: the storage
//! layer reports a plain [`StoreError`], callers add request-level context
//! via `.context()` as the error propagates up.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for top-level error
/// handling in the server binary.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Errors from the persistent stores.
///
/// Login and provisioning treat these as hard failures; the logout path
/// degrades to a local-only logout instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or the statement failed.
    Unavailable { reason: String },
    /// A row was read but could not be decoded into the domain type.
    Decode { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => {
                write!(f, "store unavailable: {reason}")
            }
            Self::Decode { reason } => {
                write!(f, "stored row could not be decoded: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_display_carries_reason() {
        let err = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn decode_display_carries_reason() {
        let err = StoreError::Decode {
            reason: "section_ids is not a JSON array".to_string(),
        };
        assert!(err.to_string().contains("section_ids"));
    }
}
