//! Application scope: front office vs. back office.
//!
//! The login client serves two independent authentication contexts. The
//! public-facing site authenticates members, the administrative backend
//! authenticates staff users. Policy rules, account lookup and the session
//! key for the correlation token all depend on the scope.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The application scope a login or logout targets.
///
/// Not to be confused with OAuth scopes (the permission strings requested
/// from the identity provider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The public-facing application (member accounts).
    Frontend,
    /// The administrative application (staff accounts).
    Backend,
}

impl Scope {
    /// Returns the scope name as used in routes and configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
        }
    }

    /// Returns the session key under which the correlation token is stored
    /// for this scope.
    #[must_use]
    pub fn session_key(&self) -> &'static str {
        match self {
            Self::Frontend => "login_session_frontend",
            Self::Backend => "login_session_backend",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a scope from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseScopeError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for ParseScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown scope '{}'", self.input)
    }
}

impl std::error::Error for ParseScopeError {}

impl FromStr for Scope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            other => Err(ParseScopeError {
                input: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trips_through_str() {
        for scope in [Scope::Frontend, Scope::Backend] {
            assert_eq!(scope.as_str().parse::<Scope>(), Ok(scope));
        }
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let err = "sideoffice".parse::<Scope>().unwrap_err();
        assert!(err.to_string().contains("sideoffice"));
    }

    #[test]
    fn session_keys_are_distinct_per_scope() {
        assert_ne!(
            Scope::Frontend.session_key(),
            Scope::Backend.session_key()
        );
    }

    #[test]
    fn scope_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Scope::Backend).expect("serialize"),
            "\"backend\""
        );
    }
}
