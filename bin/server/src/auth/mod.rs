//! Authentication module for the login server.
//!
//! This module provides:
//! - The OAuth flow against the Hitobito identity provider
//! - Database-backed account provisioning and session correlation
//! - The HTTP routes for start, callback, and logout
//!
//! # Authorization Model
//!
//! Whether an identity may log in is decided per scope by the configured
//! [`AuthorizationPolicy`]: membership requirements, a section allow-list,
//! account auto-creation, and disabled-account overrides. Everything the
//! policy needs is carried by the provider's userinfo claims; no extra
//! provider round trips happen after the callback.

pub mod db;
pub mod oidc;
pub mod routes;

use hitobito_login_access::AuthorizationPolicy;
use sqlx::PgPool;

pub use oidc::OidcClient;
pub use routes::{callback, logout, start};

/// Shared application state.
pub struct AppState {
    /// Database connection pool.
    pub db_pool: PgPool,
    /// OAuth client for the identity provider.
    pub oidc_client: OidcClient,
    /// Per-scope login rules.
    pub policy: AuthorizationPolicy,
    /// Whether cookies carry the Secure flag.
    pub secure_cookies: bool,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        db_pool: PgPool,
        oidc_client: OidcClient,
        policy: AuthorizationPolicy,
        secure_cookies: bool,
    ) -> Self {
        Self {
            db_pool,
            oidc_client,
            policy,
            secure_cookies,
        }
    }
}
