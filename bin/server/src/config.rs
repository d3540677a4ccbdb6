//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from `HITOBITO__`-prefixed environment
//! variables (nested fields use `__`, e.g.
//! `HITOBITO__PROVIDER__CLIENT_ID`). Unknown keys under the prefix are
//! rejected so a typoed setting fails startup instead of silently
//! falling back to a default.

use hitobito_login_access::{AuthorizationPolicy, ScopeRules, SectionIdMap};
use serde::Deserialize;
use std::collections::HashMap;

/// Server configuration composed from provider and per-scope settings.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Identity-provider endpoints and client credentials.
    pub provider: ProviderConfig,

    /// Login rules for the member-facing frontend scope.
    #[serde(default)]
    pub frontend: ScopeRuleConfig,

    /// Login rules for the administrative backend scope.
    #[serde(default)]
    pub backend: ScopeRuleConfig,

    /// Mapping from legacy provider section ids to current ones.
    /// Unmapped ids pass through unchanged.
    #[serde(default = "default_section_id_map")]
    pub section_id_map: HashMap<u32, u32>,

    /// Interval between correlation-record reaper runs, in seconds.
    #[serde(default = "default_reap_interval_seconds")]
    pub reap_interval_seconds: u64,
}

/// Identity-provider endpoints and OAuth client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,

    /// Authorization endpoint of the provider.
    pub authorize_url: String,
    /// Token endpoint of the provider.
    pub token_url: String,
    /// Userinfo endpoint queried with the access token.
    pub userinfo_url: String,
    /// End-session endpoint used for provider-side logout.
    pub logout_url: String,

    /// Public base URL of this server; the per-scope callback paths are
    /// appended to it.
    pub redirect_base_url: String,

    /// OAuth scopes requested at authorization.
    #[serde(default = "default_oauth_scopes")]
    pub scopes: Vec<String>,

    /// Where the browser lands after a frontend logout when the request
    /// names no target.
    #[serde(default = "default_frontend_logout_redirect")]
    pub frontend_logout_redirect: String,

    /// Same for backend logouts.
    #[serde(default = "default_backend_logout_redirect")]
    pub backend_logout_redirect: String,
}

/// One scope's login rules as configured.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeRuleConfig {
    #[serde(default)]
    pub allowed_section_ids: Vec<u32>,
    #[serde(default)]
    pub members_only: bool,
    #[serde(default)]
    pub section_members_only: bool,
    #[serde(default)]
    pub auto_create_account: bool,
    #[serde(default)]
    pub allow_login_if_disabled: bool,
    #[serde(default)]
    pub add_to_groups: Vec<u32>,
}

impl ScopeRuleConfig {
    fn into_rules(self) -> ScopeRules {
        ScopeRules {
            allowed_section_ids: self.allowed_section_ids,
            members_only: self.members_only,
            section_members_only: self.section_members_only,
            auto_create_account: self.auto_create_account,
            allow_login_if_disabled: self.allow_login_if_disabled,
            add_to_groups: self.add_to_groups,
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_oauth_scopes() -> Vec<String> {
    ["openid", "with_roles", "user_groups"]
        .map(str::to_string)
        .to_vec()
}

fn default_frontend_logout_redirect() -> String {
    "/".to_string()
}

fn default_backend_logout_redirect() -> String {
    "/login".to_string()
}

/// Legacy section ids the provider still reports, mapped to their
/// current counterparts.
fn default_section_id_map() -> HashMap<u32, u32> {
    [
        (1415, 4250),
        (1420, 4251),
        (1425, 4252),
        (1430, 4253),
        (1435, 4254),
    ]
    .into_iter()
    .collect()
}

fn default_reap_interval_seconds() -> u64 {
    86_400
}

impl ServerConfig {
    /// Loads configuration from `HITOBITO__`-prefixed environment
    /// variables. Variables outside the prefix are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing, invalid,
    /// or carries an unknown key.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("HITOBITO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builds the authorization policy from the configured rules.
    #[must_use]
    pub fn policy(&self) -> AuthorizationPolicy {
        AuthorizationPolicy::new(
            self.frontend.clone().into_rules(),
            self.backend.clone().into_rules(),
            SectionIdMap::from(self.section_id_map.clone()),
        )
    }
}
