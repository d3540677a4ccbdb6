//! Provider-side logout.
//!
//! Local logout always succeeds; this module only decides whether the
//! provider session can be terminated too. With an ID token at hand the
//! outcome carries the provider's end-session URL with an `id_token_hint`;
//! without one the caller is sent to the fallback URL and the outcome is
//! downgraded to a warning.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Whether the provider session could be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoutStatus {
    /// The provider logout URL carries an ID token hint.
    Success,
    /// No ID token was available; only the local session ended.
    Warning,
}

/// The logout decision handed back to the caller.
///
/// Serialized verbatim as the logout endpoint's JSON body, so the field
/// names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutOutcome {
    pub status: LogoutStatus,
    pub error: Option<String>,
    #[serde(rename = "withIdToken")]
    pub with_id_token: bool,
    #[serde(rename = "logoutUri")]
    pub logout_uri: String,
}

/// Builds the logout outcome for an optional ID token.
///
/// `endpoint` is the provider's end-session URL, `redirect_uri` the
/// address the provider sends the browser back to. Query values are
/// form-encoded; the endpoint itself is taken as configured.
#[must_use]
pub fn build_logout_outcome(
    endpoint: &str,
    id_token: Option<&str>,
    redirect_uri: &str,
) -> LogoutOutcome {
    match id_token.filter(|t| !t.is_empty()) {
        Some(id_token) => LogoutOutcome {
            status: LogoutStatus::Success,
            error: None,
            with_id_token: true,
            logout_uri: provider_logout_url(endpoint, id_token, redirect_uri),
        },
        None => LogoutOutcome {
            status: LogoutStatus::Warning,
            error: Some(
                "no ID token found for the current session; \
                 the provider session stays alive"
                    .to_string(),
            ),
            with_id_token: false,
            logout_uri: redirect_uri.to_string(),
        },
    }
}

fn provider_logout_url(endpoint: &str, id_token: &str, redirect_uri: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("id_token_hint", id_token)
        .append_pair("post_logout_redirect_uri", redirect_uri)
        .finish();

    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}{query}")
}

/// Decodes a base64-wrapped redirect target from the request.
///
/// Returns `None` for missing input, undecodable base64, and payloads
/// that are not UTF-8.
#[must_use]
pub fn decode_redirect_param(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let bytes = BASE64.decode(raw).ok()?;
    String::from_utf8(bytes).ok().filter(|s| !s.is_empty())
}
