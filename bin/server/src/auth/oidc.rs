//! OAuth client for the Hitobito identity provider.
//!
//! The provider speaks plain authorization-code OAuth with a userinfo
//! endpoint; no discovery document is fetched. Endpoints come straight
//! from the configuration. The token response is extended with the
//! optional `id_token` field so provider-side logout can present it
//! later as a hint.

use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    ExtraTokenFields, RedirectUrl, StandardRevocableToken, StandardTokenResponse, TokenResponse,
    TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use hitobito_login_access::{IdentityClaims, Result, Scope};

use crate::config::ProviderConfig;

/// Extra token-response fields the provider returns alongside the
/// standard set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    /// The OIDC ID token, when the requested scopes include `openid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

/// Token response with the ID token captured.
pub type ProviderTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type ProviderClient = oauth2::Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// The tokens one login produces.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: Option<String>,
}

/// OAuth client bound to the configured provider endpoints.
pub struct OidcClient {
    client: ProviderClient,
    http: reqwest::Client,
    config: ProviderConfig,
}

impl OidcClient {
    /// Builds the client from the provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when an endpoint URL does not parse or the HTTP
    /// client cannot be constructed.
    pub fn new(config: ProviderConfig) -> Result<Self, OidcError> {
        let auth_url = AuthUrl::new(config.authorize_url.clone())
            .map_err(|e| OidcError::endpoint("authorize_url", e))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| OidcError::endpoint("token_url", e))?;

        let client = oauth2::Client::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url);

        // Redirects must surface as errors so an attacker-controlled
        // provider response cannot bounce the token request elsewhere.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OidcError::Http {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            http,
            config,
        })
    }

    /// Returns the callback URL registered for the scope.
    fn redirect_url(&self, scope: Scope) -> Result<RedirectUrl, OidcError> {
        let base = self.config.redirect_base_url.trim_end_matches('/');
        Ok(RedirectUrl::new(format!("{base}/oidc/{scope}/callback"))
            .map_err(|e| OidcError::endpoint("redirect_base_url", e))?)
    }

    /// Builds the provider authorization URL for the scope, returning
    /// the URL and the CSRF state to pin in the caller's session.
    pub fn authorization_url(&self, scope: Scope) -> Result<(String, CsrfToken), OidcError> {
        let redirect = self.redirect_url(scope)?;

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_redirect_uri(Cow::Owned(redirect));

        for requested in &self.config.scopes {
            request = request.add_scope(oauth2::Scope::new(requested.clone()));
        }

        let (url, csrf) = request.url();
        Ok((url.to_string(), csrf))
    }

    /// Exchanges the authorization code for tokens.
    pub async fn exchange_code(&self, scope: Scope, code: &str) -> Result<TokenSet, OidcError> {
        let redirect = self.redirect_url(scope)?;

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_redirect_uri(Cow::Owned(redirect))
            .request_async(&self.http)
            .await
            .map_err(|e| OidcError::Exchange {
                reason: e.to_string(),
            })?;

        Ok(TokenSet {
            access_token: response.access_token().secret().clone(),
            id_token: response
                .extra_fields()
                .id_token
                .clone()
                .filter(|t| !t.is_empty()),
        })
    }

    /// Fetches the identity claims from the userinfo endpoint.
    pub async fn fetch_claims(&self, access_token: &str) -> Result<IdentityClaims, OidcError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OidcError::UserInfo {
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| OidcError::UserInfo {
                reason: e.to_string(),
            })?;

        Ok(response.json().await.map_err(|e| OidcError::UserInfo {
            reason: e.to_string(),
        })?)
    }

    /// The provider's end-session endpoint.
    #[must_use]
    pub fn logout_url(&self) -> &str {
        &self.config.logout_url
    }

    /// The configured fallback redirect after logout for the scope,
    /// made absolute against the server's base URL. The provider only
    /// accepts absolute `post_logout_redirect_uri` values.
    #[must_use]
    pub fn logout_redirect(&self, scope: Scope) -> String {
        let target = match scope {
            Scope::Frontend => &self.config.frontend_logout_redirect,
            Scope::Backend => &self.config.backend_logout_redirect,
        };

        if target.starts_with('/') {
            let base = self.config.redirect_base_url.trim_end_matches('/');
            format!("{base}{target}")
        } else {
            target.clone()
        }
    }
}

/// Errors from the OAuth flow.
#[derive(Debug)]
pub enum OidcError {
    /// A configured endpoint URL did not parse.
    Endpoint { field: &'static str, reason: String },
    /// The HTTP client could not be built.
    Http { reason: String },
    /// The token exchange failed.
    Exchange { reason: String },
    /// The userinfo request failed or returned an undecodable body.
    UserInfo { reason: String },
}

impl OidcError {
    fn endpoint(field: &'static str, err: url::ParseError) -> Self {
        Self::Endpoint {
            field,
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for OidcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint { field, reason } => {
                write!(f, "invalid provider endpoint {field}: {reason}")
            }
            Self::Http { reason } => write!(f, "http client setup failed: {reason}"),
            Self::Exchange { reason } => write!(f, "token exchange failed: {reason}"),
            Self::UserInfo { reason } => write!(f, "userinfo request failed: {reason}"),
        }
    }
}

impl std::error::Error for OidcError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            authorize_url: "https://idp.example.ch/oauth/authorize".to_string(),
            token_url: "https://idp.example.ch/oauth/token".to_string(),
            userinfo_url: "https://idp.example.ch/oauth/profile".to_string(),
            logout_url: "https://idp.example.ch/oauth/logout".to_string(),
            redirect_base_url: "https://app.example.ch/".to_string(),
            scopes: vec!["openid".to_string(), "with_roles".to_string()],
            frontend_logout_redirect: "/".to_string(),
            backend_logout_redirect: "/login".to_string(),
        }
    }

    #[test]
    fn authorization_url_carries_scope_callback_and_state() {
        let client = OidcClient::new(provider_config()).unwrap();
        let (url, csrf) = client.authorization_url(Scope::Frontend).unwrap();

        assert!(url.starts_with("https://idp.example.ch/oauth/authorize?"));
        assert!(url.contains("scope=openid+with_roles"));
        assert!(url.contains(&format!("state={}", csrf.secret())));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Fapp.example.ch%2Foidc%2Ffrontend%2Fcallback"
        ));
    }

    #[test]
    fn backend_and_frontend_use_distinct_callbacks() {
        let client = OidcClient::new(provider_config()).unwrap();
        let (frontend, _) = client.authorization_url(Scope::Frontend).unwrap();
        let (backend, _) = client.authorization_url(Scope::Backend).unwrap();

        assert!(frontend.contains("%2Foidc%2Ffrontend%2Fcallback"));
        assert!(backend.contains("%2Foidc%2Fbackend%2Fcallback"));
    }

    #[test]
    fn bad_endpoint_url_is_rejected_at_construction() {
        let mut config = provider_config();
        config.token_url = "not a url".to_string();
        let Err(err) = OidcClient::new(config) else {
            panic!("a malformed token_url must not construct a client");
        };
        assert!(err.to_string().contains("token_url"));
    }

    #[test]
    fn relative_logout_redirects_are_made_absolute() {
        let client = OidcClient::new(provider_config()).unwrap();
        assert_eq!(client.logout_redirect(Scope::Frontend), "https://app.example.ch/");
        assert_eq!(
            client.logout_redirect(Scope::Backend),
            "https://app.example.ch/login"
        );
    }

    #[test]
    fn absolute_logout_redirects_pass_through() {
        let mut config = provider_config();
        config.backend_logout_redirect = "https://other.example.ch/bye".to_string();
        let client = OidcClient::new(config).unwrap();
        assert_eq!(
            client.logout_redirect(Scope::Backend),
            "https://other.example.ch/bye"
        );
    }

    #[test]
    fn token_response_captures_the_id_token() {
        let json = r#"{
            "access_token": "at-123",
            "token_type": "bearer",
            "expires_in": 3600,
            "id_token": "idt-456"
        }"#;
        let response: ProviderTokenResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.access_token().secret(), "at-123");
        assert_eq!(response.extra_fields().id_token.as_deref(), Some("idt-456"));
    }

    #[test]
    fn token_response_without_id_token_still_parses() {
        let json = r#"{"access_token": "at-123", "token_type": "bearer"}"#;
        let response: ProviderTokenResponse = serde_json::from_str(json).unwrap();
        assert!(response.extra_fields().id_token.is_none());
    }
}
