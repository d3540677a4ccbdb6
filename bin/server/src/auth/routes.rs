//! HTTP routes for login start, provider callback, and logout.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration as TimeDuration;

use hitobito_login_access::{
    CORRELATION_TTL_SECS, CorrelationStore, LoginOrchestrator, LoginOutcome, LoginRejection,
    Scope, build_logout_outcome, decode_redirect_param,
};

use super::{
    AppState,
    db::{CorrelationRepository, MemberRepository},
};

/// CSRF state cookie set while the browser visits the provider.
const AUTH_STATE_COOKIE: &str = "oauth_state";

/// Cookie carrying the post-login redirect target.
const LOGIN_REDIRECT_COOKIE: &str = "login_redirect";

/// Query parameters for the start route.
#[derive(Debug, Deserialize)]
pub struct StartQuery {
    /// Base64-encoded target to land on after the login completes.
    redirect: Option<String>,
}

/// Query parameters for the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

/// Query parameters for the logout route.
#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    /// Base64-encoded `post_logout_redirect_uri`.
    redirect: Option<String>,
}

fn scoped_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10))
        .build()
}

fn removal_cookie(name: String) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .max_age(TimeDuration::ZERO)
        .build()
}

/// Initiates the login flow by redirecting to the identity provider.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<Scope>,
    Query(query): Query<StartQuery>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    let (auth_url, csrf) = state
        .oidc_client
        .authorization_url(scope)
        .map_err(|e| AuthError::Provider(e.to_string()))?;

    let mut jar = jar.add(scoped_cookie(
        AUTH_STATE_COOKIE,
        csrf.secret().clone(),
        state.secure_cookies,
    ));

    if let Some(target) = decode_redirect_param(query.redirect.as_deref()) {
        jar = jar.add(scoped_cookie(
            LOGIN_REDIRECT_COOKIE,
            target,
            state.secure_cookies,
        ));
    }

    Ok((jar, Redirect::to(&auth_url)).into_response())
}

/// Handles the provider callback: code exchange, claims fetch, login
/// orchestration, and session correlation.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<Scope>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    let state_cookie = jar.get(AUTH_STATE_COOKIE).ok_or(AuthError::MissingState)?;
    if query.state != state_cookie.value() {
        return Err(AuthError::StateMismatch);
    }

    let tokens = state
        .oidc_client
        .exchange_code(scope, &query.code)
        .await
        .map_err(|e| AuthError::Provider(e.to_string()))?;

    let claims = state
        .oidc_client
        .fetch_claims(&tokens.access_token)
        .await
        .map_err(|e| AuthError::Provider(e.to_string()))?;

    let members = MemberRepository::new(state.db_pool.clone());
    let orchestrator = LoginOrchestrator::new(&members, &state.policy);
    let outcome = orchestrator
        .authenticate(&claims, scope)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

    let member = match outcome {
        LoginOutcome::Succeeded { member, .. } => member,
        LoginOutcome::Rejected(rejection) => return Err(AuthError::Rejected(rejection)),
    };

    // Pin the provider's ID token to this session so logout can present
    // it as a hint later.
    let correlations = CorrelationRepository::new(state.db_pool.clone());
    let correlation_token = correlations
        .create(tokens.id_token.as_deref())
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

    let session_cookie = Cookie::build((scope.session_key(), correlation_token))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(CORRELATION_TTL_SECS))
        .build();

    let target = jar
        .get(LOGIN_REDIRECT_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "/".to_string());

    tracing::debug!(scope = %scope, username = %member.username, "session established");

    let jar = jar
        .add(session_cookie)
        .add(removal_cookie(AUTH_STATE_COOKIE.to_string()))
        .add(removal_cookie(LOGIN_REDIRECT_COOKIE.to_string()));

    Ok((jar, Redirect::to(&target)).into_response())
}

/// Ends the local session and reports how to end the provider session.
///
/// The response body is the logout decision as JSON; the local cookie is
/// removed unconditionally. A session without a resolvable ID token, or
/// a failing correlation lookup, degrades to a warning outcome that
/// sends the browser to the configured fallback.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<Scope>,
    Query(query): Query<LogoutQuery>,
    jar: CookieJar,
) -> impl IntoResponse {
    let id_token = match jar.get(scope.session_key()) {
        Some(cookie) => {
            let correlations = CorrelationRepository::new(state.db_pool.clone());
            match correlations.resolve(cookie.value()).await {
                Ok(id_token) => id_token,
                Err(e) => {
                    tracing::warn!(scope = %scope, error = %e, "correlation lookup failed");
                    None
                }
            }
        }
        None => None,
    };

    let redirect_uri = decode_redirect_param(query.redirect.as_deref())
        .unwrap_or_else(|| state.oidc_client.logout_redirect(scope));

    let outcome = build_logout_outcome(
        state.oidc_client.logout_url(),
        id_token.as_deref(),
        &redirect_uri,
    );

    let jar = jar.add(removal_cookie(scope.session_key().to_string()));
    (jar, Json(outcome))
}

/// Authentication errors surfaced to the browser.
#[derive(Debug)]
pub enum AuthError {
    MissingState,
    StateMismatch,
    Provider(String),
    Store(String),
    Rejected(LoginRejection),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingState => (StatusCode::BAD_REQUEST, "Missing login state".to_string()),
            Self::StateMismatch => {
                (StatusCode::BAD_REQUEST, "Login state mismatch".to_string())
            }
            Self::Provider(reason) => {
                tracing::error!(reason, "provider request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Authentication with the identity provider failed".to_string(),
                )
            }
            Self::Store(reason) => {
                tracing::error!(reason, "storage failure during login");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::Rejected(rejection) => (StatusCode::FORBIDDEN, rejection.to_string()),
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_forbidden() {
        let response = AuthError::Rejected(LoginRejection::NotMember).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn state_errors_map_to_bad_request() {
        assert_eq!(
            AuthError::MissingState.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::StateMismatch.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn session_cookies_are_scoped_per_surface() {
        assert_ne!(Scope::Frontend.session_key(), Scope::Backend.session_key());
    }
}
