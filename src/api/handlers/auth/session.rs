//! Session endpoints and the session-cookie plumbing.
//!
//! Sessions double as the access guard: handlers that require an
//! authenticated principal call [`authenticate_session`] and deny with a
//! login notice when it resolves nothing.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::error;

use super::{
    state::AuthConfig,
    store::{AccountStore, DynAccountStore, SessionRecord},
    types::SessionResponse,
    utils::{generate_session_token, hash_session_token},
};
use anyhow::Result;
use uuid::Uuid;

const SESSION_COOKIE_NAME: &str = "vitrina_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    store: Extension<DynAccountStore>,
) -> impl IntoResponse {
    match authenticate_session(&headers, store.as_ref(), Utc::now()).await {
        Ok(Some(SessionRecord { account_id, email })) => {
            let response = SessionResponse {
                account_id: account_id.to_string(),
                email,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(status) => status.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    store: Extension<DynAccountStore>,
    config: Extension<Arc<AuthConfig>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = store.delete_session(&token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Resolve a session cookie or bearer token into a session record.
///
/// Returns `Ok(None)` when the token is missing, unknown, or expired —
/// the access-guard deny case.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    store: &dyn AccountStore,
    now: DateTime<Utc>,
) -> Result<Option<SessionRecord>, StatusCode> {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    match store.lookup_session(&token_hash, now).await {
        Ok(record) => Ok(record),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Create a session for an account whose identity is already proven,
/// either by credentials or by possession of a valid reset token.
///
/// Returns the raw token for the cookie; the store only sees its hash.
pub(crate) async fn establish_session(
    store: &dyn AccountStore,
    config: &AuthConfig,
    account_id: Uuid,
    now: DateTime<Utc>,
) -> Result<String> {
    let token = generate_session_token()?;
    let token_hash = hash_session_token(&token);
    let expires_at = now + Duration::seconds(config.session_ttl_seconds());
    store.insert_session(account_id, &token_hash, expires_at).await?;
    Ok(token)
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
