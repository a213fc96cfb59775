//! Credential login.
//!
//! Denials are deliberately uniform: an unknown email and a wrong password
//! produce the same status, same body, and a comparable amount of verifier
//! work, so the endpoint does not confirm which addresses have accounts.

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::error;

use super::{
    password::{verify_password, DUMMY_VERIFIER},
    session::{establish_session, session_cookie},
    state::AuthConfig,
    store::{AccountStore, DynAccountStore},
    types::LoginRequest,
    utils::{normalize_email, valid_email},
};
use anyhow::Result;

const DENIED_NOTICE: &str = "Invalid email or password";

#[derive(Debug)]
pub enum LoginOutcome {
    SessionIssued(String),
    Denied,
}

/// Verify credentials and mint a session on success.
pub(crate) async fn login(
    store: &dyn AccountStore,
    config: &AuthConfig,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<LoginOutcome> {
    let Some(account) = store.find_by_email(email).await? else {
        // Burn a verification anyway so unknown emails cost the same as
        // wrong passwords.
        let _ = verify_password(DUMMY_VERIFIER, password);
        return Ok(LoginOutcome::Denied);
    };

    if !verify_password(&account.password_hash, password)? {
        return Ok(LoginOutcome::Denied);
    }

    let token = establish_session(store, config, account.id, now).await?;
    Ok(LoginOutcome::SessionIssued(token))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 204, description = "Logged in, session cookie set"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
pub async fn handle_login(
    store: Extension<DynAccountStore>,
    config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match login(store.as_ref(), &config, &email, &request.password, Utc::now()).await {
        Ok(LoginOutcome::SessionIssued(token)) => {
            let mut headers = HeaderMap::new();
            match session_cookie(&config, &token) {
                Ok(cookie) => {
                    headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, bearer);
            }
            (StatusCode::NO_CONTENT, headers).into_response()
        }
        Ok(LoginOutcome::Denied) => {
            (StatusCode::UNAUTHORIZED, DENIED_NOTICE.to_string()).into_response()
        }
        Err(err) => {
            error!("Login failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::password::hash_password;
    use crate::api::handlers::auth::store::{InsertAccountOutcome, MemoryAccountStore};

    fn config() -> AuthConfig {
        AuthConfig::new("http://localhost:8080".to_string())
    }

    async fn seeded_store(email: &str, password: &str) -> Result<MemoryAccountStore> {
        let store = MemoryAccountStore::new();
        let hash = hash_password(password)?;
        let outcome = store.insert_account(email, &hash).await?;
        assert!(matches!(outcome, InsertAccountOutcome::Created(_)));
        Ok(store)
    }

    #[tokio::test]
    async fn correct_credentials_issue_session() -> Result<()> {
        let store = seeded_store("alice@example.com", "hunter2hunter2").await?;
        let outcome = login(
            &store,
            &config(),
            "alice@example.com",
            "hunter2hunter2",
            Utc::now(),
        )
        .await?;
        assert!(matches!(outcome, LoginOutcome::SessionIssued(_)));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_denied() -> Result<()> {
        let store = seeded_store("alice@example.com", "hunter2hunter2").await?;
        let outcome = login(
            &store,
            &config(),
            "alice@example.com",
            "not-the-password",
            Utc::now(),
        )
        .await?;
        assert!(matches!(outcome, LoginOutcome::Denied));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_email_is_denied_not_distinguished() -> Result<()> {
        let store = MemoryAccountStore::new();
        let outcome = login(
            &store,
            &config(),
            "ghost@example.com",
            "whatever-password",
            Utc::now(),
        )
        .await?;
        assert!(matches!(outcome, LoginOutcome::Denied));
        Ok(())
    }
}
