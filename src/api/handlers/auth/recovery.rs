//! Password recovery: token issue, validation, and commit.
//!
//! Lifecycle of a reset token:
//!
//! 1. `request_recovery` mints a single-use token, stores its hash with a
//!    one-hour deadline, and emails the raw token as a link. Reissuing
//!    overwrites the previous token, which silently stops working.
//! 2. `validate_reset_token` resolves a presented token; an expired or
//!    unknown token answers exactly the same way.
//! 3. `reset_password` re-validates the token, checks the confirmation,
//!    then swaps the credential and consumes the token in one write before
//!    logging the account in.
//!
//! Each step re-reads persistent state, so a token revoked between steps is
//! caught at the next gate.

use axum::{
    extract::{Extension, Path},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    password::hash_password,
    session::{establish_session, session_cookie},
    state::AuthConfig,
    store::{AccountRecord, AccountStore, DynAccountStore},
    types::{ForgotPasswordRequest, NoticeResponse, ResetFormResponse, ResetPasswordRequest},
    utils::{build_reset_url, generate_reset_token, hash_reset_token, normalize_email, valid_email},
};
use crate::api::email::{password_reset_message, DynEmailSender, EmailSender};
use anyhow::Result;

const INVALID_TOKEN_NOTICE: &str = "Password reset is invalid or has expired";
const MISMATCH_NOTICE: &str = "Passwords do not match";
const QUEUED_NOTICE: &str = "You have been emailed a password reset link";
const UNKNOWN_EMAIL_NOTICE: &str = "No account with that email exists";
const DELIVERY_FAILED_NOTICE: &str = "Could not send the reset email, try again later";

/// Outcome of one validation step in the reset pipeline.
///
/// Each step either passes its result forward or stops the whole flow with
/// a user-facing notice; nothing rides along in request extensions.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StepOutcome<T> {
    Continue(T),
    Reject(&'static str),
}

/// Confirmation gate: both password fields must match exactly.
pub(crate) fn confirmed_passwords(password: &str, confirm: &str) -> StepOutcome<()> {
    if password == confirm {
        StepOutcome::Continue(())
    } else {
        StepOutcome::Reject(MISMATCH_NOTICE)
    }
}

#[derive(Debug)]
pub(crate) enum RequestRecoveryOutcome {
    EmailQueued,
    UnknownEmail,
    DeliveryFailed,
}

/// Issue a reset token for the account behind `email` and mail the link.
///
/// The token is persisted before the send so a delivered link always
/// resolves; if the send fails the pending token is rolled back so no
/// unreachable token stays live.
pub(crate) async fn request_recovery(
    store: &dyn AccountStore,
    sender: &dyn EmailSender,
    config: &AuthConfig,
    email: &str,
    now: DateTime<Utc>,
) -> Result<RequestRecoveryOutcome> {
    let Some(account) = store.find_by_email(email).await? else {
        return Ok(RequestRecoveryOutcome::UnknownEmail);
    };

    let token = generate_reset_token()?;
    let token_hash = hash_reset_token(&token);
    let expires_at = now + Duration::seconds(config.reset_token_ttl_seconds());
    store
        .set_recovery_state(account.id, &token_hash, expires_at)
        .await?;

    let reset_url = build_reset_url(config.base_url(), &token);
    let message = password_reset_message(&account.email, &reset_url);
    if let Err(err) = sender.send(&message) {
        error!("Failed to send reset email: {err}");
        store.clear_recovery_state(account.id).await?;
        return Ok(RequestRecoveryOutcome::DeliveryFailed);
    }

    info!(account_id = %account.id, "password reset token issued");
    Ok(RequestRecoveryOutcome::EmailQueued)
}

/// Resolve a presented reset token to its account, if still valid.
pub(crate) async fn validate_reset_token(
    store: &dyn AccountStore,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<AccountRecord>> {
    let token_hash = hash_reset_token(token);
    store.find_by_valid_token(&token_hash, now).await
}

#[derive(Debug)]
pub(crate) enum ResetOutcome {
    Completed { session_token: String },
    InvalidToken,
    PasswordMismatch,
}

/// Commit a password reset: validity gate, confirmation gate, then the
/// atomic credential swap and a fresh login session.
pub(crate) async fn reset_password(
    store: &dyn AccountStore,
    config: &AuthConfig,
    token: &str,
    password: &str,
    confirm: &str,
    now: DateTime<Utc>,
) -> Result<ResetOutcome> {
    let Some(account) = validate_reset_token(store, token, now).await? else {
        return Ok(ResetOutcome::InvalidToken);
    };

    // Mismatch must leave the token intact so the owner can retry the form.
    if let StepOutcome::Reject(_) = confirmed_passwords(password, confirm) {
        return Ok(ResetOutcome::PasswordMismatch);
    }

    let password_hash = hash_password(password)?;
    store.update_credential(account.id, &password_hash).await?;

    let session_token = establish_session(store, config, account.id, now).await?;
    info!(account_id = %account.id, "password reset completed");
    Ok(ResetOutcome::Completed { session_token })
}

#[utoipa::path(
    post,
    path = "/v1/auth/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link emailed", body = NoticeResponse),
        (status = 400, description = "Malformed payload"),
        (status = 404, description = "No account with that email"),
        (status = 502, description = "Reset email could not be delivered")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    store: Extension<DynAccountStore>,
    sender: Extension<DynEmailSender>,
    config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match request_recovery(
        store.as_ref(),
        sender.as_ref(),
        &config,
        &email,
        Utc::now(),
    )
    .await
    {
        Ok(RequestRecoveryOutcome::EmailQueued) => {
            (StatusCode::OK, Json(NoticeResponse::new(QUEUED_NOTICE))).into_response()
        }
        Ok(RequestRecoveryOutcome::UnknownEmail) => {
            (StatusCode::NOT_FOUND, UNKNOWN_EMAIL_NOTICE.to_string()).into_response()
        }
        Ok(RequestRecoveryOutcome::DeliveryFailed) => {
            (StatusCode::BAD_GATEWAY, DELIVERY_FAILED_NOTICE.to_string()).into_response()
        }
        Err(err) => {
            error!("Password recovery failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/reset/{token}",
    params(("token" = String, Path, description = "Raw reset token from the emailed link")),
    responses(
        (status = 200, description = "Token is valid, show the reset form", body = ResetFormResponse),
        (status = 400, description = "Token is invalid or expired")
    ),
    tag = "auth"
)]
pub async fn reset_form(
    store: Extension<DynAccountStore>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match validate_reset_token(store.as_ref(), &token, Utc::now()).await {
        Ok(Some(account)) => {
            let response = ResetFormResponse {
                email: account.email,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => (StatusCode::BAD_REQUEST, INVALID_TOKEN_NOTICE.to_string()).into_response(),
        Err(err) => {
            error!("Reset token validation failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset/{token}",
    params(("token" = String, Path, description = "Raw reset token from the emailed link")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced, session cookie set"),
        (status = 400, description = "Token invalid/expired or passwords do not match")
    ),
    tag = "auth"
)]
pub async fn handle_reset_password(
    store: Extension<DynAccountStore>,
    config: Extension<Arc<AuthConfig>>,
    Path(token): Path<String>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match reset_password(
        store.as_ref(),
        &config,
        &token,
        &request.password,
        &request.password_confirm,
        Utc::now(),
    )
    .await
    {
        Ok(ResetOutcome::Completed { session_token }) => {
            let mut headers = HeaderMap::new();
            match session_cookie(&config, &session_token) {
                Ok(cookie) => {
                    headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
            (StatusCode::NO_CONTENT, headers).into_response()
        }
        Ok(ResetOutcome::InvalidToken) => {
            (StatusCode::BAD_REQUEST, INVALID_TOKEN_NOTICE.to_string()).into_response()
        }
        Ok(ResetOutcome::PasswordMismatch) => {
            (StatusCode::BAD_REQUEST, MISMATCH_NOTICE.to_string()).into_response()
        }
        Err(err) => {
            error!("Password reset failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::EmailMessage;
    use crate::api::handlers::auth::password::{hash_password, verify_password};
    use crate::api::handlers::auth::store::{InsertAccountOutcome, MemoryAccountStore};
    use std::sync::Mutex;

    /// Captures outbound messages so tests can pull the emailed token back out.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl EmailSender for RecordingSender {
        fn send(&self, message: &EmailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct FailingSender;

    impl EmailSender for FailingSender {
        fn send(&self, _message: &EmailMessage) -> Result<()> {
            anyhow::bail!("smtp relay unavailable")
        }
    }

    fn config() -> AuthConfig {
        AuthConfig::new("https://vitrina.dev".to_string())
    }

    async fn seeded_store(email: &str, password: &str) -> Result<MemoryAccountStore> {
        let store = MemoryAccountStore::new();
        let hash = hash_password(password)?;
        let outcome = store.insert_account(email, &hash).await?;
        assert!(matches!(outcome, InsertAccountOutcome::Created(_)));
        Ok(store)
    }

    fn token_from_last_email(sender: &RecordingSender) -> String {
        let sent = sender.sent.lock().unwrap();
        let message = sent.last().expect("an email was sent");
        let payload: serde_json::Value = serde_json::from_str(&message.payload_json).unwrap();
        let url = payload["reset_url"].as_str().unwrap();
        url.rsplit('/').next().unwrap().to_string()
    }

    #[test]
    fn matching_passwords_continue() {
        assert_eq!(
            confirmed_passwords("abc123", "abc123"),
            StepOutcome::Continue(())
        );
    }

    #[test]
    fn mismatched_passwords_reject_with_notice() {
        assert_eq!(
            confirmed_passwords("abc123", "abc124"),
            StepOutcome::Reject(MISMATCH_NOTICE)
        );
    }

    #[tokio::test]
    async fn issued_token_validates_before_expiry() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let sender = RecordingSender::default();
        let now = Utc::now();

        let outcome = request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        assert!(matches!(outcome, RequestRecoveryOutcome::EmailQueued));

        let token = token_from_last_email(&sender);
        let account = validate_reset_token(&store, &token, now + Duration::minutes(59)).await?;
        assert_eq!(account.map(|a| a.email), Some("alice@example.com".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn token_is_rejected_at_and_after_the_deadline() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let sender = RecordingSender::default();
        let now = Utc::now();
        request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        let token = token_from_last_email(&sender);

        assert!(validate_reset_token(&store, &token, now + Duration::hours(1))
            .await?
            .is_none());
        assert!(validate_reset_token(&store, &token, now + Duration::minutes(61))
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn reissue_invalidates_the_previous_token() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let sender = RecordingSender::default();
        let now = Utc::now();

        request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        let first = token_from_last_email(&sender);
        request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        let second = token_from_last_email(&sender);

        assert_ne!(first, second);
        assert!(validate_reset_token(&store, &first, now).await?.is_none());
        assert!(validate_reset_token(&store, &second, now).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_email_issues_nothing() -> Result<()> {
        let store = MemoryAccountStore::new();
        let sender = RecordingSender::default();

        let outcome =
            request_recovery(&store, &sender, &config(), "ghost@example.com", Utc::now()).await?;
        assert!(matches!(outcome, RequestRecoveryOutcome::UnknownEmail));
        assert!(sender.sent.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_delivery_rolls_the_token_back() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let sender = RecordingSender::default();
        let now = Utc::now();

        let outcome =
            request_recovery(&store, &FailingSender, &config(), "alice@example.com", now).await?;
        assert!(matches!(outcome, RequestRecoveryOutcome::DeliveryFailed));

        // Reissue succeeds and only the new token resolves; the rolled-back
        // state left no stray token behind.
        request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        let token = token_from_last_email(&sender);
        assert!(validate_reset_token(&store, &token, now).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn completed_reset_consumes_the_token_and_logs_in() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let sender = RecordingSender::default();
        let now = Utc::now();
        request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        let token = token_from_last_email(&sender);

        let outcome = reset_password(
            &store,
            &config(),
            &token,
            "new-password",
            "new-password",
            now,
        )
        .await?;
        let ResetOutcome::Completed { session_token } = outcome else {
            panic!("expected completed reset, got {outcome:?}");
        };
        assert!(!session_token.is_empty());

        // Token is single-use: immediately invalid after the commit.
        assert!(validate_reset_token(&store, &token, now).await?.is_none());

        let account = store.find_by_email("alice@example.com").await?.unwrap();
        assert!(verify_password(&account.password_hash, "new-password")?);
        assert!(!verify_password(&account.password_hash, "old-password")?);
        Ok(())
    }

    #[tokio::test]
    async fn mismatch_mutates_nothing() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let sender = RecordingSender::default();
        let now = Utc::now();
        request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        let token = token_from_last_email(&sender);

        let outcome =
            reset_password(&store, &config(), &token, "abc123", "abc124", now).await?;
        assert!(matches!(outcome, ResetOutcome::PasswordMismatch));

        // Token survives the failed attempt and the commit still works.
        assert!(validate_reset_token(&store, &token, now).await?.is_some());
        let account = store.find_by_email("alice@example.com").await?.unwrap();
        assert!(verify_password(&account.password_hash, "old-password")?);

        let retry =
            reset_password(&store, &config(), &token, "abc123", "abc123", now).await?;
        assert!(matches!(retry, ResetOutcome::Completed { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_cannot_commit_a_reset() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let sender = RecordingSender::default();
        let now = Utc::now();
        request_recovery(&store, &sender, &config(), "alice@example.com", now).await?;
        let token = token_from_last_email(&sender);

        let outcome = reset_password(
            &store,
            &config(),
            &token,
            "new-password",
            "new-password",
            now + Duration::minutes(61),
        )
        .await?;
        assert!(matches!(outcome, ResetOutcome::InvalidToken));

        let account = store.find_by_email("alice@example.com").await?.unwrap();
        assert!(verify_password(&account.password_hash, "old-password")?);
        Ok(())
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() -> Result<()> {
        let store = seeded_store("alice@example.com", "old-password").await?;
        let outcome = reset_password(
            &store,
            &config(),
            "deadbeef",
            "new-password",
            "new-password",
            Utc::now(),
        )
        .await?;
        assert!(matches!(outcome, ResetOutcome::InvalidToken));
        Ok(())
    }
}
