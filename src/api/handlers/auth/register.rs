//! Account registration.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::error;

use super::{
    password::hash_password,
    store::{DynAccountStore, InsertAccountOutcome},
    types::{NoticeResponse, RegisterRequest},
    utils::{normalize_email, valid_email},
};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Counted in characters, not bytes, so multibyte passwords are not penalized.
fn password_long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    store: Extension<DynAccountStore>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if !password_long_enough(&request.password) {
        return (
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        )
            .into_response();
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match store.insert_account(&email, &password_hash).await {
        Ok(InsertAccountOutcome::Created(_)) => (
            StatusCode::CREATED,
            Json(NoticeResponse::new("Account created")),
        )
            .into_response(),
        Ok(InsertAccountOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "Email already registered".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to insert account: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
