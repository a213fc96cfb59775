//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub account_id: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Returned by the reset-form gate so the form can show who is resetting.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetFormResponse {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub password: String,
    #[serde(rename = "password-confirm")]
    pub password_confirm: String,
}

/// A user-facing notice accompanying a domain outcome.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct NoticeResponse {
    pub notice: String,
}

impl NoticeResponse {
    pub(crate) fn new(notice: &str) -> Self {
        Self {
            notice: notice.to_string(),
        }
    }
}
