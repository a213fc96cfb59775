//! Outbound email abstraction.
//!
//! Delivery itself is an external capability: the recovery flow hands a
//! fully built message to an [`EmailSender`] and treats the result as
//! authoritative. A failed send is surfaced to the caller, never swallowed —
//! the flow rolls the just-issued reset token back so no token exists that
//! its owner can never receive.
//!
//! The default sender for local dev logs the payload and returns `Ok(())`;
//! production deployments plug in a real transport behind the same trait.

use anyhow::Result;
use serde_json::json;
use tracing::info;

pub const PASSWORD_RESET_TEMPLATE: &str = "password-reset";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub subject: String,
    pub payload_json: String,
}

/// Email delivery abstraction used by the recovery flow.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the caller can roll back.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Shared handle threaded through the handlers.
pub type DynEmailSender = std::sync::Arc<dyn EmailSender>;

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            subject = %message.subject,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

/// Build the password reset message for an account.
pub(crate) fn password_reset_message(to_email: &str, reset_url: &str) -> EmailMessage {
    let payload_json = json!({
        "email": to_email,
        "reset_url": reset_url,
    })
    .to_string();

    EmailMessage {
        to_email: to_email.to_string(),
        template: PASSWORD_RESET_TEMPLATE.to_string(),
        subject: "Password Reset".to_string(),
        payload_json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_message_carries_url_and_template() {
        let message =
            password_reset_message("alice@example.com", "https://vitrina.dev/account/reset/abc");
        assert_eq!(message.to_email, "alice@example.com");
        assert_eq!(message.template, PASSWORD_RESET_TEMPLATE);
        assert_eq!(message.subject, "Password Reset");
        assert!(message
            .payload_json
            .contains("https://vitrina.dev/account/reset/abc"));
    }

    #[test]
    fn log_sender_always_succeeds() {
        let message = password_reset_message("alice@example.com", "https://vitrina.dev/r/abc");
        assert!(LogEmailSender.send(&message).is_ok());
    }
}
