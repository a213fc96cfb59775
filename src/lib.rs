//! # Vitrina (Storefront Directory & Accounts)
//!
//! `vitrina` is a small storefront-directory backend: user accounts with
//! session-based login, a thin tagged store catalog, and a password
//! recovery flow built around single-use, time-bounded reset tokens.
//!
//! ## Accounts & Sessions
//!
//! Passwords are stored as argon2 verifiers, never plaintext. Sessions are
//! bearer tokens delivered as `HttpOnly` cookies; the database only ever
//! stores a SHA-256 hash of the token.
//!
//! ## Password Recovery
//!
//! Recovery is a small state machine: a request issues a 160-bit random
//! token with a one hour expiry, the token is mailed to the account owner,
//! and presenting a matching unexpired token authorizes a password change.
//! Committing the new password clears the token in the same write and logs
//! the account in, so the token can never be replayed against the new
//! credential.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
