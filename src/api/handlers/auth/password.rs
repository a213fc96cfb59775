//! Argon2 password verifier derivation and checking.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

/// A syntactically valid verifier that matches no password. Checked for
/// unknown emails so a login rejection takes the same time either way.
pub(crate) const DUMMY_VERIFIER: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHRzYWx0c2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Derive a password verifier (PHC string) from a plaintext password.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Check a submitted password against a stored verifier.
///
/// The comparison inside argon2 is constant-time for the derived output;
/// a malformed stored verifier is an infrastructure error, not a mismatch.
pub(crate) fn verify_password(verifier: &str, password: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(verifier).map_err(|err| anyhow!("invalid password verifier: {err}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
