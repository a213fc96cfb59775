//! Account persistence surface used by the auth flows.
//!
//! The trait is the seam between the recovery/login state machines and the
//! database: handlers receive an `Arc<dyn AccountStore>` so the Postgres
//! backend can be swapped for the in-memory one in tests and local dev.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

/// Shared handle threaded through the handlers.
pub type DynAccountStore = std::sync::Arc<dyn AccountStore>;

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// Minimal data resolved from a valid session token.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub account_id: Uuid,
    pub email: String,
}

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub enum InsertAccountOutcome {
    Created(Uuid),
    Conflict,
}

#[derive(Debug, Clone)]
pub struct StoreListing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStoreListing {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Outcome when attempting to create a catalog listing.
#[derive(Debug)]
pub enum InsertStoreOutcome {
    Created(Uuid),
    SlugConflict,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert_account(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertAccountOutcome>;

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>>;

    /// Resolve a reset token hash to its account.
    ///
    /// Requires `reset_expires_at > now`; an expired record is
    /// indistinguishable from an absent one.
    async fn find_by_valid_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<AccountRecord>>;

    /// Attach a pending reset token to the account, superseding any prior one.
    async fn set_recovery_state(
        &self,
        account_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn clear_recovery_state(&self, account_id: Uuid) -> Result<()>;

    /// Replace the password verifier and clear the recovery state in one
    /// atomic write, so no reader can observe a new password alongside a
    /// still-valid old token.
    async fn update_credential(&self, account_id: Uuid, password_hash: &str) -> Result<()>;

    async fn insert_session(
        &self,
        account_id: Uuid,
        session_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn lookup_session(
        &self,
        session_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>>;

    /// Idempotent; deleting an absent session is not an error.
    async fn delete_session(&self, session_hash: &[u8]) -> Result<()>;

    async fn insert_store(
        &self,
        owner_id: Uuid,
        listing: &NewStoreListing,
    ) -> Result<InsertStoreOutcome>;

    async fn list_stores(&self) -> Result<Vec<StoreListing>>;
}
