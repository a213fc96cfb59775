//! In-memory account store for local dev and tests.
//!
//! Mirrors the Postgres backend's visibility guarantees: every mutation
//! happens under the write lock, so a consumed reset token is gone for any
//! later lookup.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountRecord, AccountStore, InsertAccountOutcome, InsertStoreOutcome, NewStoreListing,
    SessionRecord, StoreListing,
};

#[derive(Debug, Clone)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: String,
    reset_token_hash: Option<Vec<u8>>,
    reset_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct SessionRow {
    account_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<Uuid, AccountRow>,
    sessions: HashMap<Vec<u8>, SessionRow>,
    stores: Vec<StoreListing>,
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    inner: RwLock<Inner>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn record(row: &AccountRow) -> AccountRecord {
    AccountRecord {
        id: row.id,
        email: row.email.clone(),
        password_hash: row.password_hash.clone(),
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert_account(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertAccountOutcome> {
        let mut inner = self.inner.write().await;
        if inner.accounts.values().any(|row| row.email == email) {
            return Ok(InsertAccountOutcome::Conflict);
        }
        let id = Uuid::new_v4();
        inner.accounts.insert(
            id,
            AccountRow {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                reset_token_hash: None,
                reset_expires_at: None,
            },
        );
        Ok(InsertAccountOutcome::Created(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|row| row.email == email)
            .map(record))
    }

    async fn find_by_valid_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<AccountRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|row| {
                row.reset_token_hash.as_deref() == Some(token_hash)
                    && row.reset_expires_at.is_some_and(|expires| expires > now)
            })
            .map(record))
    }

    async fn set_recovery_state(
        &self,
        account_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.accounts.get_mut(&account_id) {
            row.reset_token_hash = Some(token_hash.to_vec());
            row.reset_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn clear_recovery_state(&self, account_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.accounts.get_mut(&account_id) {
            row.reset_token_hash = None;
            row.reset_expires_at = None;
        }
        Ok(())
    }

    async fn update_credential(&self, account_id: Uuid, password_hash: &str) -> Result<()> {
        // Single critical section: credential swap and token consumption are
        // never observable separately.
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.accounts.get_mut(&account_id) {
            row.password_hash = password_hash.to_string();
            row.reset_token_hash = None;
            row.reset_expires_at = None;
        }
        Ok(())
    }

    async fn insert_session(
        &self,
        account_id: Uuid,
        session_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(
            session_hash.to_vec(),
            SessionRow {
                account_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn lookup_session(
        &self,
        session_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>> {
        let inner = self.inner.read().await;
        let Some(session) = inner.sessions.get(session_hash) else {
            return Ok(None);
        };
        if session.expires_at <= now {
            return Ok(None);
        }
        Ok(inner
            .accounts
            .get(&session.account_id)
            .map(|row| SessionRecord {
                account_id: row.id,
                email: row.email.clone(),
            }))
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(session_hash);
        Ok(())
    }

    async fn insert_store(
        &self,
        owner_id: Uuid,
        listing: &NewStoreListing,
    ) -> Result<InsertStoreOutcome> {
        let mut inner = self.inner.write().await;
        if inner.stores.iter().any(|store| store.slug == listing.slug) {
            return Ok(InsertStoreOutcome::SlugConflict);
        }
        let id = Uuid::new_v4();
        inner.stores.push(StoreListing {
            id,
            owner_id,
            name: listing.name.clone(),
            slug: listing.slug.clone(),
            description: listing.description.clone(),
            tags: listing.tags.clone(),
            created_at: Utc::now(),
        });
        Ok(InsertStoreOutcome::Created(id))
    }

    async fn list_stores(&self) -> Result<Vec<StoreListing>> {
        let inner = self.inner.read().await;
        let mut stores = inner.stores.clone();
        stores.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn duplicate_email_conflicts() -> Result<()> {
        let store = MemoryAccountStore::new();
        let first = store.insert_account("a@example.com", "hash").await?;
        let second = store.insert_account("a@example.com", "hash").await?;
        assert!(matches!(first, InsertAccountOutcome::Created(_)));
        assert!(matches!(second, InsertAccountOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_is_not_found() -> Result<()> {
        let store = MemoryAccountStore::new();
        let InsertAccountOutcome::Created(id) =
            store.insert_account("a@example.com", "hash").await?
        else {
            unreachable!("fresh store cannot conflict");
        };

        let now = Utc::now();
        store
            .insert_session(id, b"hash", now + Duration::hours(1))
            .await?;

        assert!(store.lookup_session(b"hash", now).await?.is_some());
        assert!(store
            .lookup_session(b"hash", now + Duration::hours(2))
            .await?
            .is_none());
        Ok(())
    }
}
