//! Postgres-backed account store.
//!
//! Every mutation the recovery flow depends on is a single UPDATE, so
//! per-row atomicity in Postgres is the only concurrency control needed:
//! there is no read-modify-write window between replacing a credential and
//! clearing its reset token.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    AccountRecord, AccountStore, InsertAccountOutcome, InsertStoreOutcome, NewStoreListing,
    SessionRecord, StoreListing,
};
use crate::api::handlers::auth::utils::is_unique_violation;

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert_account(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertAccountOutcome> {
        let query = r"
            INSERT INTO accounts (email, password_hash)
            VALUES ($1, $2)
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(InsertAccountOutcome::Created(row.get("id"))),
            Err(err) if is_unique_violation(&err) => Ok(InsertAccountOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>> {
        let query = "SELECT id, email, password_hash FROM accounts WHERE email = $1";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup account by email")?;

        Ok(row.map(|row| AccountRecord {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn find_by_valid_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<AccountRecord>> {
        // Expired rows fall out of the WHERE clause; they look exactly like
        // rows that never existed.
        let query = r"
            SELECT id, email, password_hash
            FROM accounts
            WHERE reset_token_hash = $1
              AND reset_expires_at > $2
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup account by reset token")?;

        Ok(row.map(|row| AccountRecord {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn set_recovery_state(
        &self,
        account_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        // Overwrite, not append: a reissued token silently supersedes the
        // previous one.
        let query = r"
            UPDATE accounts
            SET reset_token_hash = $2,
                reset_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(account_id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to set recovery state")?;
        Ok(())
    }

    async fn clear_recovery_state(&self, account_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET reset_token_hash = NULL,
                reset_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to clear recovery state")?;
        Ok(())
    }

    async fn update_credential(&self, account_id: Uuid, password_hash: &str) -> Result<()> {
        // Credential replacement and token consumption are one statement.
        let query = r"
            UPDATE accounts
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(account_id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update credential")?;
        Ok(())
    }

    async fn insert_session(
        &self,
        account_id: Uuid,
        session_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            INSERT INTO account_sessions (account_id, session_hash, expires_at)
            VALUES ($1, $2, $3)
        ";
        sqlx::query(query)
            .bind(account_id)
            .bind(session_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn lookup_session(
        &self,
        session_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT accounts.id, accounts.email
            FROM account_sessions
            JOIN accounts ON accounts.id = account_sessions.account_id
            WHERE account_sessions.session_hash = $1
              AND account_sessions.expires_at > $2
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(session_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup session")?;

        if row.is_none() {
            return Ok(None);
        }

        // Record activity for audit/visibility without extending the session TTL.
        let query = r"
            UPDATE account_sessions
            SET last_seen_at = NOW()
            WHERE session_hash = $1
        ";
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update session last_seen_at")?;

        Ok(row.map(|row| SessionRecord {
            account_id: row.get("id"),
            email: row.get("email"),
        }))
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM account_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn insert_store(
        &self,
        owner_id: Uuid,
        listing: &NewStoreListing,
    ) -> Result<InsertStoreOutcome> {
        let query = r"
            INSERT INTO stores (owner_id, name, slug, description, tags)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(owner_id)
            .bind(&listing.name)
            .bind(&listing.slug)
            .bind(&listing.description)
            .bind(&listing.tags)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(InsertStoreOutcome::Created(row.get("id"))),
            Err(err) if is_unique_violation(&err) => Ok(InsertStoreOutcome::SlugConflict),
            Err(err) => Err(err).context("failed to insert store"),
        }
    }

    async fn list_stores(&self) -> Result<Vec<StoreListing>> {
        let query = r"
            SELECT id, owner_id, name, slug, description, tags, created_at
            FROM stores
            ORDER BY created_at DESC
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list stores")?;

        Ok(rows
            .into_iter()
            .map(|row| StoreListing {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                name: row.get("name"),
                slug: row.get("slug"),
                description: row.get("description"),
                tags: row.get("tags"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
