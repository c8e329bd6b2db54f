//! Postgres-backed store.

use super::{
    revocation_reason, AuthSession, NewRefreshCredential, RefreshCredential,
    RefreshTokenRepository, RotationOutcome, SessionRepository, Store, StoreError, StoreResult,
    User, UserRepository,
};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Connection, PgPool, Row};
use std::time::Duration;
use tracing::{Instrument, Span};
use uuid::Uuid;

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, identity_provider, provider_user_id, email, username, avatar_url, \
                            created_at, updated_at, deleted_at";
const REFRESH_COLUMNS: &str =
    "id, user_id, token_hash, expires_at, created_at, revoked_at, revoked_reason";

fn query_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Split a schema file into executable statements, dropping comments and blanks.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> Result<AuthSession, sqlx::Error> {
    Ok(AuthSession {
        state: row.try_get("state")?,
        provider: row.try_get("provider")?,
        code_verifier: row.try_get("code_verifier")?,
        code_challenge: row.try_get("code_challenge")?,
        redirect_uri: row.try_get("redirect_uri")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        identity_provider: row.try_get("identity_provider")?,
        provider_user_id: row.try_get("provider_user_id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        avatar_url: row.try_get("avatar_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn refresh_from_row(row: &sqlx::postgres::PgRow) -> Result<RefreshCredential, sqlx::Error> {
    Ok(RefreshCredential {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        revoked_at: row.try_get("revoked_at")?,
        revoked_reason: row.try_get("revoked_reason")?,
    })
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small connection pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .acquire_timeout(Duration::from_secs(5))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Apply `sql/schema.sql`; every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(query_span("MIGRATE", statement))
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, session: AuthSession) -> StoreResult<()> {
        let query = r"
            INSERT INTO oauth_sessions
                (state, provider, code_verifier, code_challenge, redirect_uri, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        let result = sqlx::query(query)
            .bind(&session.state)
            .bind(&session.provider)
            .bind(&session.code_verifier)
            .bind(&session.code_challenge)
            .bind(&session.redirect_uri)
            .bind(session.expires_at)
            .bind(session.created_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("session state already exists".into()))
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert oauth session")
                .into()),
        }
    }

    async fn take_session(&self, state: &str) -> StoreResult<Option<AuthSession>> {
        let query = r"
            DELETE FROM oauth_sessions
            WHERE state = $1
            RETURNING state, provider, code_verifier, code_challenge, redirect_uri, expires_at, created_at
        ";
        let row = sqlx::query(query)
            .bind(state)
            .fetch_optional(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to take oauth session")?;

        Ok(row
            .map(|row| session_from_row(&row))
            .transpose()
            .context("failed to decode oauth session")?)
    }

    async fn delete_session(&self, state: &str) -> StoreResult<()> {
        let query = "DELETE FROM oauth_sessions WHERE state = $1";
        sqlx::query(query)
            .bind(state)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete oauth session")?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: i64) -> StoreResult<u64> {
        let query = "DELETE FROM oauth_sessions WHERE expires_at < $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to purge expired oauth sessions")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by id")?;
        Ok(row
            .map(|row| user_from_row(&row))
            .transpose()
            .context("failed to decode user")?)
    }

    async fn find_user_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> StoreResult<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE identity_provider = $1 AND provider_user_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&query)
            .bind(provider)
            .bind(provider_user_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by provider identity")?;
        Ok(row
            .map(|row| user_from_row(&row))
            .transpose()
            .context("failed to decode user")?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE lower(email) = lower($1) AND deleted_at IS NULL \
             ORDER BY created_at LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by email")?;
        Ok(row
            .map(|row| user_from_row(&row))
            .transpose()
            .context("failed to decode user")?)
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let query = r"
            INSERT INTO users
                (id, identity_provider, provider_user_id, email, username, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.identity_provider)
            .bind(&user.provider_user_id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.avatar_url)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(format!(
                "user already exists for provider {}",
                user.identity_provider
            ))),
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert user")
                .into()),
        }
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        username: Option<String>,
        avatar_url: Option<String>,
        updated_at: i64,
    ) -> StoreResult<Option<User>> {
        let query = format!(
            "UPDATE users SET username = $2, avatar_url = $3, updated_at = $4 \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(username)
            .bind(avatar_url)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update user profile")?;
        Ok(row
            .map(|row| user_from_row(&row))
            .transpose()
            .context("failed to decode user")?)
    }

    async fn soft_delete_user(&self, id: Uuid, at: i64) -> StoreResult<bool> {
        let query = r"
            UPDATE users SET deleted_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to soft delete user")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RefreshTokenRepository for PgStore {
    async fn insert_refresh_token(&self, record: RefreshCredential) -> StoreResult<()> {
        let query = r"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let result = sqlx::query(query)
            .bind(record.id)
            .bind(record.user_id)
            .bind(&record.token_hash)
            .bind(record.expires_at)
            .bind(record.created_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(
                "refresh token hash already exists".into(),
            )),
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to insert refresh token")
                .into()),
        }
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshCredential>> {
        let query = format!("SELECT {REFRESH_COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup refresh token")?;
        Ok(row
            .map(|row| refresh_from_row(&row))
            .transpose()
            .context("failed to decode refresh token")?)
    }

    async fn revoke_refresh_token(&self, id: Uuid, reason: &str, at: i64) -> StoreResult<bool> {
        let query = r"
            UPDATE refresh_tokens SET revoked_at = $2, revoked_reason = $3
            WHERE id = $1 AND revoked_at IS NULL
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(at)
            .bind(reason)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to revoke refresh token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: &str,
        at: i64,
    ) -> StoreResult<u64> {
        let query = r"
            UPDATE refresh_tokens SET revoked_at = $2, revoked_reason = $3
            WHERE user_id = $1 AND revoked_at IS NULL
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(at)
            .bind(reason)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to revoke user refresh tokens")?;
        Ok(result.rows_affected())
    }

    async fn rotate_refresh_token(
        &self,
        token_hash: &str,
        now: i64,
        successor: NewRefreshCredential,
    ) -> StoreResult<RotationOutcome> {
        // The row lock serializes concurrent replays of the same token: the loser
        // re-reads the row after the winner commits and sees it revoked.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin rotation transaction")?;

        let query = format!(
            "SELECT {REFRESH_COLUMNS} FROM refresh_tokens WHERE token_hash = $1 FOR UPDATE"
        );
        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lock refresh token")?;

        let Some(row) = row else {
            tx.rollback().await.context("rollback rotation")?;
            return Ok(RotationOutcome::NotFound);
        };
        let current = refresh_from_row(&row).context("failed to decode refresh token")?;

        if current.is_revoked() {
            tx.rollback().await.context("rollback rotation")?;
            return Ok(RotationOutcome::Revoked);
        }

        let revoke_query = r"
            UPDATE refresh_tokens SET revoked_at = $2, revoked_reason = $3
            WHERE id = $1 AND revoked_at IS NULL
        ";

        if current.is_expired(now) {
            sqlx::query(revoke_query)
                .bind(current.id)
                .bind(now)
                .bind(revocation_reason::EXPIRED)
                .execute(&mut *tx)
                .instrument(query_span("UPDATE", revoke_query))
                .await
                .context("failed to revoke expired refresh token")?;
            tx.commit().await.context("commit expired revocation")?;
            return Ok(RotationOutcome::Expired);
        }

        sqlx::query(revoke_query)
            .bind(current.id)
            .bind(now)
            .bind(revocation_reason::TOKEN_REFRESHED)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", revoke_query))
            .await
            .context("failed to revoke rotated refresh token")?;

        let successor = successor.bind_to(current.user_id);
        let insert_query = r"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let inserted = sqlx::query(insert_query)
            .bind(successor.id)
            .bind(successor.user_id)
            .bind(&successor.token_hash)
            .bind(successor.expires_at)
            .bind(successor.created_at)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", insert_query))
            .await;

        if let Err(err) = inserted {
            let _ = tx.rollback().await;
            if is_unique_violation(&err) {
                return Err(StoreError::Conflict(
                    "refresh token hash already exists".into(),
                ));
            }
            return Err(anyhow::Error::new(err)
                .context("failed to insert successor refresh token")
                .into());
        }

        tx.commit().await.context("commit rotation")?;

        let previous = RefreshCredential {
            revoked_at: Some(now),
            revoked_reason: Some(revocation_reason::TOKEN_REFRESHED.to_string()),
            ..current
        };
        Ok(RotationOutcome::Rotated {
            previous,
            successor,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(tracing::info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;
        conn.ping()
            .instrument(tracing::info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
