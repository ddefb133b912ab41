//! PostgreSQL store.
//!
//! Statement texts are instrumented with `db.query` spans. The two hot paths
//! are single conditional `UPDATE`s: the sliding-expiry extension only
//! matches rows still inside their TTL window, and reset consumption only
//! matches unconsumed, unexpired rows owned by the caller — the row lock
//! taken by `UPDATE` makes both exactly-once under concurrency.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::identity::UserId;
use crate::auth::store::{
    AuthStore, CreateUserOutcome, CredentialRecord, InsertSessionOutcome, ResetRecord,
    SessionRecord, TouchOutcome, UserRecord,
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema. Statements are idempotent.
    pub async fn migrate(&self) -> Result<()> {
        for statement in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to apply schema statement: {statement}"))?;
        }
        Ok(())
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    // Comment lines go first so a ';' inside one cannot split a statement.
    let without_comments = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn row_to_session(row: &PgRow) -> SessionRecord {
    SessionRecord {
        session_id: row.get("session_id"),
        key_hash: row.get("key_hash"),
        owner: UserId::new(
            row.get::<String, _>("username"),
            row.get::<String, _>("org"),
        ),
        startdate: row.get("startdate"),
        lastupdate: row.get("lastupdate"),
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn create_user(&self, user: &UserRecord) -> Result<CreateUserOutcome> {
        let query = r"
            INSERT INTO users (username, org, email, parent_username, parent_org, createdate)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let result = sqlx::query(query)
            .bind(&user.id.username)
            .bind(&user.id.org)
            .bind(&user.email)
            .bind(user.parent.as_ref().map(|p| p.username.as_str()))
            .bind(user.parent.as_ref().map(|p| p.org.as_str()))
            .bind(user.createdate)
            .execute(&self.pool)
            .instrument(query_span("INSERT", "INSERT INTO users"))
            .await;

        match result {
            Ok(_) => Ok(CreateUserOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(CreateUserOutcome::Exists),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT username, org, email, parent_username, parent_org, createdate
            FROM users
            WHERE org = $1 AND username = $2
        ";
        let row = sqlx::query(query)
            .bind(&id.org)
            .bind(&id.username)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", "SELECT FROM users"))
            .await
            .context("failed to lookup user")?;

        Ok(row.map(|row| {
            let parent = match (
                row.get::<Option<String>, _>("parent_username"),
                row.get::<Option<String>, _>("parent_org"),
            ) {
                (Some(username), Some(org)) => Some(UserId::new(username, org)),
                _ => None,
            };
            UserRecord {
                id: UserId::new(
                    row.get::<String, _>("username"),
                    row.get::<String, _>("org"),
                ),
                email: row.get("email"),
                parent,
                createdate: row.get("createdate"),
            }
        }))
    }

    async fn registration_open(&self, org: &str) -> Result<Option<bool>> {
        let query = "SELECT registration_open FROM orgs WHERE org = $1";
        let row = sqlx::query(query)
            .bind(org)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", "SELECT FROM orgs"))
            .await
            .context("failed to lookup org setting")?;

        Ok(row.map(|row| row.get("registration_open")))
    }

    async fn set_registration_open(&self, org: &str, open: bool) -> Result<()> {
        let query = r"
            INSERT INTO orgs (org, registration_open)
            VALUES ($1, $2)
            ON CONFLICT (org) DO UPDATE SET registration_open = EXCLUDED.registration_open
        ";
        sqlx::query(query)
            .bind(org)
            .bind(open)
            .execute(&self.pool)
            .instrument(query_span("INSERT", "INSERT INTO orgs"))
            .await
            .context("failed to upsert org setting")?;
        Ok(())
    }

    async fn get_credential(&self, id: &UserId) -> Result<Option<CredentialRecord>> {
        let query = r"
            SELECT credential, updated_at
            FROM credentials
            WHERE org = $1 AND username = $2
        ";
        let row = sqlx::query(query)
            .bind(&id.org)
            .bind(&id.username)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", "SELECT FROM credentials"))
            .await
            .context("failed to lookup credential")?;

        Ok(row.map(|row| CredentialRecord {
            wrapped: row.get("credential"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn put_credential(&self, id: &UserId, credential: &CredentialRecord) -> Result<()> {
        // Upsert keeps the at-most-one-credential invariant without a
        // read-modify-write window.
        let query = r"
            INSERT INTO credentials (username, org, credential, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (org, username) DO UPDATE
                SET credential = EXCLUDED.credential,
                    updated_at = EXCLUDED.updated_at
        ";
        sqlx::query(query)
            .bind(&id.username)
            .bind(&id.org)
            .bind(&credential.wrapped)
            .bind(credential.updated_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", "INSERT INTO credentials"))
            .await
            .context("failed to store credential")?;
        Ok(())
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<InsertSessionOutcome> {
        let query = r"
            INSERT INTO sessions (session_id, key_hash, username, org, startdate, lastupdate)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let result = sqlx::query(query)
            .bind(record.session_id)
            .bind(&record.key_hash)
            .bind(&record.owner.username)
            .bind(&record.owner.org)
            .bind(record.startdate)
            .bind(record.lastupdate)
            .execute(&self.pool)
            .instrument(query_span("INSERT", "INSERT INTO sessions"))
            .await;

        match result {
            Ok(_) => Ok(InsertSessionOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertSessionOutcome::DuplicateKey),
            Err(err) => Err(err).context("failed to insert session"),
        }
    }

    async fn touch_session(
        &self,
        key_hash: &[u8],
        now: i64,
        ttl_seconds: i64,
    ) -> Result<TouchOutcome> {
        // The extension and its TTL check are one statement, so concurrent
        // validations can only ever move lastupdate forward.
        let query = r"
            UPDATE sessions
            SET lastupdate = $2
            WHERE key_hash = $1 AND $2 - lastupdate <= $3
            RETURNING session_id, key_hash, username, org, startdate, lastupdate
        ";
        let row = sqlx::query(query)
            .bind(key_hash)
            .bind(now)
            .bind(ttl_seconds)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", "UPDATE sessions SET lastupdate"))
            .await
            .context("failed to extend session")?;

        if let Some(row) = row {
            return Ok(TouchOutcome::Touched(row_to_session(&row)));
        }

        // No live row matched: classify as expired or missing, reclaiming the
        // stale row when there is one. The delete re-checks lastupdate so a
        // concurrent extension is never thrown away.
        let query = "SELECT lastupdate FROM sessions WHERE key_hash = $1";
        let row = sqlx::query(query)
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", "SELECT lastupdate FROM sessions"))
            .await
            .context("failed to classify session key")?;

        let Some(row) = row else {
            return Ok(TouchOutcome::Missing);
        };
        let observed: i64 = row.get("lastupdate");

        let query = "DELETE FROM sessions WHERE key_hash = $1 AND lastupdate = $2";
        sqlx::query(query)
            .bind(key_hash)
            .bind(observed)
            .execute(&self.pool)
            .instrument(query_span("DELETE", "DELETE FROM sessions (stale)"))
            .await
            .context("failed to reclaim expired session")?;

        Ok(TouchOutcome::Expired)
    }

    async fn session_by_id(&self, session_id: Uuid) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT session_id, key_hash, username, org, startdate, lastupdate
            FROM sessions
            WHERE session_id = $1
        ";
        let row = sqlx::query(query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", "SELECT FROM sessions by id"))
            .await
            .context("failed to lookup session by id")?;

        Ok(row.as_ref().map(row_to_session))
    }

    async fn sessions_for_owner(
        &self,
        owner: &UserId,
        now: i64,
        ttl_seconds: i64,
    ) -> Result<Vec<SessionRecord>> {
        let query = r"
            SELECT session_id, key_hash, username, org, startdate, lastupdate
            FROM sessions
            WHERE org = $1 AND username = $2 AND $3 - lastupdate <= $4
            ORDER BY startdate
        ";
        let rows = sqlx::query(query)
            .bind(&owner.org)
            .bind(&owner.username)
            .bind(now)
            .bind(ttl_seconds)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", "SELECT FROM sessions by owner"))
            .await
            .context("failed to list sessions")?;

        Ok(rows.iter().map(row_to_session).collect())
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        let query = "DELETE FROM sessions WHERE session_id = $1";
        let result = sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", "DELETE FROM sessions by id"))
            .await
            .context("failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_sessions_for_owner(&self, owner: &UserId) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE org = $1 AND username = $2";
        let result = sqlx::query(query)
            .bind(&owner.org)
            .bind(&owner.username)
            .execute(&self.pool)
            .instrument(query_span("DELETE", "DELETE FROM sessions by owner"))
            .await
            .context("failed to revoke sessions")?;
        Ok(result.rows_affected())
    }

    async fn reap_expired_sessions(&self, now: i64, ttl_seconds: i64) -> Result<u64> {
        // The predicate re-reads lastupdate row by row, so a session being
        // extended concurrently no longer matches and survives the sweep.
        let query = "DELETE FROM sessions WHERE $1 - lastupdate > $2";
        let result = sqlx::query(query)
            .bind(now)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(query_span("DELETE", "DELETE FROM sessions (expired)"))
            .await
            .context("failed to reap expired sessions")?;
        Ok(result.rows_affected())
    }

    async fn insert_reset(&self, record: &ResetRecord) -> Result<()> {
        let query = r"
            INSERT INTO password_resets (reset_id, username, org, createdate, expires_at, consumed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        sqlx::query(query)
            .bind(record.reset_id)
            .bind(&record.owner.username)
            .bind(&record.owner.org)
            .bind(record.createdate)
            .bind(record.expires_at)
            .bind(record.consumed_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", "INSERT INTO password_resets"))
            .await
            .context("failed to insert reset request")?;
        Ok(())
    }

    async fn consume_reset(
        &self,
        reset_id: Uuid,
        owner: &UserId,
        now: i64,
    ) -> Result<Option<UserId>> {
        // Single-use redemption: the consumed/expiry/owner predicate and the
        // flip of consumed_at are one statement, so exactly one of two racing
        // completions can match.
        let query = r"
            UPDATE password_resets
            SET consumed_at = $4
            WHERE reset_id = $1
              AND username = $2
              AND org = $3
              AND consumed_at IS NULL
              AND expires_at > $4
            RETURNING username, org
        ";
        let row = sqlx::query(query)
            .bind(reset_id)
            .bind(&owner.username)
            .bind(&owner.org)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", "UPDATE password_resets SET consumed_at"))
            .await
            .context("failed to consume reset request")?;

        Ok(row.map(|row| {
            UserId::new(
                row.get::<String, _>("username"),
                row.get::<String, _>("org"),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::split_sql_statements;

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(super::SCHEMA_SQL);
        assert!(statements.len() >= 5, "expected one statement per table");
        for statement in &statements {
            assert!(!statement.contains("--"), "comments must be stripped");
            assert!(
                statement.starts_with("CREATE TABLE") || statement.starts_with("CREATE INDEX"),
                "unexpected statement: {statement}"
            );
        }
    }
}
