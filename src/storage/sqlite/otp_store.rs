//! SQLite OtpStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{begin_immediate, finish};
use crate::storage::helpers::{format_timestamp, parse_timestamp, to_u32};
use crate::storage::schema::OtpCodes;
use crate::storage::{admit_reissue, OtpCheck, OtpLimits, OtpPut, OtpStore, Result};

/// SQLite implementation of OtpStore.
pub struct SqliteOtpStore {
    pool: SqlitePool,
}

impl SqliteOtpStore {
    /// Create a new SQLite OTP store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn delete(conn: &mut SqliteConnection, subject: &str) -> Result<()> {
        let query = Query::delete()
            .from_table(OtpCodes::Table)
            .and_where(Expr::col(OtpCodes::Subject).eq(subject))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;
        Ok(())
    }

    async fn consume_in_tx(
        conn: &mut SqliteConnection,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<OtpCheck> {
        let query = Query::select()
            .columns([OtpCodes::CodeHash, OtpCodes::ExpiresAt, OtpCodes::Attempts])
            .from(OtpCodes::Table)
            .and_where(Expr::col(OtpCodes::Subject).eq(subject))
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&query).fetch_optional(&mut *conn).await? else {
            return Ok(OtpCheck::Missing);
        };
        let stored_hash: String = row.try_get("code_hash")?;
        let expires_at = parse_timestamp(&row.try_get::<String, _>("expires_at")?)?;
        let attempts = to_u32(row.try_get("attempts")?, "attempts")?;

        if expires_at <= now {
            Self::delete(conn, subject).await?;
            return Ok(OtpCheck::Expired);
        }

        if attempts >= max_attempts {
            return Ok(OtpCheck::Rejected { remaining: 0 });
        }

        if stored_hash == code_hash {
            Self::delete(conn, subject).await?;
            return Ok(OtpCheck::Accepted);
        }

        let attempts = attempts + 1;
        let query = Query::update()
            .table(OtpCodes::Table)
            .value(OtpCodes::Attempts, i64::from(attempts))
            .and_where(Expr::col(OtpCodes::Subject).eq(subject))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;
        Ok(OtpCheck::Rejected {
            remaining: max_attempts.saturating_sub(attempts),
        })
    }

    async fn put_in_tx(
        conn: &mut SqliteConnection,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        limits: OtpLimits,
    ) -> Result<OtpPut> {
        let query = Query::select()
            .columns([OtpCodes::IssuedAt, OtpCodes::ExpiresAt, OtpCodes::Attempts])
            .from(OtpCodes::Table)
            .and_where(Expr::col(OtpCodes::Subject).eq(subject))
            .to_string(SqliteQueryBuilder);

        let existing = match sqlx::query(&query).fetch_optional(&mut *conn).await? {
            Some(row) => Some((
                parse_timestamp(&row.try_get::<String, _>("issued_at")?)?,
                parse_timestamp(&row.try_get::<String, _>("expires_at")?)?,
                to_u32(row.try_get("attempts")?, "attempts")?,
            )),
            None => None,
        };
        let attempts = match admit_reissue(existing, now, limits) {
            Ok(attempts) => attempts,
            Err(throttled) => return Ok(throttled),
        };

        let query = Query::insert()
            .into_table(OtpCodes::Table)
            .columns([
                OtpCodes::Subject,
                OtpCodes::CodeHash,
                OtpCodes::IssuedAt,
                OtpCodes::ExpiresAt,
                OtpCodes::Attempts,
            ])
            .values_panic([
                subject.into(),
                code_hash.into(),
                format_timestamp(now).into(),
                format_timestamp(expires_at).into(),
                i64::from(attempts).into(),
            ])
            .on_conflict(
                OnConflict::column(OtpCodes::Subject)
                    .update_columns([
                        OtpCodes::CodeHash,
                        OtpCodes::IssuedAt,
                        OtpCodes::ExpiresAt,
                        OtpCodes::Attempts,
                    ])
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;
        Ok(OtpPut::Stored)
    }
}

#[async_trait]
impl OtpStore for SqliteOtpStore {
    async fn put_code(
        &self,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        limits: OtpLimits,
    ) -> Result<OtpPut> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::put_in_tx(&mut tx, subject, code_hash, now, expires_at, limits).await;
        finish(tx, result).await
    }

    async fn consume_code(
        &self,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<OtpCheck> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::consume_in_tx(&mut tx, subject, code_hash, now, max_attempts).await;
        finish(tx, result).await
    }
}
