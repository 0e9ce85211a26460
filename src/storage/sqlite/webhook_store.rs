//! SQLite WebhookStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::SqlitePool;

use crate::storage::helpers::format_timestamp;
use crate::storage::schema::WebhookEvents;
use crate::storage::{Result, WebhookStore};

/// SQLite implementation of WebhookStore.
pub struct SqliteWebhookStore {
    pool: SqlitePool,
}

impl SqliteWebhookStore {
    /// Create a new SQLite webhook store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookStore for SqliteWebhookStore {
    async fn is_processed(&self, event_id: &str) -> Result<bool> {
        let query = Query::select()
            .column(WebhookEvents::EventId)
            .from(WebhookEvents::Table)
            .and_where(Expr::col(WebhookEvents::EventId).eq(event_id))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }

    async fn mark_processed(&self, event_id: &str, event_name: &str) -> Result<bool> {
        let query = Query::insert()
            .into_table(WebhookEvents::Table)
            .columns([
                WebhookEvents::EventId,
                WebhookEvents::EventName,
                WebhookEvents::ProcessedAt,
            ])
            .values_panic([
                event_id.into(),
                event_name.into(),
                format_timestamp(Utc::now()).into(),
            ])
            .on_conflict(OnConflict::column(WebhookEvents::EventId).do_nothing().to_owned())
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
