//! SQLite PaymentStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{begin_immediate, finish, is_unique_violation};
use crate::model::{OrderStatus, PaymentOrder};
use crate::storage::helpers::{format_timestamp, parse_enum, parse_timestamp, parse_uuid};
use crate::storage::schema::PaymentOrders;
use crate::storage::{MarkVerified, PaymentStore, Result, StorageError};

const ORDER_COLUMNS: [PaymentOrders; 10] = [
    PaymentOrders::Id,
    PaymentOrders::BookingId,
    PaymentOrders::Amount,
    PaymentOrders::Currency,
    PaymentOrders::Method,
    PaymentOrders::GatewayOrderId,
    PaymentOrders::GatewayPaymentId,
    PaymentOrders::Status,
    PaymentOrders::CreatedAt,
    PaymentOrders::UpdatedAt,
];

fn order_from_row(row: &SqliteRow) -> Result<PaymentOrder> {
    Ok(PaymentOrder {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        booking_id: parse_uuid(&row.try_get::<String, _>("booking_id")?)?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        method: parse_enum(&row.try_get::<String, _>("method")?)?,
        gateway_order_id: row.try_get("gateway_order_id")?,
        gateway_payment_id: row.try_get("gateway_payment_id")?,
        status: parse_enum(&row.try_get::<String, _>("status")?)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

/// SQLite implementation of PaymentStore.
pub struct SqlitePaymentStore {
    pool: SqlitePool,
}

impl SqlitePaymentStore {
    /// Create a new SQLite payment store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_order(conn: &mut SqliteConnection, order_id: Uuid) -> Result<Option<PaymentOrder>> {
        let query = Query::select()
            .columns(ORDER_COLUMNS)
            .from(PaymentOrders::Table)
            .and_where(Expr::col(PaymentOrders::Id).eq(order_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn fetch_verified(conn: &mut SqliteConnection, booking_id: Uuid) -> Result<Option<PaymentOrder>> {
        let query = Query::select()
            .columns(ORDER_COLUMNS)
            .from(PaymentOrders::Table)
            .and_where(Expr::col(PaymentOrders::BookingId).eq(booking_id.to_string()))
            .and_where(Expr::col(PaymentOrders::Status).eq(OrderStatus::Verified.as_str()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn mark_verified_in_tx(
        conn: &mut SqliteConnection,
        order_id: Uuid,
        payment_id: &str,
    ) -> Result<MarkVerified> {
        let order = Self::fetch_order(conn, order_id)
            .await?
            .ok_or_else(|| StorageError::not_found("payment order", order_id))?;
        match order.status {
            OrderStatus::Verified => return Ok(MarkVerified::AlreadyVerified(order)),
            OrderStatus::Failed => return Ok(MarkVerified::NotOpen(order)),
            OrderStatus::Created => {}
        }

        if let Some(other) = Self::fetch_verified(conn, order.booking_id).await? {
            return Ok(MarkVerified::BookingAlreadyPaid(other));
        }

        let now = Utc::now();
        let query = Query::update()
            .table(PaymentOrders::Table)
            .value(PaymentOrders::Status, OrderStatus::Verified.as_str())
            .value(PaymentOrders::GatewayPaymentId, payment_id)
            .value(PaymentOrders::UpdatedAt, format_timestamp(now))
            .and_where(Expr::col(PaymentOrders::Id).eq(order_id.to_string()))
            .and_where(Expr::col(PaymentOrders::Status).eq(OrderStatus::Created.as_str()))
            .to_string(SqliteQueryBuilder);

        match sqlx::query(&query).execute(&mut *conn).await {
            Ok(result) if result.rows_affected() == 1 => Ok(MarkVerified::Verified(PaymentOrder {
                status: OrderStatus::Verified,
                gateway_payment_id: Some(payment_id.to_string()),
                updated_at: now,
                ..order
            })),
            Ok(_) => Err(StorageError::Conflict(format!("payment order {order_id} changed"))),
            Err(e) if is_unique_violation(&e) => Err(StorageError::Conflict(format!(
                "booking {} already has a verified order",
                order.booking_id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PaymentStore for SqlitePaymentStore {
    async fn insert_order(&self, order: &PaymentOrder) -> Result<()> {
        let query = Query::insert()
            .into_table(PaymentOrders::Table)
            .columns(ORDER_COLUMNS)
            .values_panic([
                order.id.to_string().into(),
                order.booking_id.to_string().into(),
                order.amount.into(),
                order.currency.clone().into(),
                order.method.as_str().into(),
                order.gateway_order_id.clone().into(),
                order.gateway_payment_id.clone().into(),
                order.status.as_str().into(),
                format_timestamp(order.created_at).into(),
                format_timestamp(order.updated_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<PaymentOrder>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, order_id).await
    }

    async fn find_order_by_gateway_id(&self, gateway_order_id: &str) -> Result<Option<PaymentOrder>> {
        let query = Query::select()
            .columns(ORDER_COLUMNS)
            .from(PaymentOrders::Table)
            .and_where(Expr::col(PaymentOrders::GatewayOrderId).eq(gateway_order_id))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders_for_booking(&self, booking_id: Uuid) -> Result<Vec<PaymentOrder>> {
        let query = Query::select()
            .columns(ORDER_COLUMNS)
            .from(PaymentOrders::Table)
            .and_where(Expr::col(PaymentOrders::BookingId).eq(booking_id.to_string()))
            .order_by(PaymentOrders::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> Result<bool> {
        let query = Query::update()
            .table(PaymentOrders::Table)
            .value(PaymentOrders::GatewayOrderId, gateway_order_id)
            .value(PaymentOrders::UpdatedAt, format_timestamp(Utc::now()))
            .and_where(Expr::col(PaymentOrders::Id).eq(order_id.to_string()))
            .and_where(Expr::col(PaymentOrders::Status).eq(OrderStatus::Created.as_str()))
            .and_where(Expr::col(PaymentOrders::GatewayOrderId).is_null())
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get_order(order_id).await? {
            Some(_) => Ok(false),
            None => Err(StorageError::not_found("payment order", order_id)),
        }
    }

    async fn mark_verified(&self, order_id: Uuid, payment_id: &str) -> Result<MarkVerified> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::mark_verified_in_tx(&mut tx, order_id, payment_id).await;
        finish(tx, result).await
    }

    async fn mark_failed(&self, order_id: Uuid) -> Result<bool> {
        let query = Query::update()
            .table(PaymentOrders::Table)
            .value(PaymentOrders::Status, OrderStatus::Failed.as_str())
            .value(PaymentOrders::UpdatedAt, format_timestamp(Utc::now()))
            .and_where(Expr::col(PaymentOrders::Id).eq(order_id.to_string()))
            .and_where(Expr::col(PaymentOrders::Status).eq(OrderStatus::Created.as_str()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get_order(order_id).await? {
            Some(_) => Ok(false),
            None => Err(StorageError::not_found("payment order", order_id)),
        }
    }

    async fn verified_order_for_booking(&self, booking_id: Uuid) -> Result<Option<PaymentOrder>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_verified(&mut conn, booking_id).await
    }
}
