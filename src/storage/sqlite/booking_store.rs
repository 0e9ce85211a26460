//! SQLite BookingStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{begin_immediate, finish};
use crate::model::{Booking, BookingStatus, PromoCode};
use crate::storage::helpers::{
    format_date, format_timestamp, parse_date, parse_enum, parse_optional_timestamp, parse_optional_uuid,
    parse_timestamp, parse_uuid,
};
use crate::storage::schema::{Bookings, PromoCodes};
use crate::storage::{BookingStore, BookingUpdate, Result, StorageError};

const BOOKING_COLUMNS: [Bookings; 13] = [
    Bookings::Id,
    Bookings::RoomId,
    Bookings::HolderId,
    Bookings::CheckIn,
    Bookings::CheckOut,
    Bookings::Status,
    Bookings::AmountDue,
    Bookings::PromoCode,
    Bookings::ReservationId,
    Bookings::ConfirmedOrderId,
    Bookings::CancellationReason,
    Bookings::CreatedAt,
    Bookings::UpdatedAt,
];

fn booking_from_row(row: &SqliteRow) -> Result<Booking> {
    Ok(Booking {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        room_id: parse_uuid(&row.try_get::<String, _>("room_id")?)?,
        holder_id: parse_uuid(&row.try_get::<String, _>("holder_id")?)?,
        check_in: parse_date(&row.try_get::<String, _>("check_in")?)?,
        check_out: parse_date(&row.try_get::<String, _>("check_out")?)?,
        status: parse_enum(&row.try_get::<String, _>("status")?)?,
        amount_due: row.try_get("amount_due")?,
        promo_code: row.try_get("promo_code")?,
        reservation_id: parse_uuid(&row.try_get::<String, _>("reservation_id")?)?,
        confirmed_order_id: parse_optional_uuid(row.try_get("confirmed_order_id")?)?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn promo_from_row(row: &SqliteRow) -> Result<PromoCode> {
    let percent_off: Option<i64> = row.try_get("percent_off")?;
    let percent_off = percent_off
        .map(|p| u8::try_from(p).map_err(|_| StorageError::Corrupt(format!("percent_off out of range: {p}"))))
        .transpose()?;
    Ok(PromoCode {
        code: row.try_get("code")?,
        percent_off,
        amount_off: row.try_get("amount_off")?,
        active: row.try_get::<i64, _>("active")? != 0,
        expires_at: parse_optional_timestamp(row.try_get("expires_at")?)?,
    })
}

/// SQLite implementation of BookingStore.
pub struct SqliteBookingStore {
    pool: SqlitePool,
}

impl SqliteBookingStore {
    /// Create a new SQLite booking store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_booking(conn: &mut SqliteConnection, booking_id: Uuid) -> Result<Option<Booking>> {
        let query = Query::select()
            .columns(BOOKING_COLUMNS)
            .from(Bookings::Table)
            .and_where(Expr::col(Bookings::Id).eq(booking_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn transition_in_tx(
        conn: &mut SqliteConnection,
        booking_id: Uuid,
        from: &[BookingStatus],
        update: BookingUpdate,
    ) -> Result<Option<Booking>> {
        let sql = {
            let mut query = Query::update();
            query
                .table(Bookings::Table)
                .value(Bookings::Status, update.status.as_str())
                .value(Bookings::UpdatedAt, format_timestamp(Utc::now()))
                .and_where(Expr::col(Bookings::Id).eq(booking_id.to_string()))
                .and_where(Expr::col(Bookings::Status).is_in(from.iter().map(|s| s.as_str())));
            if let Some(order_id) = update.confirmed_order_id {
                query.value(Bookings::ConfirmedOrderId, order_id.to_string());
            }
            if let Some(reason) = update.cancellation_reason {
                query.value(Bookings::CancellationReason, reason);
            }
            // Statements hold `Rc` identifiers; render before the first await.
            query.to_string(SqliteQueryBuilder)
        };

        let result = sqlx::query(&sql).execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::fetch_booking(conn, booking_id).await
    }
}

#[async_trait]
impl BookingStore for SqliteBookingStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let query = Query::insert()
            .into_table(Bookings::Table)
            .columns(BOOKING_COLUMNS)
            .values_panic([
                booking.id.to_string().into(),
                booking.room_id.to_string().into(),
                booking.holder_id.to_string().into(),
                format_date(booking.check_in).into(),
                format_date(booking.check_out).into(),
                booking.status.as_str().into(),
                booking.amount_due.into(),
                booking.promo_code.clone().into(),
                booking.reservation_id.to_string().into(),
                booking.confirmed_order_id.map(|id| id.to_string()).into(),
                booking.cancellation_reason.clone().into(),
                format_timestamp(booking.created_at).into(),
                format_timestamp(booking.updated_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_booking(&mut conn, booking_id).await
    }

    async fn list_bookings_for_holder(&self, holder_id: Uuid, limit: u32) -> Result<Vec<Booking>> {
        let query = Query::select()
            .columns(BOOKING_COLUMNS)
            .from(Bookings::Table)
            .and_where(Expr::col(Bookings::HolderId).eq(holder_id.to_string()))
            .order_by(Bookings::CreatedAt, Order::Desc)
            .limit(u64::from(limit))
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        update: BookingUpdate,
    ) -> Result<Option<Booking>> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::transition_in_tx(&mut tx, booking_id, from, update).await;
        finish(tx, result).await
    }

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()> {
        let query = Query::insert()
            .into_table(PromoCodes::Table)
            .columns([
                PromoCodes::Code,
                PromoCodes::PercentOff,
                PromoCodes::AmountOff,
                PromoCodes::Active,
                PromoCodes::ExpiresAt,
            ])
            .values_panic([
                promo.code.clone().into(),
                promo.percent_off.map(i64::from).into(),
                promo.amount_off.into(),
                i64::from(promo.active).into(),
                promo.expires_at.map(format_timestamp).into(),
            ])
            .on_conflict(
                OnConflict::column(PromoCodes::Code)
                    .update_columns([
                        PromoCodes::PercentOff,
                        PromoCodes::AmountOff,
                        PromoCodes::Active,
                        PromoCodes::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        let query = Query::select()
            .columns([
                PromoCodes::Code,
                PromoCodes::PercentOff,
                PromoCodes::AmountOff,
                PromoCodes::Active,
                PromoCodes::ExpiresAt,
            ])
            .from(PromoCodes::Table)
            .and_where(Expr::col(PromoCodes::Code).eq(code))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(promo_from_row).transpose()
    }
}
