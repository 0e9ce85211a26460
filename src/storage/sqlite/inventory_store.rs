//! SQLite InventoryStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{begin_immediate, finish};
use crate::model::{DateRange, Reservation, Room, RoomStatus};
use crate::storage::helpers::{format_date, format_timestamp, parse_date, parse_enum, parse_timestamp, parse_uuid, to_u32};
use crate::storage::schema::{Reservations, Rooms};
use crate::storage::{InventoryStore, Result, StorageError};

/// SQLite implementation of InventoryStore.
pub struct SqliteInventoryStore {
    pool: SqlitePool,
}

fn room_from_row(row: &SqliteRow) -> Result<Room> {
    Ok(Room {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        property_id: parse_uuid(&row.try_get::<String, _>("property_id")?)?,
        capacity: to_u32(row.try_get("capacity")?, "capacity")?,
        current_occupancy: to_u32(row.try_get("current_occupancy")?, "current_occupancy")?,
        monthly_rent: row.try_get("monthly_rent")?,
        status: parse_enum(&row.try_get::<String, _>("status")?)?,
        version: row.try_get("version")?,
    })
}

fn reservation_from_row(row: &SqliteRow) -> Result<Reservation> {
    let check_in = parse_date(&row.try_get::<String, _>("check_in")?)?;
    let check_out = parse_date(&row.try_get::<String, _>("check_out")?)?;
    let id: String = row.try_get("id")?;
    let range = DateRange::new(check_in, check_out)
        .ok_or_else(|| StorageError::Corrupt(format!("reservation {id} has an empty range")))?;
    Ok(Reservation {
        id: parse_uuid(&id)?,
        room_id: parse_uuid(&row.try_get::<String, _>("room_id")?)?,
        range,
        released: row.try_get::<i64, _>("released")? != 0,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

impl SqliteInventoryStore {
    /// Create a new SQLite inventory store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_room(conn: &mut SqliteConnection, room_id: Uuid) -> Result<Option<Room>> {
        let query = Query::select()
            .columns([
                Rooms::Id,
                Rooms::PropertyId,
                Rooms::Capacity,
                Rooms::CurrentOccupancy,
                Rooms::MonthlyRent,
                Rooms::Status,
                Rooms::Version,
            ])
            .from(Rooms::Table)
            .and_where(Expr::col(Rooms::Id).eq(room_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(room_from_row).transpose()
    }

    async fn require_room(conn: &mut SqliteConnection, room_id: Uuid) -> Result<Room> {
        Self::fetch_room(conn, room_id)
            .await?
            .ok_or_else(|| StorageError::not_found("room", room_id))
    }

    async fn fetch_reservation(conn: &mut SqliteConnection, reservation_id: Uuid) -> Result<Option<Reservation>> {
        let query = Query::select()
            .columns([
                Reservations::Id,
                Reservations::RoomId,
                Reservations::CheckIn,
                Reservations::CheckOut,
                Reservations::Released,
                Reservations::CreatedAt,
            ])
            .from(Reservations::Table)
            .and_where(Expr::col(Reservations::Id).eq(reservation_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn live_reservation(conn: &mut SqliteConnection, reservation_id: Uuid) -> Result<Reservation> {
        let reservation = Self::fetch_reservation(conn, reservation_id)
            .await?
            .ok_or_else(|| StorageError::not_found("reservation", reservation_id))?;
        if reservation.released {
            return Err(StorageError::InvalidState(format!(
                "reservation {reservation_id} is released"
            )));
        }
        Ok(reservation)
    }

    async fn live_count(conn: &mut SqliteConnection, room_id: Uuid) -> Result<usize> {
        let query = Query::select()
            .expr(Expr::col(Reservations::Id).count())
            .from(Reservations::Table)
            .and_where(Expr::col(Reservations::RoomId).eq(room_id.to_string()))
            .and_where(Expr::col(Reservations::Released).eq(0))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as usize)
    }

    /// Write occupancy and status, guarded by the version read earlier.
    async fn write_room(conn: &mut SqliteConnection, room: &Room, occupancy: u32, status: RoomStatus) -> Result<Room> {
        let query = Query::update()
            .table(Rooms::Table)
            .value(Rooms::CurrentOccupancy, i64::from(occupancy))
            .value(Rooms::Status, status.as_str())
            .value(Rooms::Version, Expr::col(Rooms::Version).add(1))
            .and_where(Expr::col(Rooms::Id).eq(room.id.to_string()))
            .and_where(Expr::col(Rooms::Version).eq(room.version))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!("room {} changed", room.id)));
        }
        Ok(Room {
            current_occupancy: occupancy,
            status,
            version: room.version + 1,
            ..room.clone()
        })
    }

    async fn mark_released(conn: &mut SqliteConnection, reservation_id: Uuid) -> Result<bool> {
        let query = Query::update()
            .table(Reservations::Table)
            .value(Reservations::Released, 1)
            .value(Reservations::ReleasedAt, format_timestamp(Utc::now()))
            .and_where(Expr::col(Reservations::Id).eq(reservation_id.to_string()))
            .and_where(Expr::col(Reservations::Released).eq(0))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reserve_in_tx(conn: &mut SqliteConnection, room_id: Uuid, range: DateRange) -> Result<Reservation> {
        let room = Self::require_room(conn, room_id).await?;
        if !room.status.accepts_reservations() {
            return Err(StorageError::Unavailable(format!("room {room_id} is {}", room.status)));
        }

        let overlap = Query::select()
            .expr(Expr::col(Reservations::Id).count())
            .from(Reservations::Table)
            .and_where(Expr::col(Reservations::RoomId).eq(room_id.to_string()))
            .and_where(Expr::col(Reservations::Released).eq(0))
            .and_where(Expr::col(Reservations::CheckIn).lt(format_date(range.check_out)))
            .and_where(Expr::col(Reservations::CheckOut).gt(format_date(range.check_in)))
            .to_string(SqliteQueryBuilder);
        let overlapping: i64 = sqlx::query(&overlap).fetch_one(&mut *conn).await?.try_get(0)?;
        if overlapping > 0 {
            return Err(StorageError::Unavailable(format!(
                "room {room_id} is already reserved for overlapping dates"
            )));
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            room_id,
            range,
            released: false,
            created_at: Utc::now(),
        };
        let insert = Query::insert()
            .into_table(Reservations::Table)
            .columns([
                Reservations::Id,
                Reservations::RoomId,
                Reservations::CheckIn,
                Reservations::CheckOut,
                Reservations::Released,
                Reservations::CreatedAt,
            ])
            .values_panic([
                reservation.id.to_string().into(),
                room_id.to_string().into(),
                format_date(range.check_in).into(),
                format_date(range.check_out).into(),
                0i64.into(),
                format_timestamp(reservation.created_at).into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&insert).execute(&mut *conn).await?;

        let live = Self::live_count(conn, room_id).await?;
        let status = RoomStatus::derive(room.status, room.current_occupancy, live);
        Self::write_room(conn, &room, room.current_occupancy, status).await?;

        Ok(reservation)
    }

    async fn release_in_tx(conn: &mut SqliteConnection, reservation_id: Uuid) -> Result<bool> {
        let reservation = Self::fetch_reservation(conn, reservation_id)
            .await?
            .ok_or_else(|| StorageError::not_found("reservation", reservation_id))?;
        if !Self::mark_released(conn, reservation_id).await? {
            return Ok(false);
        }

        let room = Self::require_room(conn, reservation.room_id).await?;
        let live = Self::live_count(conn, room.id).await?;
        let status = RoomStatus::derive(room.status, room.current_occupancy, live);
        Self::write_room(conn, &room, room.current_occupancy, status).await?;
        Ok(true)
    }

    async fn occupy_in_tx(conn: &mut SqliteConnection, reservation_id: Uuid) -> Result<Room> {
        let reservation = Self::live_reservation(conn, reservation_id).await?;
        let room = Self::require_room(conn, reservation.room_id).await?;
        if room.status == RoomStatus::Maintenance {
            return Err(StorageError::Unavailable(format!("room {} is in maintenance", room.id)));
        }
        if room.current_occupancy >= room.capacity {
            return Err(StorageError::Unavailable(format!("room {} is at capacity", room.id)));
        }
        Self::write_room(conn, &room, room.current_occupancy + 1, RoomStatus::Occupied).await
    }

    async fn vacate_in_tx(conn: &mut SqliteConnection, reservation_id: Uuid) -> Result<Room> {
        let reservation = Self::live_reservation(conn, reservation_id).await?;
        let room = Self::require_room(conn, reservation.room_id).await?;
        if room.current_occupancy == 0 {
            return Err(StorageError::InvalidState(format!("room {} has no occupants", room.id)));
        }
        Self::mark_released(conn, reservation_id).await?;

        let occupancy = room.current_occupancy - 1;
        let live = Self::live_count(conn, room.id).await?;
        let base = if room.status == RoomStatus::Maintenance {
            RoomStatus::Maintenance
        } else {
            RoomStatus::Available
        };
        Self::write_room(conn, &room, occupancy, RoomStatus::derive(base, occupancy, live)).await
    }

    async fn maintenance_in_tx(conn: &mut SqliteConnection, room_id: Uuid, on: bool) -> Result<Room> {
        let room = Self::require_room(conn, room_id).await?;
        let status = if on {
            RoomStatus::Maintenance
        } else {
            let live = Self::live_count(conn, room_id).await?;
            RoomStatus::derive(RoomStatus::Available, room.current_occupancy, live)
        };
        Self::write_room(conn, &room, room.current_occupancy, status).await
    }
}

#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    async fn insert_room(&self, room: &Room) -> Result<()> {
        let query = Query::insert()
            .into_table(Rooms::Table)
            .columns([
                Rooms::Id,
                Rooms::PropertyId,
                Rooms::Capacity,
                Rooms::CurrentOccupancy,
                Rooms::MonthlyRent,
                Rooms::Status,
                Rooms::Version,
            ])
            .values_panic([
                room.id.to_string().into(),
                room.property_id.to_string().into(),
                i64::from(room.capacity).into(),
                i64::from(room.current_occupancy).into(),
                room.monthly_rent.into(),
                room.status.as_str().into(),
                room.version.into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_room(&self, room_id: Uuid) -> Result<Option<Room>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_room(&mut conn, room_id).await
    }

    async fn reserve(&self, room_id: Uuid, range: DateRange) -> Result<Reservation> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::reserve_in_tx(&mut tx, room_id, range).await;
        finish(tx, result).await
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_reservation(&mut conn, reservation_id).await
    }

    async fn live_reservations(&self, room_id: Uuid) -> Result<Vec<Reservation>> {
        let query = Query::select()
            .columns([
                Reservations::Id,
                Reservations::RoomId,
                Reservations::CheckIn,
                Reservations::CheckOut,
                Reservations::Released,
                Reservations::CreatedAt,
            ])
            .from(Reservations::Table)
            .and_where(Expr::col(Reservations::RoomId).eq(room_id.to_string()))
            .and_where(Expr::col(Reservations::Released).eq(0))
            .order_by(Reservations::CheckIn, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn release(&self, reservation_id: Uuid) -> Result<bool> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::release_in_tx(&mut tx, reservation_id).await;
        finish(tx, result).await
    }

    async fn occupy(&self, reservation_id: Uuid) -> Result<Room> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::occupy_in_tx(&mut tx, reservation_id).await;
        finish(tx, result).await
    }

    async fn vacate(&self, reservation_id: Uuid) -> Result<Room> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::vacate_in_tx(&mut tx, reservation_id).await;
        finish(tx, result).await
    }

    async fn set_maintenance(&self, room_id: Uuid, on: bool) -> Result<Room> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::maintenance_in_tx(&mut tx, room_id, on).await;
        finish(tx, result).await
    }
}
