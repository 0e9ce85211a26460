//! Booking routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{ApiJson, Caller};
use super::{AppState, PageQuery};
use crate::error::Result;
use crate::model::{Booking, PaymentOrder};
use crate::services::NewBooking;

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

pub async fn create_booking(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<NewBooking>,
) -> Result<(StatusCode, Json<Booking>)> {
    let booking = state.services.bookings.create_booking(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Booking>>> {
    let bookings = state.services.bookings.list_bookings(&caller, page.limit).await?;
    Ok(Json(bookings))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>> {
    Ok(Json(state.services.bookings.get_booking(id, &caller).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<CancelRequest>,
) -> Result<Json<Booking>> {
    let booking = state
        .services
        .bookings
        .cancel_booking(id, &caller, &request.reason)
        .await?;
    Ok(Json(booking))
}

pub async fn check_in(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>> {
    Ok(Json(state.services.bookings.check_in(id, &caller).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>> {
    Ok(Json(state.services.bookings.complete(id, &caller).await?))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PaymentOrder>>> {
    Ok(Json(state.services.payments.list_orders(id, &caller).await?))
}
