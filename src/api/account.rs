//! One-time code and room routes.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{ApiJson, Caller};
use super::AppState;
use crate::error::{Result, ServiceError};
use crate::model::Room;

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub subject: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub on: bool,
}

pub async fn send_code(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>> {
    let expires_at = state.services.otp.issue(&request.subject).await?;
    Ok(Json(SendCodeResponse { expires_at }))
}

pub async fn verify_code(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>> {
    state.services.otp.verify(&request.subject, &request.code).await?;
    Ok(Json(VerifyCodeResponse { verified: true }))
}

pub async fn get_room(
    State(state): State<AppState>,
    Caller(_caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Room>> {
    Ok(Json(state.services.inventory.get_room(id).await?))
}

pub async fn set_maintenance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<MaintenanceRequest>,
) -> Result<Json<Room>> {
    if !caller.is_admin() {
        return Err(ServiceError::Forbidden);
    }
    Ok(Json(state.services.inventory.set_maintenance(id, request.on).await?))
}
