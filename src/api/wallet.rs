//! Wallet routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{ApiJson, Caller};
use super::{AppState, PageQuery};
use crate::error::{Result, ServiceError};
use crate::model::{Amount, WalletSource, WalletTransaction};
use crate::services::Movement;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub profile_id: Uuid,
    pub balance: Amount,
}

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub profile_id: Uuid,
    pub amount: Amount,
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub source: Option<WalletSource>,
}

pub async fn get_balance(State(state): State<AppState>, Caller(caller): Caller) -> Result<Json<BalanceResponse>> {
    let balance = state.services.wallet.balance(caller.profile_id).await?;
    Ok(Json(BalanceResponse {
        profile_id: caller.profile_id,
        balance,
    }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<WalletTransaction>>> {
    let txs = state
        .services
        .wallet
        .list_transactions(caller.profile_id, page.limit)
        .await?;
    Ok(Json(txs))
}

/// Admin adjustment or top-up.
pub async fn credit(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<CreditRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>)> {
    if !caller.is_admin() {
        return Err(ServiceError::Forbidden);
    }
    let tx = state
        .services
        .wallet
        .credit(Movement {
            profile_id: request.profile_id,
            amount: request.amount,
            source: request.source.unwrap_or(WalletSource::Adjustment),
            description: request.description,
            reference: request.reference,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(tx)))
}
