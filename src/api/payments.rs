//! Payment and webhook routes.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::render_webhook_error;
use super::extract::{ApiJson, Caller};
use super::AppState;
use crate::error::Result;
use crate::model::{Amount, Booking, PaymentOrder};
use crate::services::{Confirmation, Settlement, WebhookOutcome};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const EVENT_ID_HEADER: &str = "x-webhook-event-id";

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub booking_id: Uuid,
    pub amount: Amount,
}

/// What the client needs to open the gateway checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutOrder {
    #[serde(flatten)]
    pub order: PaymentOrder,
    pub key_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub order_id: Uuid,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct WalletPaymentRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub order: PaymentOrder,
    pub booking: Booking,
    /// `confirmed`, `already_confirmed` or `refunded`.
    pub outcome: &'static str,
}

impl From<Settlement> for SettlementResponse {
    fn from(settlement: Settlement) -> Self {
        let (outcome, booking) = match settlement.confirmation {
            Confirmation::Confirmed(b) => ("confirmed", b),
            Confirmation::AlreadyConfirmed(b) => ("already_confirmed", b),
            Confirmation::Refunded(b) => ("refunded", b),
        };
        Self {
            order: settlement.order,
            booking,
            outcome,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: WebhookOutcome,
}

pub async fn create_order(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutOrder>)> {
    let order = state
        .services
        .payments
        .create_order(request.booking_id, &caller, request.amount)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutOrder {
            order,
            key_id: state.gateway_key_id.to_string(),
        }),
    ))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> Result<Json<SettlementResponse>> {
    let settlement = state
        .services
        .payments
        .verify_payment(request.order_id, &caller, &request.payment_id, &request.signature)
        .await?;
    Ok(Json(settlement.into()))
}

pub async fn pay_with_wallet(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<WalletPaymentRequest>,
) -> Result<Json<SettlementResponse>> {
    let settlement = state
        .services
        .payments
        .pay_with_wallet(request.booking_id, &caller)
        .await?;
    Ok(Json(settlement.into()))
}

pub async fn reconcile_order(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentOrder>> {
    Ok(Json(state.services.payments.reconcile_order(id, &caller).await?))
}

/// Gateway callback. Authenticated by body signature, not by bearer token.
pub async fn payment_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let signature = header(SIGNATURE_HEADER);
    let event_id = header(EVENT_ID_HEADER);

    match state
        .services
        .payments
        .handle_webhook(&event_id, &signature, &body)
        .await
    {
        Ok(status) => Json(WebhookAck { status }).into_response(),
        Err(e) => render_webhook_error(e),
    }
}
