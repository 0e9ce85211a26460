//! JSON API over axum.
//!
//! Every route except `/health`, the OTP pair and the gateway webhook
//! requires a bearer token, resolved through the configured
//! `IdentityProvider`. Errors render as `{"error": {"kind", "message"}}`.

use std::sync::Arc;

use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::IdentityProvider;
use crate::config::ServerConfig;
use crate::services::Services;

mod account;
mod bookings;
mod error;
mod extract;
mod payments;
mod wallet;

pub use extract::{ApiJson, Caller};
pub use payments::{EVENT_ID_HEADER, SIGNATURE_HEADER};

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub identity: Arc<dyn IdentityProvider>,
    /// Public gateway key handed to clients for checkout.
    pub gateway_key_id: Arc<str>,
}

impl AppState {
    pub fn new(services: Services, identity: Arc<dyn IdentityProvider>, gateway_key_id: &str) -> Self {
        Self {
            services,
            identity,
            gateway_key_id: Arc::from(gateway_key_id),
        }
    }
}

/// `?limit=` for paged listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
}

/// Build the axum router (separated for testing).
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route("/api/bookings/{id}", get(bookings::get_booking))
        .route("/api/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/api/bookings/{id}/check-in", post(bookings::check_in))
        .route("/api/bookings/{id}/complete", post(bookings::complete))
        .route("/api/bookings/{id}/orders", get(bookings::list_orders))
        .route("/api/payments/orders", post(payments::create_order))
        .route("/api/payments/orders/{id}/reconcile", post(payments::reconcile_order))
        .route("/api/payments/verify", post(payments::verify_payment))
        .route("/api/payments/wallet", post(payments::pay_with_wallet))
        .route("/api/webhooks/payment", post(payments::payment_webhook))
        .route("/api/wallet", get(wallet::get_balance))
        .route("/api/wallet/transactions", get(wallet::list_transactions))
        .route("/api/wallet/credit", post(wallet::credit))
        .route("/api/otp/send", post(account::send_code))
        .route("/api/otp/verify", post(account::verify_code))
        .route("/api/rooms/{id}", get(account::get_room))
        .route("/api/rooms/{id}/maintenance", post(account::set_maintenance))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(
    state: AppState,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = router(state, config);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "roomledger API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
