//! HTTP client for the payment gateway's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CreateOrderRequest, GatewayError, GatewayOrder, GatewayPayment, PaymentGateway};
use crate::config::GatewayConfig;

#[derive(Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Gateway client using basic auth with the key id and secret.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn classify(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(Self::classify);
        }

        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(status = %status, body = %snippet, "gateway returned retryable status");
            Err(GatewayError::Unavailable(format!("HTTP {status}")))
        } else {
            warn!(status = %status, body = %snippet, "gateway rejected request");
            Err(GatewayError::Rejected(format!("HTTP {status} - {snippet}")))
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.key_id, Some(&self.key_secret))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await
            .map_err(Self::classify)?;

        let order: GatewayOrder = Self::read(response).await?;
        debug!(gateway_order_id = %order.id, receipt = %request.receipt, "gateway order created");
        Ok(order)
    }

    async fn find_order_by_receipt(&self, receipt: &str) -> Result<Option<GatewayOrder>, GatewayError> {
        let response = self
            .get("/orders")
            .query(&[("receipt", receipt)])
            .send()
            .await
            .map_err(Self::classify)?;

        let orders: Collection<GatewayOrder> = Self::read(response).await?;
        Ok(orders.items.into_iter().next())
    }

    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .get(&format!("/orders/{gateway_order_id}"))
            .send()
            .await
            .map_err(Self::classify)?;
        Self::read(response).await
    }

    async fn fetch_payments(&self, gateway_order_id: &str) -> Result<Vec<GatewayPayment>, GatewayError> {
        let response = self
            .get(&format!("/orders/{gateway_order_id}/payments"))
            .send()
            .await
            .map_err(Self::classify)?;

        let payments: Collection<GatewayPayment> = Self::read(response).await?;
        Ok(payments.items)
    }
}
