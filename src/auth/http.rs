//! Identity provider reached over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use super::IdentityProvider;
use crate::config::AuthConfig;
use crate::error::{Result, ServiceError};
use crate::model::{Identity, Role};

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
    /// Anything other than `admin` is a student.
    #[serde(default)]
    role: Option<String>,
}

/// Resolves tokens with `GET {base_url}/user`.
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Identity> {
        let response = self
            .client
            .get(format!("{}/user", self.base_url))
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "identity provider unreachable");
                ServiceError::UpstreamUnavailable("identity provider".to_string())
            })?;

        match response.status() {
            status if status.is_success() => {
                let user: UserResponse = response
                    .json()
                    .await
                    .map_err(|e| ServiceError::UpstreamUnavailable(format!("identity provider: {e}")))?;
                Ok(Identity {
                    profile_id: user.id,
                    role: match user.role.as_deref() {
                        Some("admin") => Role::Admin,
                        _ => Role::Student,
                    },
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceError::Unauthenticated),
            status => {
                warn!(status = %status, "identity provider error");
                Err(ServiceError::UpstreamUnavailable(format!("identity provider: HTTP {status}")))
            }
        }
    }
}
