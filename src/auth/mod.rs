//! Caller identity resolution.
//!
//! Session mechanics live in an external identity service; this crate only
//! exchanges a bearer token for an `Identity`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};
use crate::model::Identity;

mod http;

pub use self::http::HttpIdentityProvider;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token. Unknown or expired tokens are `Unauthenticated`.
    async fn resolve(&self, token: &str) -> Result<Identity>;
}

/// Fixed token table for tests and local runs.
#[derive(Default)]
pub struct StaticIdentityProvider {
    tokens: RwLock<HashMap<String, Identity>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, token: impl Into<String>, identity: Identity) {
        self.tokens.write().await.insert(token.into(), identity);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Identity> {
        self.tokens
            .read()
            .await
            .get(token)
            .copied()
            .ok_or(ServiceError::Unauthenticated)
    }
}
