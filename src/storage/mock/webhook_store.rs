//! Mock WebhookStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{Result, StorageError, WebhookStore};

#[derive(Default)]
pub struct MockWebhookStore {
    processed: RwLock<HashMap<String, String>>,
    fail_on_mark: RwLock<bool>,
}

impl MockWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_mark(&self, fail: bool) {
        *self.fail_on_mark.write().await = fail;
    }
}

#[async_trait]
impl WebhookStore for MockWebhookStore {
    async fn is_processed(&self, event_id: &str) -> Result<bool> {
        Ok(self.processed.read().await.contains_key(event_id))
    }

    async fn mark_processed(&self, event_id: &str, event_name: &str) -> Result<bool> {
        if *self.fail_on_mark.read().await {
            return Err(StorageError::Database("injected mark failure".to_string()));
        }
        let mut processed = self.processed.write().await;
        if processed.contains_key(event_id) {
            return Ok(false);
        }
        processed.insert(event_id.to_string(), event_name.to_string());
        Ok(true)
    }
}
