//! WebhookStore trait definition.

use async_trait::async_trait;

use super::Result;

/// Interface for recording processed gateway webhook deliveries.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn is_processed(&self, event_id: &str) -> Result<bool>;

    /// Record a processed event. Returns `false` if it was already recorded.
    async fn mark_processed(&self, event_id: &str, event_name: &str) -> Result<bool>;
}
