//! Payment reconciliation: gateway orders, signature verification, webhooks
//! and status polls.
//!
//! Orders are persisted as `created` before the gateway is called. No storage
//! lock is held across a gateway call, and a gateway timeout never fails an
//! order: the payment may have gone through, so the order stays `created`
//! until a webhook or a status poll settles it.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{Result, ServiceError};
use crate::gateway::signature::{verify_body_signature, verify_payment_signature};
use crate::gateway::{CreateOrderRequest, GatewayError, PaymentGateway};
use crate::model::{
    Amount, Booking, BookingStatus, Identity, OrderStatus, PaymentMethod, PaymentOrder, WalletSource,
};
use crate::services::booking::{BookingMachine, Confirmation};
use crate::services::wallet::{debit_refund_reference, payment_reference, Movement, WalletLedger};
use crate::storage::{MarkVerified, PaymentStore, WebhookStore};
use crate::utils::retry::{gateway_backoff, is_retryable_gateway};

/// A verified order and what it did to its booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub order: PaymentOrder,
    pub confirmation: Confirmation,
}

/// Result of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    /// Event id seen before; nothing done.
    Duplicate,
    /// Event acknowledged without effect.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    payment: Option<Wrapped<PaymentEntity>>,
    order: Option<Wrapped<OrderEntity>>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderEntity {
    id: String,
    receipt: Option<String>,
}

impl WebhookPayload {
    fn gateway_order_id(&self) -> Option<&str> {
        self.payment
            .as_ref()
            .and_then(|p| p.entity.order_id.as_deref())
            .or_else(|| self.order.as_ref().map(|o| o.entity.id.as_str()))
    }

    fn receipt(&self) -> Option<Uuid> {
        self.order
            .as_ref()
            .and_then(|o| o.entity.receipt.as_deref())
            .and_then(|r| Uuid::parse_str(r).ok())
    }

    fn payment_id(&self) -> Option<&str> {
        self.payment.as_ref().map(|p| p.entity.id.as_str())
    }
}

pub struct PaymentReconciler {
    payments: Arc<dyn PaymentStore>,
    webhooks: Arc<dyn WebhookStore>,
    bookings: Arc<BookingMachine>,
    wallet: Arc<WalletLedger>,
    gateway: Arc<dyn PaymentGateway>,
    key_secret: String,
    webhook_secret: String,
    currency: String,
}

impl PaymentReconciler {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        webhooks: Arc<dyn WebhookStore>,
        bookings: Arc<BookingMachine>,
        wallet: Arc<WalletLedger>,
        gateway: Arc<dyn PaymentGateway>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            payments,
            webhooks,
            bookings,
            wallet,
            gateway,
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Open a gateway order for a pending booking.
    pub async fn create_order(&self, booking_id: Uuid, requester: &Identity, amount: Amount) -> Result<PaymentOrder> {
        if amount <= 0 {
            return Err(ServiceError::validation("amount must be positive"));
        }
        let booking = self.bookings.get_booking(booking_id, requester).await?;
        if booking.status != BookingStatus::Pending {
            return Err(ServiceError::validation(format!(
                "a {} booking cannot take a payment",
                booking.status
            )));
        }
        if amount != booking.amount_due {
            return Err(ServiceError::validation(format!(
                "amount {amount} does not match amount due {}",
                booking.amount_due
            )));
        }

        let mut order = PaymentOrder::new(booking.id, amount, &self.currency, PaymentMethod::Gateway);
        self.payments.insert_order(&order).await?;

        let request = CreateOrderRequest {
            amount,
            currency: self.currency.clone(),
            receipt: order.id.to_string(),
        };
        match self.gateway.create_order(&request).await {
            Ok(gateway_order) => {
                self.payments.attach_gateway_order(order.id, &gateway_order.id).await?;
                info!(
                    order_id = %order.id,
                    booking_id = %booking.id,
                    gateway_order_id = %gateway_order.id,
                    amount,
                    "payment order created"
                );
                order.gateway_order_id = Some(gateway_order.id);
                Ok(order)
            }
            Err(GatewayError::Rejected(reason)) => {
                self.payments.mark_failed(order.id).await?;
                warn!(order_id = %order.id, reason = %reason, "gateway rejected order");
                Err(ServiceError::UpstreamUnavailable(format!("gateway rejected order: {reason}")))
            }
            Err(e) => {
                // The gateway may still have created it; a poll or webhook settles the order.
                warn!(order_id = %order.id, error = %e, "gateway order creation unresolved");
                Err(e.into())
            }
        }
    }

    /// Verify a checkout signature and confirm the booking.
    pub async fn verify_payment(
        &self,
        order_id: Uuid,
        requester: &Identity,
        payment_id: &str,
        signature: &str,
    ) -> Result<Settlement> {
        if payment_id.trim().is_empty() {
            return Err(ServiceError::validation("payment_id is required"));
        }
        let order = self
            .payments
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("payment order"))?;
        self.bookings.get_booking(order.booking_id, requester).await?;

        let Some(gateway_order_id) = order.gateway_order_id.as_deref() else {
            return Err(ServiceError::validation("payment order has no gateway order yet"));
        };

        if !verify_payment_signature(&self.key_secret, gateway_order_id, payment_id, signature) {
            if self.payments.mark_failed(order.id).await? {
                warn!(order_id = %order.id, "payment signature mismatch, order failed");
            }
            return Err(ServiceError::InvalidSignature);
        }

        self.settle(&order, payment_id).await
    }

    /// Process a signed gateway webhook.
    ///
    /// The event id is recorded only after processing succeeds, so a failed
    /// attempt surfaces as an error and the gateway redelivers it.
    pub async fn handle_webhook(&self, event_id: &str, signature: &str, raw_body: &[u8]) -> Result<WebhookOutcome> {
        if !verify_body_signature(&self.webhook_secret, raw_body, signature) {
            warn!(event_id = %event_id, "webhook signature mismatch");
            return Err(ServiceError::InvalidSignature);
        }
        if event_id.trim().is_empty() {
            return Err(ServiceError::validation("missing webhook event id"));
        }
        if self.webhooks.is_processed(event_id).await? {
            debug!(event_id = %event_id, "duplicate webhook delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::validation(format!("malformed webhook body: {e}")))?;

        let outcome = match envelope.event.as_str() {
            "payment.captured" | "order.paid" => self.on_captured(&envelope.payload).await?,
            "payment.failed" => self.on_failed(&envelope.payload).await?,
            other => {
                debug!(event = %other, "webhook event ignored");
                WebhookOutcome::Ignored
            }
        };

        self.webhooks.mark_processed(event_id, &envelope.event).await?;
        info!(event_id = %event_id, event = %envelope.event, outcome = ?outcome, "webhook handled");
        Ok(outcome)
    }

    /// Pay a pending booking from the wallet balance.
    pub async fn pay_with_wallet(&self, booking_id: Uuid, requester: &Identity) -> Result<Settlement> {
        let booking = self.bookings.get_booking(booking_id, requester).await?;
        if let Some(existing) = self.payments.verified_order_for_booking(booking.id).await? {
            return Err(ServiceError::AlreadyProcessed(format!(
                "booking already paid by order {}",
                existing.id
            )));
        }
        if booking.status != BookingStatus::Pending {
            return Err(ServiceError::validation(format!(
                "a {} booking cannot take a payment",
                booking.status
            )));
        }

        let payment_id = if booking.amount_due > 0 {
            let tx = self
                .wallet
                .debit(Movement {
                    profile_id: booking.holder_id,
                    amount: booking.amount_due,
                    source: WalletSource::BookingPayment,
                    description: format!("Payment for booking {}", booking.id),
                    reference: Some(payment_reference(booking.id)),
                })
                .await?;
            format!("wallet:{}", tx.id)
        } else {
            "wallet:free".to_string()
        };

        let order = PaymentOrder::new(booking.id, booking.amount_due, &self.currency, PaymentMethod::Wallet);
        self.payments.insert_order(&order).await?;

        match self.settle(&order, &payment_id).await {
            Err(ServiceError::AlreadyProcessed(msg)) => {
                self.payments.mark_failed(order.id).await?;
                if order.amount > 0 {
                    self.return_wallet_debit(&booking, order.amount, &payment_id).await?;
                }
                Err(ServiceError::AlreadyProcessed(msg))
            }
            other => other,
        }
    }

    /// Credit back a wallet debit that lost the race to confirm its booking.
    ///
    /// Concurrent wallet calls for one booking share a single debit (same
    /// reference), so nothing is returned when the winning order spent it.
    /// The credit is keyed to the debit, so it happens at most once.
    async fn return_wallet_debit(&self, booking: &Booking, amount: Amount, payment_id: &str) -> Result<()> {
        let winner = self.payments.verified_order_for_booking(booking.id).await?;
        if winner.is_some_and(|o| o.gateway_payment_id.as_deref() == Some(payment_id)) {
            debug!(booking_id = %booking.id, "wallet debit already spent on this booking");
            return Ok(());
        }
        let tx = self
            .wallet
            .credit(Movement {
                profile_id: booking.holder_id,
                amount,
                source: WalletSource::BookingRefund,
                description: format!("Refund of duplicate payment for booking {}", booking.id),
                reference: Some(debit_refund_reference(booking.id)),
            })
            .await?;
        info!(booking_id = %booking.id, wallet_tx = %tx.id, amount, "duplicate wallet payment returned");
        Ok(())
    }

    /// Poll the gateway for an order still `created`.
    pub async fn reconcile_order(&self, order_id: Uuid, requester: &Identity) -> Result<PaymentOrder> {
        let order = self
            .payments
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("payment order"))?;
        self.bookings
            .get_booking_for_operator(order.booking_id, requester)
            .await?;

        if order.status != OrderStatus::Created || order.method != PaymentMethod::Gateway {
            return Ok(order);
        }

        let gateway_order_id = match order.gateway_order_id.clone() {
            Some(id) => id,
            None => {
                let receipt = order.id.to_string();
                let found = (|| async { self.gateway.find_order_by_receipt(&receipt).await })
                    .retry(gateway_backoff())
                    .when(is_retryable_gateway)
                    .notify(log_gateway_retry)
                    .await?;
                let Some(found) = found else {
                    debug!(order_id = %order.id, "gateway has no order for receipt");
                    return Ok(order);
                };
                self.payments.attach_gateway_order(order.id, &found.id).await?;
                info!(order_id = %order.id, gateway_order_id = %found.id, "recovered gateway order");
                found.id
            }
        };

        let payments = (|| async { self.gateway.fetch_payments(&gateway_order_id).await })
            .retry(gateway_backoff())
            .when(is_retryable_gateway)
            .notify(log_gateway_retry)
            .await?;

        if let Some(captured) = payments.iter().find(|p| p.is_captured()) {
            match self.settle(&order, &captured.id).await {
                Ok(_) | Err(ServiceError::AlreadyProcessed(_)) => {}
                Err(e) => return Err(e),
            }
        } else if !payments.is_empty() && payments.iter().all(|p| p.status == "failed") {
            self.payments.mark_failed(order.id).await?;
        }

        self.payments
            .get_order(order.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("payment order"))
    }

    /// Every attempt for a booking, oldest first.
    pub async fn list_orders(&self, booking_id: Uuid, requester: &Identity) -> Result<Vec<PaymentOrder>> {
        self.bookings.get_booking(booking_id, requester).await?;
        Ok(self.payments.list_orders_for_booking(booking_id).await?)
    }

    async fn settle(&self, order: &PaymentOrder, payment_id: &str) -> Result<Settlement> {
        let verified = match self.payments.mark_verified(order.id, payment_id).await? {
            MarkVerified::Verified(verified) => {
                info!(order_id = %verified.id, booking_id = %verified.booking_id, "payment verified");
                verified
            }
            MarkVerified::AlreadyVerified(verified) => {
                if verified.gateway_payment_id.as_deref() != Some(payment_id) {
                    return Err(ServiceError::AlreadyProcessed(format!(
                        "order {} was verified with a different payment",
                        verified.id
                    )));
                }
                verified
            }
            MarkVerified::NotOpen(failed) => {
                return Err(ServiceError::validation(format!("payment order {} has failed", failed.id)));
            }
            MarkVerified::BookingAlreadyPaid(other) => {
                return Err(ServiceError::AlreadyProcessed(format!(
                    "booking already paid by order {}",
                    other.id
                )));
            }
        };

        let confirmation = self
            .bookings
            .confirm_booking(verified.booking_id, verified.id)
            .await?;
        Ok(Settlement {
            order: verified,
            confirmation,
        })
    }

    async fn find_webhook_order(&self, payload: &WebhookPayload) -> Result<Option<PaymentOrder>> {
        if let Some(gateway_order_id) = payload.gateway_order_id() {
            if let Some(order) = self.payments.find_order_by_gateway_id(gateway_order_id).await? {
                return Ok(Some(order));
            }
            // Creation may have timed out before the gateway id was attached.
            if let Some(receipt) = payload.receipt() {
                if let Some(order) = self.payments.get_order(receipt).await? {
                    if order.gateway_order_id.is_none() {
                        self.payments.attach_gateway_order(order.id, gateway_order_id).await?;
                        return Ok(self.payments.get_order(order.id).await?);
                    }
                }
            }
        }
        Ok(None)
    }

    async fn on_captured(&self, payload: &WebhookPayload) -> Result<WebhookOutcome> {
        let Some(payment_id) = payload.payment_id() else {
            debug!("capture webhook without payment entity");
            return Ok(WebhookOutcome::Ignored);
        };
        let Some(order) = self.find_webhook_order(payload).await? else {
            warn!(payment_id = %payment_id, "capture webhook for unknown order");
            return Ok(WebhookOutcome::Ignored);
        };

        match self.settle(&order, payment_id).await {
            Ok(settlement) => {
                if let Confirmation::Refunded(_) = settlement.confirmation {
                    info!(order_id = %order.id, "capture landed on cancelled booking, refunded");
                }
                Ok(WebhookOutcome::Processed)
            }
            Err(ServiceError::AlreadyProcessed(msg)) => {
                error!(order_id = %order.id, payment_id = %payment_id, reason = %msg, "captured payment not applied");
                Ok(WebhookOutcome::Ignored)
            }
            Err(ServiceError::Validation(msg)) => {
                error!(order_id = %order.id, payment_id = %payment_id, reason = %msg, "capture for a failed order");
                Ok(WebhookOutcome::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    async fn on_failed(&self, payload: &WebhookPayload) -> Result<WebhookOutcome> {
        let Some(order) = self.find_webhook_order(payload).await? else {
            return Ok(WebhookOutcome::Ignored);
        };
        if self.payments.mark_failed(order.id).await? {
            info!(order_id = %order.id, "payment failed at gateway");
            Ok(WebhookOutcome::Processed)
        } else {
            Ok(WebhookOutcome::Ignored)
        }
    }
}

fn log_gateway_retry(err: &GatewayError, delay: Duration) {
    warn!(error = %err, delay = ?delay, "gateway poll failed, retrying");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Barrier;

    use super::*;
    use crate::gateway::signature::{body_signature, payment_signature};
    use crate::gateway::MockGateway;
    use crate::model::Room;
    use crate::services::booking::NewBooking;
    use crate::services::inventory::InventoryLedger;
    use crate::storage::Stores;

    const RENT: i64 = 1_200_000;

    struct Fixture {
        reconciler: PaymentReconciler,
        bookings: Arc<BookingMachine>,
        wallet: Arc<WalletLedger>,
        gateway: Arc<MockGateway>,
        config: GatewayConfig,
        student: Identity,
        booking: Booking,
    }

    /// Parks the first `gated` verified-order lookups at a barrier, after
    /// they have read, so callers can line up a race on the same booking.
    struct GatedPayments {
        inner: Arc<dyn PaymentStore>,
        barrier: Arc<Barrier>,
        gated: AtomicUsize,
    }

    impl GatedPayments {
        fn wrap(barrier: Arc<Barrier>, gated: usize) -> impl FnOnce(Arc<dyn PaymentStore>) -> Arc<dyn PaymentStore> {
            move |inner: Arc<dyn PaymentStore>| -> Arc<dyn PaymentStore> {
                Arc::new(Self {
                    inner,
                    barrier,
                    gated: AtomicUsize::new(gated),
                })
            }
        }
    }

    #[async_trait::async_trait]
    impl PaymentStore for GatedPayments {
        async fn insert_order(&self, order: &PaymentOrder) -> crate::storage::Result<()> {
            self.inner.insert_order(order).await
        }

        async fn get_order(&self, order_id: Uuid) -> crate::storage::Result<Option<PaymentOrder>> {
            self.inner.get_order(order_id).await
        }

        async fn find_order_by_gateway_id(&self, gateway_order_id: &str) -> crate::storage::Result<Option<PaymentOrder>> {
            self.inner.find_order_by_gateway_id(gateway_order_id).await
        }

        async fn list_orders_for_booking(&self, booking_id: Uuid) -> crate::storage::Result<Vec<PaymentOrder>> {
            self.inner.list_orders_for_booking(booking_id).await
        }

        async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> crate::storage::Result<bool> {
            self.inner.attach_gateway_order(order_id, gateway_order_id).await
        }

        async fn mark_verified(&self, order_id: Uuid, payment_id: &str) -> crate::storage::Result<MarkVerified> {
            self.inner.mark_verified(order_id, payment_id).await
        }

        async fn mark_failed(&self, order_id: Uuid) -> crate::storage::Result<bool> {
            self.inner.mark_failed(order_id).await
        }

        async fn verified_order_for_booking(&self, booking_id: Uuid) -> crate::storage::Result<Option<PaymentOrder>> {
            let found = self.inner.verified_order_for_booking(booking_id).await?;
            if self
                .gated
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                self.barrier.wait().await;
            }
            Ok(found)
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(|payments| payments).await
    }

    async fn fixture_with(wrap: impl FnOnce(Arc<dyn PaymentStore>) -> Arc<dyn PaymentStore>) -> Fixture {
        let mut stores = Stores::in_memory();
        stores.payments = wrap(stores.payments.clone());
        let config = GatewayConfig {
            key_secret: "key_secret".to_string(),
            webhook_secret: "webhook_secret".to_string(),
            ..GatewayConfig::default()
        };
        let inventory = Arc::new(InventoryLedger::new(stores.inventory.clone()));
        let wallet = Arc::new(WalletLedger::new(stores.wallet.clone()));
        let bookings = Arc::new(BookingMachine::new(
            stores.bookings.clone(),
            stores.payments.clone(),
            inventory.clone(),
            wallet.clone(),
        ));
        let gateway = Arc::new(MockGateway::new());
        let reconciler = PaymentReconciler::new(
            stores.payments.clone(),
            stores.webhooks.clone(),
            bookings.clone(),
            wallet.clone(),
            gateway.clone(),
            &config,
        );

        let room = inventory
            .register_room(Room::new(Uuid::new_v4(), 1, RENT))
            .await
            .unwrap();
        let student = Identity::student(Uuid::new_v4());
        let booking = bookings
            .create_booking(
                &student,
                NewBooking {
                    room_id: room.id,
                    check_in: "2026-08-01".parse().unwrap(),
                    check_out: "2026-09-01".parse().unwrap(),
                    promo_code: None,
                },
            )
            .await
            .unwrap();

        Fixture {
            reconciler,
            bookings,
            wallet,
            gateway,
            config,
            student,
            booking,
        }
    }

    fn captured_body(gateway_order_id: &str, payment_id: &str) -> Vec<u8> {
        serde_json::json!({
            "event": "payment.captured",
            "payload": {
                "payment": { "entity": { "id": payment_id, "order_id": gateway_order_id, "status": "captured" } }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_create_order_requires_exact_amount() {
        let f = fixture().await;
        let err = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT - 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Created);
        assert!(order.gateway_order_id.is_some());
    }

    #[tokio::test]
    async fn test_create_order_hidden_from_non_owner() {
        let f = fixture().await;
        let err = f
            .reconciler
            .create_order(f.booking.id, &Identity::student(Uuid::new_v4()), RENT)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_gateway_timeout_leaves_order_created() {
        let f = fixture().await;
        f.gateway
            .fail_next(GatewayError::Timeout("deadline".to_string()))
            .await;

        let err = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnavailable(_)));

        let orders = f.reconciler.list_orders(f.booking.id, &f.student).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn test_gateway_rejection_fails_order() {
        let f = fixture().await;
        f.gateway
            .fail_next(GatewayError::Rejected("amount too large".to_string()))
            .await;

        let err = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnavailable(_)));
        let orders = f.reconciler.list_orders(f.booking.id, &f.student).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_verify_payment_confirms_booking() {
        let f = fixture().await;
        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();
        let gateway_order_id = order.gateway_order_id.clone().unwrap();
        let signature = payment_signature(&f.config.key_secret, &gateway_order_id, "pay_1");

        let settlement = f
            .reconciler
            .verify_payment(order.id, &f.student, "pay_1", &signature)
            .await
            .unwrap();
        assert_eq!(settlement.order.status, OrderStatus::Verified);
        assert_eq!(settlement.confirmation.booking().status, BookingStatus::Confirmed);

        // Same payment again is a no-op success.
        let again = f
            .reconciler
            .verify_payment(order.id, &f.student, "pay_1", &signature)
            .await
            .unwrap();
        assert!(matches!(again.confirmation, Confirmation::AlreadyConfirmed(_)));
    }

    #[tokio::test]
    async fn test_bad_signature_fails_order_and_keeps_booking_pending() {
        let f = fixture().await;
        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();

        let err = f
            .reconciler
            .verify_payment(order.id, &f.student, "pay_1", "00ff")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature));

        let booking = f.bookings.get_booking(f.booking.id, &f.student).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        let orders = f.reconciler.list_orders(f.booking.id, &f.student).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Failed);
        assert!(f
            .wallet
            .list_transactions(f.student.profile_id, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_webhook_is_noop() {
        let f = fixture().await;
        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();
        let body = captured_body(order.gateway_order_id.as_deref().unwrap(), "pay_9");
        let signature = body_signature(&f.config.webhook_secret, &body);

        let first = f
            .reconciler
            .handle_webhook("evt_1", &signature, &body)
            .await
            .unwrap();
        assert_eq!(first, WebhookOutcome::Processed);

        let second = f
            .reconciler
            .handle_webhook("evt_1", &signature, &body)
            .await
            .unwrap();
        assert_eq!(second, WebhookOutcome::Duplicate);

        // A redelivery under a fresh event id is still harmless.
        let third = f
            .reconciler
            .handle_webhook("evt_2", &signature, &body)
            .await
            .unwrap();
        assert_eq!(third, WebhookOutcome::Processed);

        let booking = f.bookings.get_booking(f.booking.id, &f.student).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let f = fixture().await;
        let body = captured_body("order_x", "pay_x");
        let err = f
            .reconciler
            .handle_webhook("evt_1", "deadbeef", &body)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_webhook_after_cancel_refunds() {
        let f = fixture().await;
        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();
        f.bookings
            .cancel_booking(f.booking.id, &f.student, "plans changed this term")
            .await
            .unwrap();

        let body = captured_body(order.gateway_order_id.as_deref().unwrap(), "pay_late");
        let signature = body_signature(&f.config.webhook_secret, &body);
        let outcome = f
            .reconciler
            .handle_webhook("evt_late", &signature, &body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        let booking = f.bookings.get_booking(f.booking.id, &f.student).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), RENT);
    }

    #[tokio::test]
    async fn test_payment_failed_webhook() {
        let f = fixture().await;
        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();
        let body = serde_json::json!({
            "event": "payment.failed",
            "payload": { "payment": { "entity": { "id": "pay_f", "order_id": order.gateway_order_id } } }
        })
        .to_string()
        .into_bytes();
        let signature = body_signature(&f.config.webhook_secret, &body);

        let outcome = f
            .reconciler
            .handle_webhook("evt_f", &signature, &body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);
        let orders = f.reconciler.list_orders(f.booking.id, &f.student).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_event_is_acknowledged() {
        let f = fixture().await;
        let body = br#"{"event":"refund.created","payload":{}}"#.to_vec();
        let signature = body_signature(&f.config.webhook_secret, &body);
        let outcome = f
            .reconciler
            .handle_webhook("evt_r", &signature, &body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_pay_with_wallet() {
        let f = fixture().await;
        let err = f
            .reconciler
            .pay_with_wallet(f.booking.id, &f.student)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientFunds { .. }));

        f.wallet
            .credit(Movement {
                profile_id: f.student.profile_id,
                amount: RENT + 500,
                source: WalletSource::TopUp,
                description: "top up".to_string(),
                reference: None,
            })
            .await
            .unwrap();

        let settlement = f
            .reconciler
            .pay_with_wallet(f.booking.id, &f.student)
            .await
            .unwrap();
        assert_eq!(settlement.order.method, PaymentMethod::Wallet);
        assert_eq!(settlement.confirmation.booking().status, BookingStatus::Confirmed);
        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), 500);

        let err = f
            .reconciler
            .pay_with_wallet(f.booking.id, &f.student)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyProcessed(_)));
        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_reconcile_recovers_lost_creation() {
        let f = fixture().await;
        f.gateway.lose_next_response().await;
        let err = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnavailable(_)));

        let order = f.reconciler.list_orders(f.booking.id, &f.student).await.unwrap()[0].clone();
        assert!(order.gateway_order_id.is_none());

        let polled = f.reconciler.reconcile_order(order.id, &f.student).await.unwrap();
        let gateway_order_id = polled.gateway_order_id.clone().unwrap();
        assert_eq!(polled.status, OrderStatus::Created);

        f.gateway.capture(&gateway_order_id, "pay_polled").await;
        let settled = f.reconciler.reconcile_order(order.id, &f.student).await.unwrap();
        assert_eq!(settled.status, OrderStatus::Verified);
        let booking = f.bookings.get_booking(f.booking.id, &f.student).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(f.gateway.create_calls().await, 1);
    }

    async fn top_up(f: &Fixture, amount: Amount) {
        f.wallet
            .credit(Movement {
                profile_id: f.student.profile_id,
                amount,
                source: WalletSource::TopUp,
                description: "top up".to_string(),
                reference: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_wallet_payments_debit_once() {
        let barrier = Arc::new(Barrier::new(2));
        let f = fixture_with(GatedPayments::wrap(barrier, 2)).await;
        top_up(&f, RENT).await;

        let (a, b) = tokio::join!(
            f.reconciler.pay_with_wallet(f.booking.id, &f.student),
            f.reconciler.pay_with_wallet(f.booking.id, &f.student),
        );
        let (won, lost) = match (a, b) {
            (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert!(matches!(lost, ServiceError::AlreadyProcessed(_)));
        assert_eq!(won.confirmation.booking().status, BookingStatus::Confirmed);

        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), 0);
        let history = f
            .wallet
            .list_transactions(f.student.profile_id, None)
            .await
            .unwrap();
        assert_eq!(history.len(), 2, "one top up and one debit: {history:?}");
    }

    #[tokio::test]
    async fn test_wallet_payment_losing_to_capture_is_returned() {
        let barrier = Arc::new(Barrier::new(2));
        let f = fixture_with(GatedPayments::wrap(barrier.clone(), 1)).await;
        top_up(&f, RENT).await;
        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();
        let body = captured_body(order.gateway_order_id.as_deref().unwrap(), "pay_gw");
        let signature = body_signature(&f.config.webhook_secret, &body);

        let capture = async {
            let outcome = f.reconciler.handle_webhook("evt_race", &signature, &body).await;
            barrier.wait().await;
            outcome
        };
        let (paid, captured) = tokio::join!(f.reconciler.pay_with_wallet(f.booking.id, &f.student), capture);

        assert_eq!(captured.unwrap(), WebhookOutcome::Processed);
        assert!(matches!(paid.unwrap_err(), ServiceError::AlreadyProcessed(_)));

        let booking = f.bookings.get_booking(f.booking.id, &f.student).await.unwrap();
        assert_eq!(booking.confirmed_order_id, Some(order.id));
        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), RENT);

        // Retrying the wallet call neither debits nor refunds again.
        f.reconciler
            .pay_with_wallet(f.booking.id, &f.student)
            .await
            .unwrap_err();
        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), RENT);
        assert_eq!(
            f.wallet
                .list_transactions(f.student.profile_id, None)
                .await
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_webhook_racing_manual_verify() {
        let f = fixture().await;
        let order = f
            .reconciler
            .create_order(f.booking.id, &f.student, RENT)
            .await
            .unwrap();
        let gateway_order_id = order.gateway_order_id.clone().unwrap();
        let payment_sig = payment_signature(&f.config.key_secret, &gateway_order_id, "pay_1");
        let body = captured_body(&gateway_order_id, "pay_1");
        let body_sig = body_signature(&f.config.webhook_secret, &body);

        let (verified, hooked) = tokio::join!(
            f.reconciler.verify_payment(order.id, &f.student, "pay_1", &payment_sig),
            f.reconciler.handle_webhook("evt_v", &body_sig, &body),
        );
        let verified = verified.unwrap();
        assert_eq!(hooked.unwrap(), WebhookOutcome::Processed);
        assert_eq!(verified.order.status, OrderStatus::Verified);

        let booking = f.bookings.get_booking(f.booking.id, &f.student).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.confirmed_order_id, Some(order.id));
        assert_eq!(f.wallet.balance(f.student.profile_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_webhook_racing_cancellation_refunds_once() {
        for capture_first in [false, true] {
            let f = fixture().await;
            let order = f
                .reconciler
                .create_order(f.booking.id, &f.student, RENT)
                .await
                .unwrap();
            let body = captured_body(order.gateway_order_id.as_deref().unwrap(), "pay_c");
            let signature = body_signature(&f.config.webhook_secret, &body);

            let cancel = f.bookings.cancel_booking(f.booking.id, &f.student, "semester abroad instead");
            let capture = f.reconciler.handle_webhook("evt_c", &signature, &body);
            let (cancelled, captured) = if capture_first {
                let (captured, cancelled) = tokio::join!(capture, cancel);
                (cancelled, captured)
            } else {
                tokio::join!(cancel, capture)
            };
            cancelled.unwrap();
            assert_eq!(captured.unwrap(), WebhookOutcome::Processed);

            let booking = f.bookings.get_booking(f.booking.id, &f.student).await.unwrap();
            assert_eq!(booking.status, BookingStatus::Cancelled);
            assert_eq!(
                f.wallet.balance(f.student.profile_id).await.unwrap(),
                RENT,
                "capture_first={capture_first}"
            );
        }
    }
}
