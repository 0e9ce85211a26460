//! Booking state machine.
//!
//! `pending -> confirmed -> active -> completed`, with `cancelled` reachable
//! from `pending` and `confirmed`. Every transition is a compare-and-set on
//! the booking status, so confirmation and cancellation cannot both win.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::model::{Booking, BookingStatus, DateRange, Identity, OrderStatus, PaymentOrder, WalletSource};
use crate::services::inventory::InventoryLedger;
use crate::services::wallet::{refund_reference, Movement, WalletLedger};
use crate::storage::{BookingStore, BookingUpdate, PaymentStore};

/// Longest stay accepted, in started months.
pub const MAX_STAY_MONTHS: u32 = 24;
pub const MIN_REASON_CHARS: usize = 10;
pub const MAX_REASON_CHARS: usize = 500;
pub const DEFAULT_PAGE: u32 = 20;
pub const MAX_PAGE: u32 = 100;

/// Checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// Result of `confirm_booking`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// This call moved the booking to `confirmed`.
    Confirmed(Booking),
    /// The booking was already confirmed by this order; nothing changed.
    AlreadyConfirmed(Booking),
    /// The booking was cancelled first; the verified amount went to the wallet.
    Refunded(Booking),
}

impl Confirmation {
    pub fn booking(&self) -> &Booking {
        match self {
            Confirmation::Confirmed(b) | Confirmation::AlreadyConfirmed(b) | Confirmation::Refunded(b) => b,
        }
    }
}

pub struct BookingMachine {
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentStore>,
    inventory: Arc<InventoryLedger>,
    wallet: Arc<WalletLedger>,
}

impl BookingMachine {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        inventory: Arc<InventoryLedger>,
        wallet: Arc<WalletLedger>,
    ) -> Self {
        Self {
            bookings,
            payments,
            inventory,
            wallet,
        }
    }

    pub async fn create_booking(&self, holder: &Identity, request: NewBooking) -> Result<Booking> {
        let range = DateRange::new(request.check_in, request.check_out)
            .ok_or_else(|| ServiceError::validation("check_out must be after check_in"))?;
        let months = range.billable_months();
        if months > MAX_STAY_MONTHS {
            return Err(ServiceError::validation(format!(
                "stay cannot exceed {MAX_STAY_MONTHS} months"
            )));
        }

        let room = self.inventory.get_room(request.room_id).await?;
        let base = room
            .monthly_rent
            .checked_mul(i64::from(months))
            .ok_or_else(|| ServiceError::validation("booking amount is out of range"))?;

        let now = Utc::now();
        let mut promo_code = None;
        let mut amount_due = base;
        if let Some(code) = request.promo_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            match self.bookings.get_promo(code).await? {
                Some(promo) if promo.is_valid_at(now) => {
                    amount_due = promo.apply(base);
                    promo_code = Some(promo.code);
                }
                _ => debug!(code = %code, "promo code not applicable, ignoring"),
            }
        }

        let reservation = self.inventory.reserve(room.id, range).await?;

        let booking = Booking {
            id: Uuid::new_v4(),
            room_id: room.id,
            holder_id: holder.profile_id,
            check_in: range.check_in,
            check_out: range.check_out,
            status: BookingStatus::Pending,
            amount_due,
            promo_code,
            reservation_id: reservation.id,
            confirmed_order_id: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.bookings.insert_booking(&booking).await {
            warn!(reservation_id = %reservation.id, error = %e, "booking insert failed, releasing hold");
            if let Err(release_err) = self.inventory.release(reservation.id).await {
                warn!(reservation_id = %reservation.id, error = %release_err, "compensating release failed");
            }
            return Err(e.into());
        }

        info!(
            booking_id = %booking.id,
            room_id = %booking.room_id,
            holder_id = %booking.holder_id,
            amount_due = booking.amount_due,
            "booking created"
        );
        Ok(booking)
    }

    /// Owner-only read. Anyone else sees `NotFound`.
    pub async fn get_booking(&self, booking_id: Uuid, requester: &Identity) -> Result<Booking> {
        match self.bookings.get_booking(booking_id).await? {
            Some(booking) if booking.is_owned_by(requester.profile_id) => Ok(booking),
            _ => Err(ServiceError::not_found("booking")),
        }
    }

    /// Owner or admin read, for reconciliation tooling.
    pub async fn get_booking_for_operator(&self, booking_id: Uuid, requester: &Identity) -> Result<Booking> {
        match self.bookings.get_booking(booking_id).await? {
            Some(booking) if requester.is_admin() || booking.is_owned_by(requester.profile_id) => Ok(booking),
            _ => Err(ServiceError::not_found("booking")),
        }
    }

    /// Newest first. `limit` defaults to 20 and is capped at 100.
    pub async fn list_bookings(&self, requester: &Identity, limit: Option<u32>) -> Result<Vec<Booking>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        Ok(self
            .bookings
            .list_bookings_for_holder(requester.profile_id, limit)
            .await?)
    }

    pub async fn cancel_booking(&self, booking_id: Uuid, requester: &Identity, reason: &str) -> Result<Booking> {
        let reason = reason.trim();
        let len = reason.chars().count();
        if !(MIN_REASON_CHARS..=MAX_REASON_CHARS).contains(&len) {
            return Err(ServiceError::validation(format!(
                "cancellation reason must be between {MIN_REASON_CHARS} and {MAX_REASON_CHARS} characters"
            )));
        }

        let current = self.get_booking(booking_id, requester).await?;
        if current.status == BookingStatus::Cancelled {
            // A previous attempt may have failed after the status write.
            self.finish_cancellation(&current).await?;
            return Err(ServiceError::AlreadyProcessed("booking is already cancelled".to_string()));
        }
        if !BookingStatus::CANCELLABLE.contains(&current.status) {
            return Err(ServiceError::validation(format!(
                "a {} booking cannot be cancelled",
                current.status
            )));
        }

        let update = BookingUpdate {
            cancellation_reason: Some(reason.to_string()),
            ..BookingUpdate::status(BookingStatus::Cancelled)
        };
        let Some(cancelled) = self
            .bookings
            .transition_booking(booking_id, &BookingStatus::CANCELLABLE, update)
            .await?
        else {
            // Lost to a concurrent transition; report what won.
            let latest = self.get_booking(booking_id, requester).await?;
            return Err(match latest.status {
                BookingStatus::Cancelled => {
                    self.finish_cancellation(&latest).await?;
                    ServiceError::AlreadyProcessed("booking is already cancelled".to_string())
                }
                status => ServiceError::validation(format!("a {status} booking cannot be cancelled")),
            });
        };

        info!(booking_id = %booking_id, from = %current.status, "booking cancelled");
        self.finish_cancellation(&cancelled).await?;
        Ok(cancelled)
    }

    /// Release the hold and refund a verified payment. Both steps are
    /// idempotent, so re-running after a partial failure completes the work.
    async fn finish_cancellation(&self, booking: &Booking) -> Result<()> {
        self.inventory.release(booking.reservation_id).await?;
        if let Some(order) = self.payments.verified_order_for_booking(booking.id).await? {
            self.refund(booking, &order).await?;
        }
        Ok(())
    }

    /// Called after an order has been verified.
    ///
    /// Idempotent for the same order. A booking cancelled before the
    /// verification landed is refunded instead of confirmed.
    pub async fn confirm_booking(&self, booking_id: Uuid, order_id: Uuid) -> Result<Confirmation> {
        let order = self
            .payments
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("payment order"))?;
        if order.booking_id != booking_id {
            return Err(ServiceError::validation("payment order belongs to another booking"));
        }
        if order.status != OrderStatus::Verified {
            return Err(ServiceError::validation("payment order is not verified"));
        }

        // Status only moves forward, so a lost compare-and-set settles on the next pass.
        for _ in 0..3 {
            let booking = self
                .bookings
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("booking"))?;

            match booking.status {
                BookingStatus::Pending => {
                    let update = BookingUpdate {
                        confirmed_order_id: Some(order.id),
                        ..BookingUpdate::status(BookingStatus::Confirmed)
                    };
                    if let Some(confirmed) = self
                        .bookings
                        .transition_booking(booking_id, &[BookingStatus::Pending], update)
                        .await?
                    {
                        info!(booking_id = %booking_id, order_id = %order.id, "booking confirmed");
                        return Ok(Confirmation::Confirmed(confirmed));
                    }
                }
                BookingStatus::Cancelled => {
                    self.refund(&booking, &order).await?;
                    return Ok(Confirmation::Refunded(booking));
                }
                _ if booking.confirmed_order_id == Some(order.id) => {
                    return Ok(Confirmation::AlreadyConfirmed(booking));
                }
                status => {
                    return Err(ServiceError::AlreadyProcessed(format!(
                        "booking is {status} under another payment"
                    )));
                }
            }
        }

        Err(ServiceError::Internal(format!("booking {booking_id} kept changing during confirmation")))
    }

    /// Admin: confirmed -> active, occupying the room.
    pub async fn check_in(&self, booking_id: Uuid, requester: &Identity) -> Result<Booking> {
        if !requester.is_admin() {
            return Err(ServiceError::Forbidden);
        }
        let active = self
            .advance(booking_id, BookingStatus::Confirmed, BookingStatus::Active)
            .await?;

        if let Err(e) = self.inventory.occupy(active.reservation_id).await {
            warn!(booking_id = %booking_id, error = %e, "check-in failed, reverting status");
            self.bookings
                .transition_booking(
                    booking_id,
                    &[BookingStatus::Active],
                    BookingUpdate::status(BookingStatus::Confirmed),
                )
                .await?;
            return Err(e);
        }

        info!(booking_id = %booking_id, "booking checked in");
        Ok(active)
    }

    /// Admin: active -> completed, vacating the room.
    pub async fn complete(&self, booking_id: Uuid, requester: &Identity) -> Result<Booking> {
        if !requester.is_admin() {
            return Err(ServiceError::Forbidden);
        }
        let completed = match self
            .advance(booking_id, BookingStatus::Active, BookingStatus::Completed)
            .await
        {
            Ok(completed) => completed,
            Err(ServiceError::AlreadyProcessed(msg)) => {
                // Finish a check-out whose vacate failed after the status write.
                if let Some(booking) = self.bookings.get_booking(booking_id).await? {
                    if booking.status == BookingStatus::Completed {
                        self.vacate_if_held(&booking).await?;
                    }
                }
                return Err(ServiceError::AlreadyProcessed(msg));
            }
            Err(e) => return Err(e),
        };
        self.vacate_if_held(&completed).await?;

        info!(booking_id = %booking_id, "booking completed");
        Ok(completed)
    }

    /// Vacating releases the reservation, so a live one means it has not happened yet.
    async fn vacate_if_held(&self, booking: &Booking) -> Result<()> {
        let reservation = self.inventory.get_reservation(booking.reservation_id).await?;
        if !reservation.released {
            if let Err(e) = self.inventory.vacate(reservation.id).await {
                // A concurrent check-out may have vacated it first.
                if !self.inventory.get_reservation(reservation.id).await?.released {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn advance(&self, booking_id: Uuid, from: BookingStatus, to: BookingStatus) -> Result<Booking> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("booking"))?;
        if booking.status == to {
            return Err(ServiceError::AlreadyProcessed(format!("booking is already {to}")));
        }
        if booking.status != from {
            return Err(ServiceError::validation(format!(
                "a {} booking cannot become {to}",
                booking.status
            )));
        }
        self.bookings
            .transition_booking(booking_id, &[from], BookingUpdate::status(to))
            .await?
            .ok_or_else(|| ServiceError::AlreadyProcessed(format!("booking {booking_id} changed concurrently")))
    }

    /// Credit the verified amount back to the holder, once per order.
    async fn refund(&self, booking: &Booking, order: &PaymentOrder) -> Result<()> {
        if order.amount <= 0 {
            return Ok(());
        }
        let tx = self
            .wallet
            .credit(Movement {
                profile_id: booking.holder_id,
                amount: order.amount,
                source: WalletSource::BookingRefund,
                description: format!("Refund for cancelled booking {}", booking.id),
                reference: Some(refund_reference(order.id)),
            })
            .await?;
        info!(
            booking_id = %booking.id,
            order_id = %order.id,
            amount = order.amount,
            wallet_tx = %tx.id,
            "booking refunded to wallet"
        );
        Ok(())
    }
}
