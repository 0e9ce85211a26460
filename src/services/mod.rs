//! Domain services.
//!
//! Each service owns one consistency concern and talks to storage only
//! through the store traits:
//!
//! - `InventoryLedger`: room holds and occupancy
//! - `BookingMachine`: booking lifecycle
//! - `PaymentReconciler`: gateway orders, signatures, webhooks, polls
//! - `WalletLedger`: per-profile append-only balance
//! - `OtpService`: one-time codes

pub mod booking;
pub mod inventory;
pub mod otp;
pub mod payment;
pub mod wallet;

use std::sync::Arc;

pub use booking::{BookingMachine, Confirmation, NewBooking};
pub use inventory::InventoryLedger;
pub use otp::{LoggingOtpSender, OtpSender, OtpService};
pub use payment::{PaymentReconciler, Settlement, WebhookOutcome};
pub use wallet::{Movement, WalletLedger};

use crate::config::Config;
use crate::gateway::PaymentGateway;
use crate::storage::Stores;

/// All services wired to one set of stores.
#[derive(Clone)]
pub struct Services {
    pub inventory: Arc<InventoryLedger>,
    pub bookings: Arc<BookingMachine>,
    pub payments: Arc<PaymentReconciler>,
    pub wallet: Arc<WalletLedger>,
    pub otp: Arc<OtpService>,
}

impl Services {
    pub fn new(
        stores: &Stores,
        gateway: Arc<dyn PaymentGateway>,
        otp_sender: Arc<dyn OtpSender>,
        config: &Config,
    ) -> Self {
        let inventory = Arc::new(InventoryLedger::new(stores.inventory.clone()));
        let wallet = Arc::new(WalletLedger::new(stores.wallet.clone()));
        let bookings = Arc::new(BookingMachine::new(
            stores.bookings.clone(),
            stores.payments.clone(),
            inventory.clone(),
            wallet.clone(),
        ));
        let payments = Arc::new(PaymentReconciler::new(
            stores.payments.clone(),
            stores.webhooks.clone(),
            bookings.clone(),
            wallet.clone(),
            gateway,
            &config.gateway,
        ));
        let otp = Arc::new(OtpService::new(stores.otp.clone(), otp_sender, &config.otp));

        Self {
            inventory,
            bookings,
            payments,
            wallet,
            otp,
        }
    }
}
