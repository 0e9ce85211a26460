//! Mock storage implementations for testing.
//!
//! Each store keeps its state behind a single `tokio::sync::RwLock`, so every
//! conditional operation runs under one write guard and is trivially atomic.
//! Failure and conflict injection hooks let tests drive the error paths.

mod booking_store;
mod inventory_store;
mod otp_store;
mod payment_store;
mod wallet_store;
mod webhook_store;


pub use booking_store::MockBookingStore;
pub use inventory_store::MockInventoryStore;
pub use otp_store::MockOtpStore;
pub use payment_store::MockPaymentStore;
pub use wallet_store::MockWalletStore;
pub use webhook_store::MockWebhookStore;
