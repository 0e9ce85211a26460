//! roomledger-server: booking, payment and wallet API
//!
//! ## Architecture
//! ```text
//! [portal client] --(JSON/HTTP)--> [roomledger-server] --> [SQLite]
//!                                     |          |
//!                                     v          v
//!                         [identity service]  [payment gateway]
//! ```
//!
//! ## Configuration
//! - ROOMLEDGER_CONFIG: Path to a YAML config file (optional)
//! - ROOMLEDGER__SECTION__KEY: Override any config value, e.g.
//!   `ROOMLEDGER__GATEWAY__KEY_SECRET`
//! - ROOMLEDGER_LOG: tracing filter (default: info)
//!
//! The first command-line argument, if given, is also read as a config file.

use std::sync::Arc;

use tracing::{error, info};

use roomledger::auth::HttpIdentityProvider;
use roomledger::config::Config;
use roomledger::gateway::HttpGateway;
use roomledger::api::{self, AppState};
use roomledger::services::{LoggingOtpSender, Services};
use roomledger::storage::init_storage;
use roomledger::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    if config.gateway.key_secret.is_empty() || config.gateway.webhook_secret.is_empty() {
        error!("gateway key_secret and webhook_secret must be configured");
        return Err("missing gateway secrets".into());
    }

    let stores = init_storage(&config.storage).await?;
    let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
    let identity = Arc::new(HttpIdentityProvider::new(&config.auth)?);

    // TODO: swap in an SMS/email sender once a delivery provider is chosen.
    let services = Services::new(&stores, gateway, Arc::new(LoggingOtpSender), &config);
    let state = AppState::new(services, identity, &config.gateway.key_id);

    info!(
        storage = ?config.storage.storage_type,
        gateway = %config.gateway.base_url,
        "roomledger-server started"
    );

    api::serve(state, &config.server, shutdown_signal())
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    info!("roomledger-server stopped");
    Ok(())
}
