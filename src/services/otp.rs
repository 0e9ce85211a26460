//! One-time codes: issue, hash, deliver, and single-use verification.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::OtpConfig;
use crate::error::{Result, ServiceError};
use crate::storage::{OtpCheck, OtpLimits, OtpPut, OtpStore};

const CODE_DIGITS: usize = 6;

/// Delivers a freshly issued code to its subject (SMS, email...).
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, subject: &str, code: &str) -> Result<()>;
}

/// Writes codes to the log. For local runs only.
pub struct LoggingOtpSender;

#[async_trait]
impl OtpSender for LoggingOtpSender {
    async fn send(&self, subject: &str, code: &str) -> Result<()> {
        info!(subject = %subject, "one-time code issued");
        debug!(subject = %subject, code = %code, "one-time code");
        Ok(())
    }
}

/// Codes are never stored in clear; the hash binds the code to its subject.
fn hash_code(subject: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:0width$}", width = CODE_DIGITS)
}

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    sender: Arc<dyn OtpSender>,
    ttl: Duration,
    limits: OtpLimits,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, sender: Arc<dyn OtpSender>, config: &OtpConfig) -> Self {
        Self {
            store,
            sender,
            ttl: Duration::seconds(config.ttl_secs),
            limits: OtpLimits {
                resend_after: Duration::seconds(config.resend_after_secs.max(0)),
                max_attempts: config.max_attempts.max(1),
            },
        }
    }

    /// Issue a new code for `subject`, replacing any outstanding one.
    /// Returns the expiry.
    ///
    /// Refused while the previous code is younger than the resend interval,
    /// or while it is locked after too many wrong guesses.
    pub async fn issue(&self, subject: &str) -> Result<DateTime<Utc>> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(ServiceError::validation("subject is required"));
        }
        let code = generate_code();
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let put = self
            .store
            .put_code(subject, &hash_code(subject, &code), now, expires_at, self.limits)
            .await?;
        if let OtpPut::Throttled { retry_at } = put {
            warn!(subject = %subject, %retry_at, "one-time code reissue refused");
            return Err(ServiceError::validation(format!(
                "a code was sent recently; retry after {}",
                retry_at.to_rfc3339()
            )));
        }
        self.sender.send(subject, &code).await?;
        Ok(expires_at)
    }

    /// Check and consume the code. A code verifies at most once.
    pub async fn verify(&self, subject: &str, code: &str) -> Result<()> {
        let subject = subject.trim();
        let code = code.trim();
        if subject.is_empty() || code.len() != CODE_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ServiceError::validation("invalid code"));
        }

        let check = self
            .store
            .consume_code(subject, &hash_code(subject, code), Utc::now(), self.limits.max_attempts)
            .await?;
        match check {
            OtpCheck::Accepted => Ok(()),
            OtpCheck::Rejected { remaining } => {
                warn!(subject = %subject, remaining, "wrong one-time code");
                Err(ServiceError::validation("invalid code"))
            }
            OtpCheck::Expired => Err(ServiceError::validation("code expired")),
            OtpCheck::Missing => Err(ServiceError::validation("no code outstanding")),
        }
    }
}
