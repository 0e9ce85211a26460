//! Mock OtpStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::storage::{admit_reissue, OtpCheck, OtpLimits, OtpPut, OtpStore, Result};

struct StoredCode {
    code_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Default)]
pub struct MockOtpStore {
    codes: RwLock<HashMap<String, StoredCode>>,
}

impl MockOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MockOtpStore {
    async fn put_code(
        &self,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        limits: OtpLimits,
    ) -> Result<OtpPut> {
        let mut codes = self.codes.write().await;
        let existing = codes
            .get(subject)
            .map(|c| (c.issued_at, c.expires_at, c.attempts));
        let attempts = match admit_reissue(existing, now, limits) {
            Ok(attempts) => attempts,
            Err(throttled) => return Ok(throttled),
        };
        codes.insert(
            subject.to_string(),
            StoredCode {
                code_hash: code_hash.to_string(),
                issued_at: now,
                expires_at,
                attempts,
            },
        );
        Ok(OtpPut::Stored)
    }

    async fn consume_code(
        &self,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<OtpCheck> {
        let mut codes = self.codes.write().await;
        let Some(stored) = codes.get_mut(subject) else {
            return Ok(OtpCheck::Missing);
        };

        if stored.expires_at <= now {
            codes.remove(subject);
            return Ok(OtpCheck::Expired);
        }

        if stored.attempts >= max_attempts {
            return Ok(OtpCheck::Rejected { remaining: 0 });
        }

        if stored.code_hash == code_hash {
            codes.remove(subject);
            return Ok(OtpCheck::Accepted);
        }

        stored.attempts += 1;
        Ok(OtpCheck::Rejected {
            remaining: max_attempts.saturating_sub(stored.attempts),
        })
    }
}
