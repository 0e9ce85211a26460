//! OtpStore trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::Result;

/// Result of `OtpStore::consume_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    /// Code matched and has been deleted.
    Accepted,
    /// Code did not match; `remaining` attempts are left (0 means locked until expiry).
    Rejected { remaining: u32 },
    Expired,
    Missing,
}

/// Limits checked by `OtpStore::put_code` in the same write as the insert.
#[derive(Debug, Clone, Copy)]
pub struct OtpLimits {
    /// Minimum spacing between two codes for one subject.
    pub resend_after: Duration,
    pub max_attempts: u32,
}

/// Result of `OtpStore::put_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPut {
    Stored,
    /// An outstanding code blocks reissue until `retry_at`.
    Throttled { retry_at: DateTime<Utc> },
}

/// Decide whether a new code may replace `existing` (issued at, expires at, attempts).
///
/// Returns the attempt count the new code starts from. Wrong guesses carry over
/// while the previous code is live, so reissuing never resets the cap.
pub(crate) fn admit_reissue(
    existing: Option<(DateTime<Utc>, DateTime<Utc>, u32)>,
    now: DateTime<Utc>,
    limits: OtpLimits,
) -> std::result::Result<u32, OtpPut> {
    let Some((issued_at, expires_at, attempts)) = existing else {
        return Ok(0);
    };
    if expires_at <= now {
        return Ok(0);
    }
    if attempts >= limits.max_attempts {
        return Err(OtpPut::Throttled { retry_at: expires_at });
    }
    let retry_at = issued_at + limits.resend_after;
    if retry_at > now {
        return Err(OtpPut::Throttled { retry_at });
    }
    Ok(attempts)
}

/// Keyed store of hashed one-time codes with per-key expiry.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a code for `subject`, replacing any previous one unless `limits`
    /// refuse it. See `admit_reissue`.
    async fn put_code(
        &self,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        limits: OtpLimits,
    ) -> Result<OtpPut>;

    /// Atomic check-and-delete. A code that runs out of attempts stays behind,
    /// locked, until it expires.
    async fn consume_code(
        &self,
        subject: &str,
        code_hash: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<OtpCheck>;
}
