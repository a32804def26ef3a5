//! Rate-limit detection and quota-reset waiting
//!
//! GitHub rejects calls over quota with 403 or 429 and
//! `x-ratelimit-remaining: 0` (primary limit) or a "rate limit" message
//! (secondary limit). The client then asks `/rate_limit` when the quota
//! resets and suspends through a [`Clock`] until then.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, header::HeaderMap};

/// Lower bound for a rate-limit wait, applied when the reset time has already passed
pub const MIN_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

/// Source of the current time and of suspension
///
/// The client only sleeps to wait out an exhausted quota. Injecting the clock
/// makes that wait observable.
#[async_trait]
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Interval to wait before retrying a rate-limited call.
///
/// `reset - now` clamped to zero, raised to `retry_after` seconds when the
/// rejected response carried one, and never below [`MIN_RATE_LIMIT_WAIT`].
pub fn wait_until_reset(
    reset: DateTime<Utc>,
    now: DateTime<Utc>,
    retry_after: Option<u64>,
) -> Duration {
    let until_reset = (reset - now).to_std().unwrap_or(Duration::ZERO);
    let wait = until_reset.max(Duration::from_secs(retry_after.unwrap_or(0)));
    if wait.is_zero() {
        MIN_RATE_LIMIT_WAIT
    } else {
        wait
    }
}

/// Whether a failed response signals quota exhaustion.
pub(crate) fn is_rate_limited(status: StatusCode, headers: &HeaderMap, message: &str) -> bool {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return false;
    }

    let remaining_exhausted = header_u64(headers, "x-ratelimit-remaining") == Some(0);
    remaining_exhausted || message.to_lowercase().contains("rate limit")
}

pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
