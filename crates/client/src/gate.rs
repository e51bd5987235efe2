//! Persisted rate-limit lockout.
//!
//! After sustained 429s the client locks itself out locally for the
//! window the server asked for. The record is persisted so the lockout
//! survives process restarts; expiry is lazy (checked on access, no
//! background timer).

use chrono::Utc;
use clubsync_core::Error;
use clubsync_core::store::{DurableStore, keys};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persisted lockout record.
///
/// Field names are part of the stored format; `until` is epoch
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub until: i64,
    #[serde(rename = "retryAfterSeconds")]
    pub retry_after_seconds: u64,
}

/// Tracks the lockout window for one resource.
///
/// Consulted before every dispatch; while locked, no network call is
/// made and callers get the remaining seconds.
pub struct RateLimitGate {
    store: Arc<dyn DurableStore>,
    key: String,
}

impl RateLimitGate {
    pub fn new(store: Arc<dyn DurableStore>, resource: &str) -> Self {
        Self { store, key: keys::rate_limit(resource) }
    }

    /// Seconds left in the lockout window, `None` when clear.
    ///
    /// An expired record counts as clear even before `clear_if_expired`
    /// removes it.
    pub async fn remaining_secs(&self) -> Result<Option<u64>, Error> {
        let now = Utc::now().timestamp_millis();
        Ok(self.read().await?.and_then(|record| {
            if now < record.until {
                // round up so a caller told "1s" never retries early
                Some((record.until - now).unsigned_abs().div_ceil(1000))
            } else {
                None
            }
        }))
    }

    pub async fn is_locked(&self) -> Result<bool, Error> {
        Ok(self.remaining_secs().await?.is_some())
    }

    /// Persist a lockout window of `retry_after_seconds` from now.
    pub async fn lock(&self, retry_after_seconds: u64) -> Result<(), Error> {
        let until = Utc::now().timestamp_millis() + retry_after_seconds as i64 * 1000;
        let record = LockRecord { until, retry_after_seconds };
        self.store.set(&self.key, &serde_json::to_string(&record)?).await?;

        tracing::warn!(retry_after_seconds, "rate limit lockout persisted");
        Ok(())
    }

    /// Remove the record once its window has passed.
    pub async fn clear_if_expired(&self) -> Result<(), Error> {
        if let Some(record) = self.read().await?
            && Utc::now().timestamp_millis() >= record.until
        {
            self.store.remove(&self.key).await?;
            tracing::debug!("expired rate limit lockout cleared");
        }
        Ok(())
    }

    /// Unconditional removal (sign-out path).
    pub async fn clear(&self) -> Result<(), Error> {
        self.store.remove(&self.key).await
    }

    async fn read(&self) -> Result<Option<LockRecord>, Error> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                // a corrupt record must not wedge the client shut
                tracing::warn!(error = %err, "dropping malformed rate limit record");
                self.store.remove(&self.key).await?;
                Ok(None)
            }
        }
    }
}
