//! Cache state as seen by consumers.

use clubsync_client::ApiError;
use clubsync_core::Club;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Point-in-time view of the cache.
///
/// `value` and `error` can coexist: a failed refresh keeps the last
/// good value so consumers can render stale content next to an error
/// indicator.
#[derive(Debug, Clone, Default)]
pub struct ClubSnapshot {
    pub value: Option<Arc<Club>>,
    pub fetched_at: Option<Instant>,
    pub loading: bool,
    pub error: Option<LoadFailure>,
}

impl ClubSnapshot {
    /// Age of the cached value, `None` before the first load.
    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }
}

/// Failure description surfaced to the UI instead of an exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub message: String,
    /// Seconds to wait before retrying, when the server said so.
    pub retry_after_seconds: Option<u64>,
    pub timeout: bool,
    /// Reauthentication is required; navigation was already triggered.
    pub auth: bool,
}

impl LoadFailure {
    pub(crate) fn internal(message: &str) -> Self {
        Self { message: message.to_string(), retry_after_seconds: None, timeout: false, auth: false }
    }
}

impl From<&ApiError> for LoadFailure {
    fn from(err: &ApiError) -> Self {
        Self {
            message: err.to_string(),
            retry_after_seconds: match err {
                ApiError::RateLimited { retry_after_seconds } => Some(*retry_after_seconds),
                _ => None,
            },
            timeout: matches!(err, ApiError::Timeout),
            auth: matches!(err, ApiError::AuthError),
        }
    }
}

/// How one `ensure_fresh` call settled.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Arc<Club>),
    Failed(LoadFailure),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }

    pub fn value(&self) -> Option<&Arc<Club>> {
        match self {
            LoadOutcome::Loaded(club) => Some(club),
            LoadOutcome::Failed(_) => None,
        }
    }
}

/// Cache transition delivered to subscribers.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// No value, no fetch in flight (initial state and after sign-out).
    Idle,
    /// A fetch started.
    Loading,
    /// A fetch succeeded and replaced the cached value.
    Updated(Arc<Club>),
    /// A fetch failed; any previous value is still cached.
    Failed(LoadFailure),
}

impl CacheEvent {
    /// Event equivalent of the current snapshot, for the immediate
    /// callback a new subscriber gets.
    pub(crate) fn from_snapshot(snapshot: &ClubSnapshot) -> Self {
        if snapshot.loading {
            CacheEvent::Loading
        } else if let Some(failure) = &snapshot.error {
            CacheEvent::Failed(failure.clone())
        } else if let Some(club) = &snapshot.value {
            CacheEvent::Updated(club.clone())
        } else {
            CacheEvent::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn club() -> Arc<Club> {
        Arc::new(Club {
            id: "c1".into(),
            name: "Chess Circle".into(),
            description: None,
            logo_url: None,
            member_count: 0,
            updated_at: None,
        })
    }

    #[test]
    fn test_failure_from_rate_limited() {
        let failure = LoadFailure::from(&ApiError::RateLimited { retry_after_seconds: 5 });
        assert_eq!(failure.retry_after_seconds, Some(5));
        assert!(!failure.timeout);
        assert!(!failure.auth);
    }

    #[test]
    fn test_failure_from_timeout() {
        let failure = LoadFailure::from(&ApiError::Timeout);
        assert!(failure.timeout);
        assert_eq!(failure.retry_after_seconds, None);
    }

    #[test]
    fn test_failure_from_auth() {
        let failure = LoadFailure::from(&ApiError::AuthError);
        assert!(failure.auth);
    }

    #[test]
    fn test_event_from_empty_snapshot() {
        let event = CacheEvent::from_snapshot(&ClubSnapshot::default());
        assert!(matches!(event, CacheEvent::Idle));
    }

    #[test]
    fn test_event_prefers_loading() {
        let snapshot = ClubSnapshot { value: Some(club()), loading: true, ..Default::default() };
        assert!(matches!(CacheEvent::from_snapshot(&snapshot), CacheEvent::Loading));
    }

    #[test]
    fn test_event_error_over_value() {
        let snapshot = ClubSnapshot {
            value: Some(club()),
            error: Some(LoadFailure::internal("boom")),
            ..Default::default()
        };
        assert!(matches!(CacheEvent::from_snapshot(&snapshot), CacheEvent::Failed(_)));
    }
}
