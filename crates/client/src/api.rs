//! Club API client with bounded retry and persisted lockout.
//!
//! One logical fetch goes through [`ApiClient::dispatch`]:
//!
//! 1. Consult the rate-limit gate (lazy expiry); while locked, fail
//!    fast with the remaining seconds and make no network call.
//! 2. Enforce minimum spacing since the previous dispatch (delay,
//!    never drop).
//! 3. Attach the stored bearer token and perform the round trip.
//! 4. Retry exactly once on 429 (after the server's `Retry-After`
//!    hint) and once on 5xx (after a fixed delay). A second 429 locks
//!    the gate.
//! 5. On 401, clear the stored token and fire the reauth hook exactly
//!    once until re-armed.

use crate::gate::RateLimitGate;
use crate::transport::{Transport, TransportError};
use clubsync_core::store::{DurableStore, keys};
use clubsync_core::{AppConfig, Club};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::{Duration, Instant};

/// Store key suffix for the club resource.
pub const RESOURCE_KEY: &str = "club";

/// Errors surfaced from one logical dispatch.
///
/// `RateLimited` and `ServerError` are only returned after the single
/// automatic retry has also failed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout.
    #[error("request timeout")]
    Timeout,

    /// Throttled by the server or the persisted lockout.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    /// 5xx after retry.
    #[error("server error: {status}")]
    ServerError { status: u16 },

    /// 401: reauthentication required.
    #[error("authentication required")]
    AuthError,

    /// Non-retryable 4xx.
    #[error("request rejected: {status}")]
    Validation { status: u16, body: String },

    /// 2xx with a body that is not a club.
    #[error("parse error: {0}")]
    Parse(String),

    /// Durable store failure.
    #[error("store error: {0}")]
    Store(#[from] clubsync_core::Error),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ApiError::Timeout,
            TransportError::Network(message) => ApiError::Network(message),
        }
    }
}

/// Dispatch policy knobs; immutable per client instance.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Minimum spacing between dispatches.
    pub min_interval: Duration,
    /// Retries per failure class (429 and 5xx count separately).
    pub max_retries: u32,
    /// Fixed delay before the 5xx retry.
    pub retry_delay: Duration,
    /// Fallback when a 429 carries no Retry-After header.
    pub default_retry_after_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1_000),
            max_retries: 1,
            retry_delay: Duration::from_millis(2_000),
            default_retry_after_secs: 2,
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_interval: config.min_interval(),
            max_retries: 1,
            retry_delay: config.retry_delay(),
            default_retry_after_secs: config.default_retry_after_secs,
        }
    }
}

/// Enforces minimum spacing between dispatches, waiting if necessary.
#[derive(Debug)]
struct RequestSpacer {
    last_dispatch: tokio::sync::Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RequestSpacer {
    fn new(min_interval: Duration) -> Self {
        Self { last_dispatch: tokio::sync::Mutex::new(None), min_interval }
    }

    async fn acquire(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

type ReauthHook = Arc<dyn Fn() + Send + Sync>;

/// Club API client.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn DurableStore>,
    gate: RateLimitGate,
    spacer: RequestSpacer,
    options: ClientOptions,
    reauth_fired: AtomicBool,
    on_reauth: Mutex<Option<ReauthHook>>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn DurableStore>, options: ClientOptions) -> Self {
        let gate = RateLimitGate::new(store.clone(), RESOURCE_KEY);
        let spacer = RequestSpacer::new(options.min_interval);

        Self {
            transport,
            store,
            gate,
            spacer,
            options,
            reauth_fired: AtomicBool::new(false),
            on_reauth: Mutex::new(None),
        }
    }

    /// Register the hook invoked (once) when a 401 demands reauthentication.
    ///
    /// The UI layer typically navigates to the login screen here.
    pub fn set_reauth_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_reauth.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Re-arm the 401 side effect, e.g. after sign-out or a fresh login.
    pub fn reset_reauth(&self) {
        self.reauth_fired.store(false, Ordering::SeqCst);
    }

    pub fn gate(&self) -> &RateLimitGate {
        &self.gate
    }

    /// Perform one logical fetch of the club resource.
    pub async fn dispatch(&self) -> Result<Club, ApiError> {
        self.gate.clear_if_expired().await?;
        if let Some(remaining) = self.gate.remaining_secs().await? {
            tracing::debug!(remaining, "dispatch suppressed by rate limit lockout");
            return Err(ApiError::RateLimited { retry_after_seconds: remaining });
        }

        self.spacer.acquire().await;

        let token = self.store.get(keys::AUTH_TOKEN).await?;
        self.attempt(token.as_deref()).await
    }

    /// Drive one request to a terminal result, retrying once per
    /// failure class. Retry budgets are explicit counters, not flags
    /// smuggled on the request.
    async fn attempt(&self, token: Option<&str>) -> Result<Club, ApiError> {
        let mut throttle_retries = 0u32;
        let mut server_retries = 0u32;

        loop {
            let exchange = self.transport.round_trip(token).await?;

            match exchange.status {
                200..=299 => {
                    return serde_json::from_slice(&exchange.body).map_err(|e| ApiError::Parse(e.to_string()));
                }
                401 => {
                    self.handle_unauthorized().await?;
                    return Err(ApiError::AuthError);
                }
                429 => {
                    let secs = exchange.retry_after_or(self.options.default_retry_after_secs);
                    if throttle_retries < self.options.max_retries {
                        throttle_retries += 1;
                        tracing::debug!(secs, "throttled, waiting for server hint before retry");
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                        continue;
                    }
                    self.gate.lock(secs).await?;
                    return Err(ApiError::RateLimited { retry_after_seconds: secs });
                }
                500..=599 => {
                    if server_retries < self.options.max_retries {
                        server_retries += 1;
                        tracing::debug!(status = exchange.status, "server error, retrying once");
                        tokio::time::sleep(self.options.retry_delay).await;
                        continue;
                    }
                    return Err(ApiError::ServerError { status: exchange.status });
                }
                status => {
                    return Err(ApiError::Validation {
                        status,
                        body: String::from_utf8_lossy(&exchange.body).into_owned(),
                    });
                }
            }
        }
    }

    /// Clear the stored token and fire the reauth hook, at most once
    /// until re-armed. Concurrent 401s race on the flag, not the side
    /// effects.
    async fn handle_unauthorized(&self) -> Result<(), clubsync_core::Error> {
        if self.reauth_fired.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.store.remove(keys::AUTH_TOKEN).await?;
        tracing::warn!("received 401, cleared stored token");

        let hook = self
            .on_reauth
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }
}
