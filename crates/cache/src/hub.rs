//! Wiring of store, client, cache, and subscribers into one handle.
//!
//! `ClubHub` is the only type UI code needs. It is an explicitly
//! constructed, owned instance: construct one per session, share it by
//! cloning, and drop it on teardown. No module-level globals.

use crate::cache::ClubCache;
use crate::state::{CacheEvent, ClubSnapshot, LoadOutcome};
use crate::subscribers::{SubscriberRegistry, Subscription};
use clubsync_client::{ApiClient, ClientOptions, HttpTransport, Transport, TransportError};
use clubsync_core::store::DurableStore;
use clubsync_core::{AppConfig, SqliteStore};
use std::sync::Arc;
use tokio::time::Duration;

/// Errors constructing or tearing down a hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("store error: {0}")]
    Store(#[from] clubsync_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// The public contract UI consumers program against.
#[derive(Clone)]
pub struct ClubHub {
    cache: ClubCache,
    client: Arc<ApiClient>,
}

impl ClubHub {
    /// Build a production hub: SQLite store and reqwest transport per
    /// the given configuration.
    pub async fn connect(config: &AppConfig) -> Result<Self, HubError> {
        let store: Arc<dyn DurableStore> = Arc::new(SqliteStore::open(&config.db_path).await?);
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.api_base_url, &config.user_agent, config.timeout())?);

        tracing::info!(api_base_url = %config.api_base_url, "club hub connected");
        Ok(Self::assemble(store, transport, ClientOptions::from_config(config), config.ttl()))
    }

    /// Assemble a hub from injected collaborators. This is the seam
    /// tests use to substitute an in-memory store and a scripted
    /// transport.
    pub fn assemble(
        store: Arc<dyn DurableStore>,
        transport: Arc<dyn Transport>,
        options: ClientOptions,
        ttl: Duration,
    ) -> Self {
        let client = Arc::new(ApiClient::new(transport, store, options));
        let registry = SubscriberRegistry::new();
        let cache = ClubCache::new(client.clone(), registry, ttl);
        Self { cache, client }
    }

    /// Current cache state, synchronously.
    pub fn snapshot(&self) -> ClubSnapshot {
        self.cache.snapshot()
    }

    /// Return a fresh club value, fetching at most once no matter how
    /// many consumers ask concurrently.
    pub async fn ensure_fresh(&self) -> LoadOutcome {
        self.cache.ensure_fresh().await
    }

    /// Force the next `ensure_fresh` to refetch.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Observe cache transitions; the callback fires immediately with
    /// the current state.
    pub fn subscribe(&self, callback: impl Fn(&CacheEvent) + Send + Sync + 'static) -> Subscription {
        self.cache.subscribe(callback)
    }

    /// Register the hook invoked once when a 401 demands
    /// reauthentication (typically: navigate to login).
    pub fn on_reauth_required(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.client.set_reauth_hook(hook);
    }

    /// Sign-out: empty the cache, lift the rate-limit lockout, and
    /// re-arm the 401 side effect. The stored auth token is owned by
    /// the auth collaborator and is left alone.
    pub async fn sign_out(&self) -> Result<(), clubsync_core::Error> {
        self.cache.reset();
        self.client.gate().clear().await?;
        self.client.reset_reauth();
        tracing::info!("signed out, cache and rate limit state cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use clubsync_client::{Exchange, RESOURCE_KEY};
    use clubsync_core::MemoryStore;
    use clubsync_core::store::keys;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeTransport {
        responses: tokio::sync::Mutex<VecDeque<Exchange>>,
        calls: AtomicU32,
    }

    impl FakeTransport {
        fn new(responses: Vec<Exchange>) -> Arc<Self> {
            Arc::new(Self { responses: tokio::sync::Mutex::new(responses.into()), calls: AtomicU32::new(0) })
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn round_trip(&self, _token: Option<&str>) -> Result<Exchange, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| TransportError::Network("script exhausted".into()))
        }
    }

    fn ok(name: &str) -> Exchange {
        let body = serde_json::json!({"id": "c1", "name": name}).to_string();
        Exchange { status: 200, retry_after_secs: None, body: Bytes::from(body) }
    }

    fn unauthorized() -> Exchange {
        Exchange { status: 401, retry_after_secs: None, body: Bytes::new() }
    }

    fn hub_with(
        responses: Vec<Exchange>,
    ) -> (ClubHub, Arc<FakeTransport>, Arc<MemoryStore>) {
        let transport = FakeTransport::new(responses);
        let store = Arc::new(MemoryStore::new());
        let hub = ClubHub::assemble(
            store.clone(),
            transport.clone(),
            ClientOptions::default(),
            Duration::from_secs(30),
        );
        (hub, transport, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_fresh_through_hub() {
        let (hub, transport, _store) = hub_with(vec![ok("Chess Circle")]);

        let outcome = hub.ensure_fresh().await;
        assert_eq!(outcome.value().unwrap().name, "Chess Circle");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(hub.snapshot().value.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_resets_cache_and_gate() {
        let (hub, _transport, store) = hub_with(vec![ok("v1")]);

        hub.ensure_fresh().await;
        hub.client.gate().lock(60).await.unwrap();
        store.set(keys::AUTH_TOKEN, "tok-1").await.unwrap();

        let events: Arc<Mutex<Vec<CacheEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let log = events.clone();
        let _sub = hub.subscribe(move |event| log.lock().unwrap().push(event.clone()));

        hub.sign_out().await.unwrap();

        assert!(hub.snapshot().value.is_none());
        assert!(store.get(&keys::rate_limit(RESOURCE_KEY)).await.unwrap().is_none());
        // the token is the auth collaborator's, not ours
        assert_eq!(store.get(keys::AUTH_TOKEN).await.unwrap().as_deref(), Some("tok-1"));

        let seen = events.lock().unwrap();
        assert!(matches!(seen.last(), Some(CacheEvent::Idle)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reauth_hook_fires_through_hub() {
        let (hub, _transport, store) = hub_with(vec![unauthorized()]);
        store.set(keys::AUTH_TOKEN, "tok-1").await.unwrap();

        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        hub.on_reauth_required(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = hub.ensure_fresh().await;
        assert!(!outcome.is_loaded());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(store.get(keys::AUTH_TOKEN).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_rearms_reauth() {
        let (hub, _transport, store) = hub_with(vec![unauthorized(), unauthorized()]);
        store.set(keys::AUTH_TOKEN, "tok-1").await.unwrap();

        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        hub.on_reauth_required(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hub.ensure_fresh().await;
        hub.sign_out().await.unwrap();

        hub.invalidate();
        hub.ensure_fresh().await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_with_sqlite_store() {
        let dir = std::env::temp_dir().join(format!("clubsync-hub-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = AppConfig {
            db_path: dir.join("hub.sqlite"),
            ..Default::default()
        };

        let hub = ClubHub::connect(&config).await.unwrap();
        assert!(hub.snapshot().value.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
