//! Single-flight club cache with TTL and generation-checked writes.

use crate::state::{CacheEvent, ClubSnapshot, LoadFailure, LoadOutcome};
use crate::subscribers::{Callback, SubscriberRegistry, Subscription};
use clubsync_client::ApiClient;
use clubsync_core::Club;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// Slot the fetch task settles into; joiners wait on the receiver.
type OutcomeSlot = watch::Receiver<Option<LoadOutcome>>;

#[derive(Default)]
struct CacheState {
    value: Option<Arc<Club>>,
    fetched_at: Option<Instant>,
    loading: bool,
    error: Option<LoadFailure>,
    /// Set by `invalidate`; forces the next `ensure_fresh` past the TTL check.
    stale: bool,
    /// Bumped at fetch start and on invalidate/reset. A settling fetch
    /// applies its result only while its generation is still current.
    generation: u64,
    inflight: Option<OutcomeSlot>,
}

enum Plan {
    Join(OutcomeSlot),
    Start { generation: u64, rx: OutcomeSlot, tx: watch::Sender<Option<LoadOutcome>> },
}

/// The single cached club value and its fetch state machine.
///
/// Cheap to clone; clones share state. The mutex is held only for
/// short critical sections, never across an await, so any number of
/// tasks can call `ensure_fresh` concurrently; all overlapping
/// callers join one network dispatch.
#[derive(Clone)]
pub struct ClubCache {
    state: Arc<Mutex<CacheState>>,
    client: Arc<ApiClient>,
    registry: Arc<SubscriberRegistry>,
    ttl: Duration,
}

impl ClubCache {
    pub fn new(client: Arc<ApiClient>, registry: Arc<SubscriberRegistry>, ttl: Duration) -> Self {
        Self { state: Arc::new(Mutex::new(CacheState::default())), client, registry, ttl }
    }

    /// Current state, synchronously; never blocks on the network.
    pub fn snapshot(&self) -> ClubSnapshot {
        let state = self.lock();
        ClubSnapshot {
            value: state.value.clone(),
            fetched_at: state.fetched_at,
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// Register an observer and immediately hand it the current state,
    /// so new subscribers do not wait for the next transition.
    pub fn subscribe(&self, callback: impl Fn(&CacheEvent) + Send + Sync + 'static) -> Subscription {
        let callback: Callback = Arc::new(callback);
        let subscription = self.registry.subscribe_arc(callback.clone());
        callback(&CacheEvent::from_snapshot(&self.snapshot()));
        subscription
    }

    /// Return a fresh value, joining or starting a fetch as needed.
    ///
    /// Fresh cached value: returned without any dispatch. Fetch already
    /// in flight: its outcome is shared with every overlapping caller.
    /// Otherwise one fetch is started; it runs to completion even if
    /// every caller goes away, so the result still lands in the cache
    /// for the next consumer.
    pub async fn ensure_fresh(&self) -> LoadOutcome {
        let plan = {
            let mut state = self.lock();

            let fresh = !state.stale
                && state
                    .fetched_at
                    .is_some_and(|at| at.elapsed() < self.ttl);
            if fresh && let Some(value) = &state.value {
                return LoadOutcome::Loaded(value.clone());
            }

            if let Some(rx) = &state.inflight {
                Plan::Join(rx.clone())
            } else {
                state.generation = state.generation.wrapping_add(1);
                state.loading = true;
                state.stale = false;
                let (tx, rx) = watch::channel(None);
                state.inflight = Some(rx.clone());
                Plan::Start { generation: state.generation, rx, tx }
            }
        };

        match plan {
            Plan::Join(rx) => Self::await_outcome(rx).await,
            Plan::Start { generation, rx, tx } => {
                self.registry.notify(&CacheEvent::Loading);
                self.spawn_fetch(generation, tx);
                Self::await_outcome(rx).await
            }
        }
    }

    /// Force the next `ensure_fresh` to refetch.
    ///
    /// An in-flight fetch is not cancelled, but its result will be
    /// discarded when it settles (generation mismatch); only callers
    /// already joined to it still see its outcome.
    pub fn invalidate(&self) {
        let event = {
            let mut state = self.lock();
            state.stale = true;
            state.generation = state.generation.wrapping_add(1);
            if state.inflight.take().is_some() {
                state.loading = false;
                tracing::debug!("invalidated with fetch in flight, result will be discarded");
                // the discarded fetch will emit nothing, so observers
                // stuck on Loading need the settled state from here
                let snapshot = ClubSnapshot {
                    value: state.value.clone(),
                    fetched_at: state.fetched_at,
                    loading: state.loading,
                    error: state.error.clone(),
                };
                Some(CacheEvent::from_snapshot(&snapshot))
            } else {
                None
            }
        };

        if let Some(event) = event {
            self.registry.notify(&event);
        }
    }

    /// Return to the empty initial state (sign-out).
    pub fn reset(&self) {
        {
            let mut state = self.lock();
            let generation = state.generation.wrapping_add(1);
            *state = CacheState { generation, ..CacheState::default() };
        }
        self.registry.notify(&CacheEvent::Idle);
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    fn spawn_fetch(&self, generation: u64, tx: watch::Sender<Option<LoadOutcome>>) {
        let client = self.client.clone();
        let state = self.state.clone();
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let outcome = match client.dispatch().await {
                Ok(club) => LoadOutcome::Loaded(Arc::new(club)),
                Err(err) => {
                    tracing::debug!(error = %err, "club fetch failed");
                    LoadOutcome::Failed(LoadFailure::from(&err))
                }
            };

            let event = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.generation != generation {
                    tracing::debug!(generation, current = state.generation, "discarding stale fetch result");
                    None
                } else {
                    state.loading = false;
                    state.inflight = None;
                    match &outcome {
                        LoadOutcome::Loaded(club) => {
                            state.value = Some(club.clone());
                            state.fetched_at = Some(Instant::now());
                            state.error = None;
                            Some(CacheEvent::Updated(club.clone()))
                        }
                        LoadOutcome::Failed(failure) => {
                            // keep the previous value; stale data plus an
                            // error beats a blank screen
                            state.error = Some(failure.clone());
                            Some(CacheEvent::Failed(failure.clone()))
                        }
                    }
                }
            };

            if let Some(event) = event {
                registry.notify(&event);
            }
            let _ = tx.send(Some(outcome));
        });
    }

    async fn await_outcome(mut rx: OutcomeSlot) -> LoadOutcome {
        match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot
                .clone()
                .unwrap_or_else(|| LoadOutcome::Failed(LoadFailure::internal("empty fetch slot"))),
            Err(_) => LoadOutcome::Failed(LoadFailure::internal("fetch task abandoned")),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
