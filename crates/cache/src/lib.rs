//! Shared club cache for dashboard consumers.
//!
//! Many independent UI consumers read the same per-session club
//! resource. This crate keeps them on one source of truth:
//!
//! - [`ClubCache`]: single-flight fetch deduplication with a TTL-bounded
//!   stale value and a generation counter for invalidation
//! - [`SubscriberRegistry`]: pub/sub fan-out of cache transitions
//! - [`ClubHub`]: the wired-up public contract
//!   (`snapshot`/`ensure_fresh`/`invalidate`/`subscribe`/`sign_out`)
//!
//! Consumers never see an error escape this boundary; every load
//! settles into a [`LoadOutcome`].

pub mod cache;
pub mod hub;
pub mod state;
pub mod subscribers;

pub use cache::ClubCache;
pub use hub::{ClubHub, HubError};
pub use state::{CacheEvent, ClubSnapshot, LoadFailure, LoadOutcome};
pub use subscribers::{SubscriberRegistry, Subscription};
