//! Rate-limit-aware API client for clubsync.
//!
//! This crate provides the HTTP dispatch layer: a transport abstraction
//! with a reqwest production implementation, a persisted rate-limit gate,
//! and the retry/backoff policy around one logical club fetch.

pub mod api;
pub mod gate;
pub mod transport;

pub use api::{ApiClient, ApiError, ClientOptions, RESOURCE_KEY};
pub use gate::RateLimitGate;
pub use transport::{Exchange, HttpTransport, Transport, TransportError};
