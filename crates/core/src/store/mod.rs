//! Durable key/value persistence.
//!
//! Everything the library persists across restarts goes through the
//! [`DurableStore`] trait: the auth bearer token and the rate-limit
//! lockout record. The production backend is SQLite via tokio-rusqlite;
//! tests and ephemeral setups use [`MemoryStore`].

mod memory;
mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::Error;
use async_trait::async_trait;

/// Well-known store keys.
pub mod keys {
    /// Bearer token, owned by the auth collaborator.
    pub const AUTH_TOKEN: &str = "auth.token";

    /// Rate-limit lockout record for a resource.
    pub fn rate_limit(resource: &str) -> String {
        format!("rateLimit.{resource}")
    }
}

/// Thin async key/value persistence abstraction.
///
/// Injectable so tests can substitute an in-memory fake without
/// touching real persistence.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read a value, `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), Error>;
}
