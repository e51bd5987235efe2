//! Core types and shared functionality for clubsync.
//!
//! This crate provides:
//! - The `Club` domain type cached by the higher layers
//! - Durable key/value store abstraction with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod club;
pub mod config;
pub mod error;
pub mod store;

pub use club::Club;
pub use config::AppConfig;
pub use error::Error;
pub use store::{DurableStore, MemoryStore, SqliteStore};
