//! SQLite-backed cache generation store.
//!
//! This module provides the persistent on-device cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named, versioned cache generations
//! - Entries keyed by exact method + URL within a generation
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! Writes to the same key are last-write-wins. There is no cross-request
//! locking: every statement is atomic on its own.

pub mod connection;
pub mod entries;
pub mod generations;
pub mod migrations;
pub mod naming;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredEntry;
