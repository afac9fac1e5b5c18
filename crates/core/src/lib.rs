//! Core types and shared functionality for the companion cache controller.
//!
//! This crate provides:
//! - Cache generation store with SQLite backend
//! - Request/response model shared by the fetch client and the controller
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, StoredEntry};
pub use config::{AppConfig, ConfigError, Rollover};
pub use error::Error;
pub use http::{Request, RequestMode, Response};
