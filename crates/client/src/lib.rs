//! Network side of the companion cache controller.
//!
//! This crate provides the `Fetcher` seam the controller calls for every
//! network request, a reqwest-backed implementation, and the URL helpers the
//! routing and fallback logic rely on.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
