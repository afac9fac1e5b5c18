//! Offline-first cache controller for the conference companion app.
//!
//! Routes each same-origin GET to a caching strategy, keeps exactly one
//! generation of cached responses alive, and answers with an offline page
//! when nothing else is available.

pub mod commands;
pub mod controller;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod offline;
pub mod routes;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use commands::Command;
pub use controller::{ActivationReport, CacheController, ControllerConfig, FetchDecision, PassReason, PrecacheReport};
pub use error::HostError;
pub use host::{Host, HostEvent, HostReply};
pub use lifecycle::{LifecycleState, Registration};
pub use offline::OfflinePage;
pub use routes::{RouteClassifier, RouteKind};
pub use strategy::{Served, Source, Strategy};
