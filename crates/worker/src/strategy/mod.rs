//! Caching strategies and the dispatch table that picks one per route.
//!
//! Every strategy ends in a response. Cache read failures count as misses,
//! cache write failures are logged and dropped, and network failures go down
//! the strategy's own fallback path.

mod api;
mod cache_first;
mod navigation;
mod revalidate;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use companion_client::Fetcher;
use companion_core::{CacheDb, Error, Request, Response};
use tokio::task::JoinHandle;
use url::Url;

use crate::controller::ControllerConfig;
use crate::offline::OfflinePage;
use crate::routes::{RouteClassifier, RouteKind};

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve the cached copy at once, refresh it in the background.
    StaleWhileRevalidate,
    /// Serve the cached copy, refresh it in the background; never fail.
    CacheFirst,
    /// Network, then the ordered cache fallback chain, then the offline page.
    NetworkFirstNavigation,
    /// Network, then cache, then a 503 JSON body.
    NetworkFirstApi,
    /// Serve the cached copy, otherwise fill the cache from the network.
    CacheFirstFill,
}

impl Strategy {
    /// The dispatch table.
    pub fn for_route(kind: RouteKind) -> Self {
        match kind {
            RouteKind::BuildAsset => Strategy::StaleWhileRevalidate,
            RouteKind::StaticMedia => Strategy::CacheFirst,
            RouteKind::Navigation => Strategy::NetworkFirstNavigation,
            RouteKind::Api => Strategy::NetworkFirstApi,
            RouteKind::Other => Strategy::CacheFirstFill,
        }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
    /// Built by the controller (offline page, API error, chunk placeholder).
    Synthesized,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Network => "network",
            Source::Synthesized => "synthesized",
        }
    }
}

/// A response together with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

impl Served {
    pub fn cache(response: Response) -> Self {
        Self { response, source: Source::Cache }
    }

    pub fn network(response: Response) -> Self {
        Self { response, source: Source::Network }
    }

    pub fn synthesized(response: Response) -> Self {
        Self { response, source: Source::Synthesized }
    }
}

/// Shared state every strategy runs against.
///
/// Cheap to clone: background refreshes take their own copy.
#[derive(Clone)]
pub(crate) struct Engine {
    pub(crate) cache: CacheDb,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) generation: Arc<str>,
    pub(crate) fetch_timeout: Duration,
    pub(crate) routes: RouteClassifier,
    pub(crate) home: Url,
    pub(crate) offline: OfflinePage,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Engine {
    pub(crate) fn new(config: &ControllerConfig, cache: CacheDb, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            cache,
            fetcher,
            generation: Arc::from(config.generation.as_str()),
            fetch_timeout: config.fetch_timeout,
            routes: config.routes.clone(),
            home: config.home.clone(),
            offline: OfflinePage::new(&config.pages),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Run `strategy` for `request`.
    pub(crate) async fn run(&self, strategy: Strategy, request: &Request) -> Served {
        match strategy {
            Strategy::StaleWhileRevalidate => revalidate::serve(self, request).await,
            Strategy::CacheFirst => cache_first::serve_media(self, request).await,
            Strategy::NetworkFirstNavigation => navigation::serve(self, request).await,
            Strategy::NetworkFirstApi => api::serve(self, request).await,
            Strategy::CacheFirstFill => cache_first::serve_fill(self, request).await,
        }
    }

    /// Network fetch under the configured bound.
    pub(crate) async fn network(&self, request: &Request) -> Result<Response, Error> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(format!(
                "{} did not settle within {}ms",
                request.url,
                self.fetch_timeout.as_millis()
            ))),
        }
    }

    /// Exact cache lookup. A store failure is logged and reported as a miss.
    pub(crate) async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.cache.match_entry(&self.generation, request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a response if it is a successful GET. Failures are logged only.
    ///
    /// Never recreates a deleted generation: once this engine's generation is
    /// gone the write is dropped.
    pub(crate) async fn store(&self, request: &Request, response: &Response) {
        if !request.is_get() || !response.is_ok() {
            return;
        }
        match self.cache.update_entry(&self.generation, request, response).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(url = %request.url, generation = %self.generation, "generation gone, write dropped");
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache write failed");
            }
        }
    }

    /// Refetch `request` in the background and overwrite its entry on success.
    pub(crate) fn spawn_refresh(&self, request: Request) {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            match engine.network(&request).await {
                Ok(response) if response.is_ok() => {
                    engine.store(&request, &response).await;
                    tracing::debug!(url = %request.url, "background refresh stored");
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "background refresh kept stale entry");
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "background refresh failed");
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Abort every background refresh still running.
    pub(crate) fn abort_background(&self) -> usize {
        let pending = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let mut aborted = 0;
        for task in pending.into_iter().filter(|task| !task.is_finished()) {
            task.abort();
            aborted += 1;
        }
        aborted
    }

    /// Wait for every background refresh started so far, and any they start.
    pub(crate) async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await
                    && !e.is_cancelled()
                {
                    tracing::warn!(error = %e, "background refresh task aborted");
                }
            }
        }
    }
}
