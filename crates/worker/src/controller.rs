//! The cache controller.
//!
//! One controller serves one cache generation. The host feeds it lifecycle
//! events (install, activate), fetch events, posted messages and sync
//! triggers. Fetch handling is only live once activation has completed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use companion_client::Fetcher;
use companion_client::fetch::{is_same_origin, resolve};
use companion_core::{AppConfig, CacheDb, Error, Request};
use futures_util::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use url::Url;

use crate::commands::Command;
use crate::lifecycle::LifecycleState;
use crate::routes::RouteClassifier;
use crate::strategy::{Engine, Served, Strategy};

/// Everything a controller needs to know, resolved up front.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub origin: Url,
    pub generation: String,
    /// Page routes, linked from the offline page.
    pub pages: Vec<String>,
    /// Pages plus the web-app manifest: what install pre-caches.
    pub precache: Vec<String>,
    pub home: Url,
    pub sync_tag: String,
    pub fetch_timeout: Duration,
    pub routes: RouteClassifier,
}

impl ControllerConfig {
    /// Resolve an `AppConfig` for the given generation name.
    pub fn from_app_config(config: &AppConfig, generation: impl Into<String>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let home = resolve(&origin, &config.home_path)?;

        Ok(Self {
            generation: generation.into(),
            pages: config.precache_pages.clone(),
            precache: config.precache_manifest(),
            home,
            sync_tag: config.sync_tag.clone(),
            fetch_timeout: config.fetch_timeout(),
            routes: RouteClassifier::from_app_config(config),
            origin,
        })
    }
}

/// Why a request was left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    NotGet,
    CrossOrigin,
    NotActive,
}

/// What the controller does with a fetch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    /// Not intercepted: the request goes to the network as-is.
    Passthrough(PassReason),
    /// Intercepted and answered.
    Respond(Served),
}

/// Outcome of a best-effort page manifest fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Generations removed while activating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
}

pub struct CacheController {
    config: ControllerConfig,
    engine: Engine,
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl CacheController {
    pub fn new(config: ControllerConfig, cache: CacheDb, fetcher: Arc<dyn Fetcher>) -> Self {
        let engine = Engine::new(&config, cache, fetcher);
        Self { config, engine, state: RwLock::new(LifecycleState::Parsed), skip_waiting: AtomicBool::new(false) }
    }

    pub fn generation(&self) -> &str {
        &self.config.generation
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheDb {
        &self.engine.cache
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// Ask to be activated without waiting for open pages to go away.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    async fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !from.contains(&*state) {
            return Err(Error::State(format!("cannot move from {} to {}", state.as_str(), to.as_str())));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: LifecycleState) {
        *self.state.write().await = to;
    }

    /// Install: open this generation and pre-cache the page manifest.
    ///
    /// Individual pre-cache failures are logged and skipped. Ends by asking to
    /// skip the waiting phase.
    pub async fn install(&self) -> Result<PrecacheReport, Error> {
        self.transition(&[LifecycleState::Parsed], LifecycleState::Installing).await?;
        tracing::info!(generation = %self.config.generation, "installing");

        if let Err(e) = self.engine.cache.open_generation(&self.config.generation).await {
            tracing::error!(generation = %self.config.generation, error = %e, "install failed");
            self.set_state(LifecycleState::Superseded).await;
            return Err(e);
        }

        let report = self.cache_pages().await;

        self.set_state(LifecycleState::Waiting).await;
        self.skip_waiting();
        tracing::info!(
            generation = %self.config.generation,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "installed"
        );
        Ok(report)
    }

    /// Activate: delete every other generation, then take control of clients.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(&[LifecycleState::Waiting], LifecycleState::Activating).await?;

        match self.prune_generations().await {
            Ok(report) => {
                self.set_state(LifecycleState::Active).await;
                tracing::info!(
                    generation = %self.config.generation,
                    deleted = report.deleted.len(),
                    "activated, claimed clients"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(generation = %self.config.generation, error = %e, "activation failed");
                self.set_state(LifecycleState::Waiting).await;
                Err(e)
            }
        }
    }

    async fn prune_generations(&self) -> Result<ActivationReport, Error> {
        let mut deleted = Vec::new();
        for name in self.engine.cache.generation_names().await? {
            if name != self.config.generation && self.engine.cache.delete_generation(&name).await? {
                tracing::info!(generation = %name, "deleted stale cache generation");
                deleted.push(name);
            }
        }
        self.engine.cache.open_generation(&self.config.generation).await?;
        Ok(ActivationReport { deleted })
    }

    /// Retire this controller after a newer one took over. Background
    /// refreshes still in flight are aborted.
    pub async fn supersede(&self) {
        self.set_state(LifecycleState::Superseded).await;
        let aborted = self.engine.abort_background();
        tracing::info!(generation = %self.config.generation, aborted, "superseded");
    }

    /// Decide what happens to an outgoing request.
    pub async fn handle_fetch(&self, request: &Request) -> FetchDecision {
        if !request.is_get() {
            return FetchDecision::Passthrough(PassReason::NotGet);
        }
        if !is_same_origin(&request.url, &self.config.origin) {
            return FetchDecision::Passthrough(PassReason::CrossOrigin);
        }
        if !self.state().await.is_active() {
            tracing::debug!(url = %request.url, "fetch before activation, not intercepting");
            return FetchDecision::Passthrough(PassReason::NotActive);
        }

        let route = self.engine.routes.classify(request);
        let strategy = Strategy::for_route(route);
        let served = self.engine.run(strategy, request).await;

        tracing::debug!(
            url = %request.url,
            route = %route,
            source = served.source.as_str(),
            status = served.response.status,
            "fetch handled"
        );
        FetchDecision::Respond(served)
    }

    /// Fetch and store every manifest entry independently.
    ///
    /// A superseded controller does nothing: its generation is gone.
    pub async fn cache_pages(&self) -> PrecacheReport {
        if self.state().await == LifecycleState::Superseded {
            tracing::debug!(generation = %self.config.generation, "superseded, not caching pages");
            return PrecacheReport::default();
        }

        let attempts = self.config.precache.iter().map(|path| async move {
            let outcome = self.precache_one(path).await;
            (path.clone(), outcome)
        });

        let mut report = PrecacheReport::default();
        for (path, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => report.cached.push(path),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to pre-cache");
                    report.failed.push(path);
                }
            }
        }
        report
    }

    async fn precache_one(&self, path: &str) -> Result<(), Error> {
        let request = Request::get(resolve(&self.config.origin, path)?);
        let response = self.engine.network(&request).await?;
        if !response.is_ok() {
            return Err(Error::HttpError(format!("status {}", response.status)));
        }
        self.engine.cache.put_entry(&self.config.generation, &request, &response).await
    }

    /// Delete every generation in the store. Returns how many existed.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let names = self.engine.cache.generation_names().await?;
        let mut deleted = 0;
        for name in &names {
            if self.engine.cache.delete_generation(name).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Run a command to completion.
    pub async fn execute(&self, command: Command) -> Result<(), Error> {
        match command {
            Command::SkipWaiting => {
                self.skip_waiting();
                if self.state().await == LifecycleState::Waiting {
                    self.activate().await?;
                }
            }
            Command::ClearCache => {
                let deleted = self.clear_all().await?;
                tracing::info!(deleted, "cleared all cache generations");
            }
            Command::CachePages => {
                let report = self.cache_pages().await;
                tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "re-cached pages");
            }
        }
        Ok(())
    }

    /// Accept a posted message. The command runs in the background; the
    /// returned handle is only for callers that want to wait on it.
    pub fn post_message(self: &Arc<Self>, message: &serde_json::Value) -> Option<JoinHandle<()>> {
        let command = Command::parse(message)?;
        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            if let Err(e) = controller.execute(command).await {
                tracing::warn!(command = command.as_str(), error = %e, "command failed");
            }
        }))
    }

    /// Background-sync trigger. Only the configured tag does anything.
    pub async fn handle_sync(&self, tag: &str) -> Option<PrecacheReport> {
        if tag != self.config.sync_tag {
            tracing::debug!(tag, "ignoring sync event");
            return None;
        }
        Some(self.cache_pages().await)
    }

    /// Wait for background refreshes to finish.
    pub async fn settle(&self) {
        self.engine.settle().await;
    }
}
