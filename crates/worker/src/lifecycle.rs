//! Controller lifecycle and the registration that owns controllers.

use std::sync::Arc;

use companion_core::Error;
use url::Url;

use crate::controller::{ActivationReport, CacheController, PrecacheReport};

/// Where a controller is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Parsed,
    Installing,
    /// Installed, waiting to take over from the active controller.
    Waiting,
    Activating,
    Active,
    /// Replaced by a newer controller, or failed to install.
    Superseded,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Superseded => "superseded",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registration scope with at most one waiting and one active controller.
pub struct Registration {
    scope: Url,
    waiting: Option<Arc<CacheController>>,
    active: Option<Arc<CacheController>>,
}

impl Registration {
    pub fn new(scope: Url) -> Self {
        Self { scope, waiting: None, active: None }
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn active(&self) -> Option<&Arc<CacheController>> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&Arc<CacheController>> {
        self.waiting.as_ref()
    }

    /// Install `controller` and activate it straight away when it asked to
    /// skip waiting or nothing is active yet.
    ///
    /// A failed install leaves the current controllers untouched.
    pub async fn register(&mut self, controller: Arc<CacheController>) -> Result<PrecacheReport, Error> {
        let report = controller.install().await?;

        if let Some(previous) = self.waiting.replace(Arc::clone(&controller)) {
            previous.supersede().await;
        }

        if controller.skip_waiting_requested() || self.active.is_none() {
            self.activate_waiting().await?;
        }
        Ok(report)
    }

    /// Promote the waiting controller, superseding the active one.
    pub async fn activate_waiting(&mut self) -> Result<Option<ActivationReport>, Error> {
        let Some(next) = self.waiting.take() else {
            return Ok(None);
        };

        match next.activate().await {
            Ok(report) => {
                self.promote(next).await;
                Ok(Some(report))
            }
            Err(e) => {
                self.waiting = Some(next);
                Err(e)
            }
        }
    }

    /// Pick up a waiting controller that activated itself (via a skip-waiting
    /// message) since the last call.
    pub async fn refresh(&mut self) {
        let activated = match &self.waiting {
            Some(waiting) => waiting.state().await.is_active(),
            None => false,
        };
        if activated && let Some(next) = self.waiting.take() {
            self.promote(next).await;
        }
    }

    async fn promote(&mut self, next: Arc<CacheController>) {
        tracing::info!(scope = %self.scope, generation = next.generation(), "controller now active");
        if let Some(previous) = self.active.replace(next) {
            previous.supersede().await;
        }
    }
}
