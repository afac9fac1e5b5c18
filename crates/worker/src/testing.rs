//! Test fixtures: a scripted network and preconfigured stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use companion_client::Fetcher;
use companion_core::{AppConfig, CacheDb, Error, Request, Response};
use tokio::sync::Semaphore;
use url::Url;

use crate::controller::{CacheController, ControllerConfig};
use crate::strategy::Engine;

pub(crate) const ORIGIN: &str = "https://app.test";
pub(crate) const GENERATION: &str = "icair-companion-v6-2025-11-04";

pub(crate) fn app_config() -> AppConfig {
    AppConfig { origin: ORIGIN.into(), fetch_timeout_ms: 200, ..Default::default() }
}

pub(crate) fn controller_config(generation: &str) -> ControllerConfig {
    ControllerConfig::from_app_config(&app_config(), generation).unwrap()
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub(crate) fn get(path: &str) -> Request {
    Request::get(url(path))
}

pub(crate) fn page(body: &str) -> Response {
    Response::html(200, body.to_string())
}

pub(crate) async fn test_engine(network: Arc<MockNetwork>) -> Engine {
    let cache = CacheDb::open_in_memory().await.unwrap();
    cache.open_generation(GENERATION).await.unwrap();
    Engine::new(&controller_config(GENERATION), cache, network)
}

pub(crate) fn test_controller(network: Arc<MockNetwork>, cache: CacheDb, generation: &str) -> Arc<CacheController> {
    Arc::new(CacheController::new(controller_config(generation), cache, network))
}

/// Scripted network.
///
/// Unknown URLs answer 404. While offline every fetch rejects. While held,
/// fetches wait until `release` is called.
#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn serve(&self, path: &str, response: Response) {
        self.routes.lock().unwrap().insert(url(path).to_string(), response);
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.add_permits(64);
        }
    }
}

#[async_trait]
impl Fetcher for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::HttpError("network error: offline".into()));
        }

        let routes = self.routes.lock().unwrap();
        Ok(routes.get(request.url.as_str()).cloned().unwrap_or_else(|| Response::empty(404)))
    }
}
