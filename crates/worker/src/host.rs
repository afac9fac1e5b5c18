//! Line-delimited JSON host for the controller.
//!
//! Reads one event per line from the input, writes one reply per line to the
//! output. Events are handled in order.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use companion_client::Fetcher;
use companion_core::{AppConfig, CacheDb, Request, RequestMode, Response};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use url::Url;

use crate::commands::Command;
use crate::controller::{CacheController, ControllerConfig, FetchDecision, PassReason};
use crate::error::HostError;
use crate::lifecycle::Registration;

/// An incoming event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum HostEvent {
    /// Install (and, with nothing active, activate) a controller. A
    /// `generation` overrides the configured name, which is how a deploy is
    /// simulated.
    Install {
        #[serde(default)]
        generation: Option<String>,
    },
    Activate,
    Fetch {
        #[serde(default = "default_method")]
        method: String,
        url: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Message {
        data: serde_json::Value,
    },
    Sync {
        tag: String,
    },
    Status,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A reply line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "lowercase")]
pub enum HostReply {
    Installed {
        generation: String,
        cached: Vec<String>,
        failed: Vec<String>,
    },
    Activated {
        generation: Option<String>,
        deleted: Vec<String>,
    },
    Response {
        intercepted: bool,
        source: &'static str,
        status: u16,
        headers: BTreeMap<String, String>,
        /// `utf8` for text bodies, `base64` for anything else.
        encoding: &'static str,
        body: String,
    },
    Accepted {
        command: Option<&'static str>,
    },
    Synced {
        tag: String,
        cached: Option<usize>,
    },
    Status {
        scope: String,
        active: Option<String>,
        waiting: Option<String>,
        state: Option<&'static str>,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

impl HostReply {
    fn from_response(response: Response, intercepted: bool, source: &'static str) -> Self {
        let (encoding, body) = match std::str::from_utf8(&response.body) {
            Ok(text) => ("utf8", text.to_string()),
            Err(_) => ("base64", BASE64.encode(&response.body)),
        };
        HostReply::Response { intercepted, source, status: response.status, headers: response.headers, encoding, body }
    }
}

impl From<HostError> for HostReply {
    fn from(err: HostError) -> Self {
        HostReply::Error { code: err.code(), message: err.to_string() }
    }
}

pub struct Host {
    config: AppConfig,
    cache: Option<CacheDb>,
    fetcher: Arc<dyn Fetcher>,
    registration: Registration,
    generation: String,
    /// Commands still running in the background.
    commands: Vec<JoinHandle<()>>,
}

impl Host {
    /// A host without a store runs in pass-through mode.
    pub fn new(
        config: AppConfig, cache: Option<CacheDb>, fetcher: Arc<dyn Fetcher>, generation: String,
    ) -> Result<Self, HostError> {
        let scope = Url::parse(&config.origin)
            .map_err(|e| companion_core::Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self { config, cache, fetcher, registration: Registration::new(scope), generation, commands: Vec::new() })
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Process events until the input closes, then wait for background work.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<(), HostError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let reply = match serde_json::from_str::<HostEvent>(line) {
                Ok(event) => self.handle(event).await,
                Err(e) => HostError::InvalidEvent(e.to_string()).into(),
            };

            let mut encoded = serde_json::to_vec(&reply).map_err(|e| HostError::InvalidEvent(e.to_string()))?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
        }

        self.drain_commands().await;
        if let Some(active) = self.registration.active() {
            active.settle().await;
        }
        Ok(())
    }

    /// Wait for every background command, then pick up any activation they
    /// caused.
    pub async fn drain_commands(&mut self) {
        for handle in std::mem::take(&mut self.commands) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "command task aborted");
            }
        }
        self.registration.refresh().await;
    }

    /// Handle one event.
    pub async fn handle(&mut self, event: HostEvent) -> HostReply {
        self.commands.retain(|handle| !handle.is_finished());
        self.registration.refresh().await;

        let result = match event {
            HostEvent::Install { generation } => self.install(generation).await,
            HostEvent::Activate => self.activate().await,
            HostEvent::Fetch { method, url, mode, headers } => self.fetch(&method, &url, mode.as_deref(), headers).await,
            HostEvent::Message { data } => self.message(&data).await,
            HostEvent::Sync { tag } => self.sync(tag).await,
            HostEvent::Status => Ok(self.status().await),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(code = e.code(), error = %e, "event failed");
            e.into()
        })
    }

    /// Register a controller for `generation`, or the configured one.
    pub async fn install(&mut self, generation: Option<String>) -> Result<HostReply, HostError> {
        let cache = self.cache.clone().ok_or(HostError::NotRegistered)?;
        let generation = generation.unwrap_or_else(|| self.generation.clone());
        let config = ControllerConfig::from_app_config(&self.config, generation.clone())?;
        let controller = Arc::new(CacheController::new(config, cache, Arc::clone(&self.fetcher)));

        let report = self.registration.register(controller).await?;
        self.generation = generation.clone();
        Ok(HostReply::Installed { generation, cached: report.cached, failed: report.failed })
    }

    async fn activate(&mut self) -> Result<HostReply, HostError> {
        if self.cache.is_none() {
            return Err(HostError::NotRegistered);
        }
        let report = self.registration.activate_waiting().await?;
        Ok(HostReply::Activated {
            generation: self.registration.active().map(|c| c.generation().to_string()),
            deleted: report.map(|r| r.deleted).unwrap_or_default(),
        })
    }

    async fn fetch(
        &mut self, method: &str, url: &str, mode: Option<&str>, headers: BTreeMap<String, String>,
    ) -> Result<HostReply, HostError> {
        let url = Url::parse(url).map_err(|e| HostError::InvalidEvent(format!("url {url}: {e}")))?;
        let mut request = Request::new(method, url);
        if let Some(mode) = mode {
            request = request.with_mode(RequestMode::parse(mode));
        }
        for (name, value) in &headers {
            request = request.with_header(name, value);
        }

        let decision = match self.registration.active() {
            Some(controller) => controller.handle_fetch(&request).await,
            None => FetchDecision::Passthrough(PassReason::NotActive),
        };

        match decision {
            FetchDecision::Respond(served) => Ok(HostReply::from_response(served.response, true, served.source.as_str())),
            FetchDecision::Passthrough(reason) => {
                tracing::debug!(url = %request.url, reason = ?reason, "passing through");
                let response = match self.fetcher.fetch(&request).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::debug!(url = %request.url, error = %e, "pass-through fetch failed");
                        Response::network_error()
                    }
                };
                Ok(HostReply::from_response(response, false, "network"))
            }
        }
    }

    async fn message(&mut self, data: &serde_json::Value) -> Result<HostReply, HostError> {
        let controller = self
            .registration
            .active()
            .or(self.registration.waiting())
            .cloned()
            .ok_or(HostError::NotRegistered)?;

        let command = Command::parse(data).map(|c| c.as_str());
        if let Some(handle) = controller.post_message(data) {
            self.commands.push(handle);
        }
        Ok(HostReply::Accepted { command })
    }

    async fn sync(&mut self, tag: String) -> Result<HostReply, HostError> {
        let controller = self.registration.active().cloned().ok_or(HostError::NotRegistered)?;
        let report = controller.handle_sync(&tag).await;
        Ok(HostReply::Synced { tag, cached: report.map(|r| r.cached.len()) })
    }

    async fn status(&self) -> HostReply {
        let active = self.registration.active();
        let state = match active {
            Some(controller) => Some(controller.state().await.as_str()),
            None => None,
        };
        HostReply::Status {
            scope: self.registration.scope().to_string(),
            active: active.map(|c| c.generation().to_string()),
            waiting: self.registration.waiting().map(|c| c.generation().to_string()),
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GENERATION, MockNetwork, app_config, page};
    use base64::Engine as _;
    use serde_json::{Value, json};

    async fn host_with(network: Arc<MockNetwork>) -> (Host, CacheDb) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let host = Host::new(app_config(), Some(cache.clone()), network, GENERATION.to_string()).unwrap();
        (host, cache)
    }

    async fn drive(host: &mut Host, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        host.run(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output).unwrap().lines().map(|line| serde_json::from_str(line).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_install_then_offline_fetch() {
        let network = MockNetwork::new();
        network.serve("/schedule", page("schedule"));
        let (mut host, _cache) = host_with(network.clone()).await;

        let replies = drive(&mut host, "{\"event\":\"install\"}\n").await;
        assert_eq!(replies[0]["reply"], "installed");
        assert_eq!(replies[0]["generation"], GENERATION);
        assert_eq!(replies[0]["cached"], json!(["/schedule"]));

        network.set_online(false);
        let replies = drive(
            &mut host,
            "{\"event\":\"fetch\",\"url\":\"https://app.test/schedule\",\"mode\":\"navigate\"}\n",
        )
        .await;
        assert_eq!(replies[0]["reply"], "response");
        assert_eq!(replies[0]["intercepted"], true);
        assert_eq!(replies[0]["source"], "cache");
        assert_eq!(replies[0]["body"], "schedule");
    }

    #[tokio::test]
    async fn test_fetch_without_registration_passes_through() {
        let network = MockNetwork::new();
        network.serve("/", page("home"));
        let mut host = Host::new(app_config(), None, network.clone(), GENERATION.to_string()).unwrap();

        let replies = drive(
            &mut host,
            "{\"event\":\"install\"}\n{\"event\":\"fetch\",\"url\":\"https://app.test/\"}\n",
        )
        .await;
        assert_eq!(replies[0]["reply"], "error");
        assert_eq!(replies[0]["code"], "NOT_REGISTERED");
        assert_eq!(replies[1]["intercepted"], false);
        assert_eq!(replies[1]["body"], "home");
    }

    #[tokio::test]
    async fn test_post_not_intercepted() {
        let network = MockNetwork::new();
        let (mut host, _cache) = host_with(network).await;

        let replies = drive(
            &mut host,
            "{\"event\":\"install\"}\n{\"event\":\"fetch\",\"method\":\"POST\",\"url\":\"https://app.test/api/x\"}\n",
        )
        .await;
        assert_eq!(replies[1]["intercepted"], false);
        assert_eq!(replies[1]["status"], 404);
    }

    #[tokio::test]
    async fn test_invalid_lines_get_error_replies() {
        let network = MockNetwork::new();
        let (mut host, _cache) = host_with(network).await;

        let replies = drive(&mut host, "not json\n\n{\"event\":\"teleport\"}\n").await;
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r["code"] == "INVALID_EVENT"));
    }

    #[tokio::test]
    async fn test_deploy_through_host() {
        let network = MockNetwork::new();
        let (mut host, cache) = host_with(network).await;

        let replies = drive(
            &mut host,
            concat!(
                "{\"event\":\"install\"}\n",
                "{\"event\":\"install\",\"generation\":\"icair-companion-v6-2025-11-05\"}\n",
                "{\"event\":\"status\"}\n",
            ),
        )
        .await;
        assert_eq!(replies[2]["active"], "icair-companion-v6-2025-11-05");
        assert_eq!(replies[2]["state"], "active");
        assert_eq!(cache.generation_names().await.unwrap(), vec!["icair-companion-v6-2025-11-05"]);
    }

    #[tokio::test]
    async fn test_clear_cache_message() {
        let network = MockNetwork::new();
        let (mut host, cache) = host_with(network).await;

        let replies = drive(
            &mut host,
            concat!(
                "{\"event\":\"install\"}\n",
                "{\"event\":\"message\",\"data\":{\"type\":\"CLEAR_CACHE\"}}\n",
                "{\"event\":\"message\",\"data\":{\"type\":\"CLEAR_CACHE\"}}\n",
                "{\"event\":\"message\",\"data\":{\"type\":\"DANCE\"}}\n",
            ),
        )
        .await;
        assert_eq!(replies[1]["command"], "CLEAR_CACHE");
        assert_eq!(replies[2]["command"], "CLEAR_CACHE");
        assert_eq!(replies[3]["command"], Value::Null);
        assert!(cache.generation_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_binary_body_round_trips() {
        let png = vec![0x89, 0x50, 0x4e, 0x47, 0xff, 0x00];
        let network = MockNetwork::new();
        network.serve("/img/a.png", Response::new(200, png.clone()));
        let (mut host, _cache) = host_with(network).await;

        let replies = drive(
            &mut host,
            "{\"event\":\"install\"}\n{\"event\":\"fetch\",\"url\":\"https://app.test/img/a.png\"}\n",
        )
        .await;
        assert_eq!(replies[1]["intercepted"], true);
        assert_eq!(replies[1]["encoding"], "base64");
        let body = BASE64.decode(replies[1]["body"].as_str().unwrap()).unwrap();
        assert_eq!(body, png);
    }

    #[tokio::test]
    async fn test_text_body_stays_readable() {
        let network = MockNetwork::new();
        network.serve("/", page("home"));
        let (mut host, _cache) = host_with(network).await;

        let replies = drive(&mut host, "{\"event\":\"install\"}\n{\"event\":\"fetch\",\"url\":\"https://app.test/\"}\n").await;
        assert_eq!(replies[1]["encoding"], "utf8");
        assert_eq!(replies[1]["body"], "home");
    }

    #[tokio::test]
    async fn test_message_reply_does_not_wait_for_command() {
        let network = MockNetwork::new();
        let (mut host, cache) = host_with(network.clone()).await;
        host.install(None).await.unwrap();
        serve_site_pages(&network);

        network.hold();
        let reply = host.handle(HostEvent::Message { data: json!({ "type": "CACHE_PAGES" }) }).await;
        assert_eq!(reply, HostReply::Accepted { command: Some("CACHE_PAGES") });
        assert_eq!(host.commands.len(), 1);

        network.release();
        host.drain_commands().await;
        assert_eq!(cache.entry_count(GENERATION).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_on_active_controller() {
        let network = MockNetwork::new();
        let (mut host, _cache) = host_with(network).await;
        host.install(None).await.unwrap();

        let reply = host.handle(HostEvent::Message { data: json!({ "type": "SKIP_WAITING" }) }).await;
        assert_eq!(reply, HostReply::Accepted { command: Some("SKIP_WAITING") });
        host.drain_commands().await;

        match host.handle(HostEvent::Status).await {
            HostReply::Status { active, state, .. } => {
                assert_eq!(active.as_deref(), Some(GENERATION));
                assert_eq!(state, Some("active"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    fn serve_site_pages(network: &MockNetwork) {
        for path in ["/", "/schedule", "/speakers", "/map", "/hotels", "/more", "/travel-guide", "/travel-checklist"] {
            network.serve(path, page(path));
        }
        network.serve("/manifest.json", Response::json(200, &json!({ "name": "ICAIR Companion" })));
    }

    #[tokio::test]
    async fn test_sync_event() {
        let network = MockNetwork::new();
        network.serve("/", page("home"));
        let (mut host, _cache) = host_with(network).await;

        let replies = drive(
            &mut host,
            "{\"event\":\"install\"}\n{\"event\":\"sync\",\"tag\":\"sync-pages\"}\n{\"event\":\"sync\",\"tag\":\"other\"}\n",
        )
        .await;
        assert_eq!(replies[1]["cached"], 1);
        assert_eq!(replies[2]["cached"], Value::Null);
    }
}
