//! companion-sw entry point.
//!
//! Runs the cache controller host over stdio: events in on stdin, replies
//! out on stdout. Logging goes to stderr to keep stdout clean.

use std::sync::Arc;

use anyhow::Result;
use companion_client::{FetchClient, FetchConfig};
use companion_core::{AppConfig, CacheDb};
use companion_worker::Host;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let generation = config.generation_name(chrono::Utc::now().date_naive())?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

    tracing::info!(origin = %config.origin, generation = %generation, "starting companion-sw on stdio");

    let cache = match CacheDb::open(&config.db_path).await {
        Ok(cache) => Some(cache),
        Err(e) => {
            tracing::error!(path = %config.db_path.display(), error = %e, "cache store unavailable, running in pass-through mode");
            None
        }
    };
    let registered = cache.is_some();

    let mut host = Host::new(config, cache, fetcher, generation)?;
    if registered {
        let reply = host.install(None).await;
        if let Err(e) = reply {
            tracing::error!(error = %e, "registration failed, running in pass-through mode");
        }
    }

    host.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    tracing::info!("input closed, shutting down");
    Ok(())
}
