//! Cache-first strategies: static media and the unclassified remainder.

use companion_core::{Request, Response};

use super::{Engine, Served};

/// Static media: cached copy first (refreshed behind the scenes), never fails.
pub(super) async fn serve_media(engine: &Engine, request: &Request) -> Served {
    if let Some(hit) = engine.lookup(request).await {
        engine.spawn_refresh(request.clone());
        return Served::cache(hit);
    }

    match engine.network(request).await {
        Ok(response) => {
            engine.store(request, &response).await;
            Served::network(response)
        }
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "media unavailable, answering 404");
            Served::synthesized(Response::empty(404))
        }
    }
}

/// Everything else: cached copy if present, otherwise whatever the network says.
pub(super) async fn serve_fill(engine: &Engine, request: &Request) -> Served {
    if let Some(hit) = engine.lookup(request).await {
        return Served::cache(hit);
    }

    match engine.network(request).await {
        Ok(response) => {
            engine.store(request, &response).await;
            Served::network(response)
        }
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "uncached request failed");
            Served::network(Response::network_error())
        }
    }
}
