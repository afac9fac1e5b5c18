//! Network-first API calls with the cache as read-through.

use companion_core::{Request, Response};
use serde_json::json;

use super::{Engine, Served};

pub(crate) const OFFLINE_API_MESSAGE: &str = "Offline - data not available";

pub(super) async fn serve(engine: &Engine, request: &Request) -> Served {
    let refused = match engine.network(request).await {
        Ok(response) if response.is_ok() => {
            engine.store(request, &response).await;
            return Served::network(response);
        }
        Ok(response) => Some(response),
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "api call failed, trying cache");
            None
        }
    };

    if let Some(hit) = engine.lookup(request).await {
        return Served::cache(hit);
    }

    match refused {
        Some(response) => Served::network(response),
        None => Served::synthesized(Response::json(503, &json!({ "error": OFFLINE_API_MESSAGE }))),
    }
}
