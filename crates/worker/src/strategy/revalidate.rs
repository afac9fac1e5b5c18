//! Stale-while-revalidate for build assets.

use companion_core::{Request, Response};

use super::{Engine, Served};

/// Stand-in for a code-split chunk the server no longer has.
const PLACEHOLDER_MODULE: &str = "// chunk unavailable; served as an empty module\nexport {};\n";

pub(super) async fn serve(engine: &Engine, request: &Request) -> Served {
    if let Some(hit) = engine.lookup(request).await {
        engine.spawn_refresh(request.clone());
        return Served::cache(hit);
    }

    let chunk = engine.routes.is_build_chunk(&request.url);

    match engine.network(request).await {
        Ok(response) if response.is_ok() => {
            engine.store(request, &response).await;
            Served::network(response)
        }
        Ok(response) if chunk && response.status == 404 => {
            tracing::warn!(url = %request.url, "build chunk gone from server, serving placeholder module");
            Served::synthesized(placeholder_module())
        }
        Ok(response) => Served::network(response),
        Err(e) if chunk => {
            tracing::warn!(url = %request.url, error = %e, "build chunk unreachable, serving placeholder module");
            Served::synthesized(placeholder_module())
        }
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "build asset unavailable");
            Served::network(Response::network_error())
        }
    }
}

fn placeholder_module() -> Response {
    Response::new(200, PLACEHOLDER_MODULE)
        .with_header("content-type", "application/javascript; charset=utf-8")
        .with_header("cache-control", "no-store")
}
