//! Network-first navigation with an ordered cache fallback chain.

use companion_client::fetch::{strip_query, toggle_trailing_slash};
use companion_core::Request;
use url::Url;

use super::{Engine, Served};

pub(super) async fn serve(engine: &Engine, request: &Request) -> Served {
    let refused = match engine.network(request).await {
        Ok(response) if response.is_ok() => {
            engine.store(request, &response).await;
            return Served::network(response);
        }
        Ok(response) => {
            tracing::debug!(url = %request.url, status = response.status, "navigation refused, trying cache");
            Some(response)
        }
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "navigation failed, trying cache");
            None
        }
    };

    if let Some(hit) = engine.lookup(request).await {
        return Served::cache(hit);
    }

    for candidate in fallback_candidates(&request.url, &engine.home).into_iter().skip(1) {
        if let Some(hit) = engine.lookup(&Request::get(candidate.clone())).await {
            tracing::debug!(url = %request.url, matched = %candidate, "navigation served from fallback entry");
            return Served::cache(hit);
        }
    }

    // The server answered, so this is not an offline situation.
    if let Some(response) = refused {
        return Served::network(response);
    }

    tracing::info!(url = %request.url, "no cached page, serving offline page");
    Served::synthesized(engine.offline.response())
}

/// Cache keys tried for a failed navigation, in order, without repeats:
/// the exact URL, the URL without its query, the query-less URL with its
/// trailing slash toggled, then the home page.
pub(crate) fn fallback_candidates(url: &Url, home: &Url) -> Vec<Url> {
    let base = strip_query(url);
    let toggled = toggle_trailing_slash(base.as_ref().unwrap_or(url));

    let mut candidates: Vec<Url> = Vec::with_capacity(4);
    for candidate in [Some(url.clone()), base, toggled, Some(home.clone())].into_iter().flatten() {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}
