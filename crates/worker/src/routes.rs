//! Route classification.
//!
//! Every intercepted request is sorted into exactly one `RouteKind` by the
//! shape of its URL. The first matching rule wins, in this order: build
//! asset, static media, navigation, API, other.

use std::fmt;

use companion_core::{AppConfig, Request, RequestMode};
use url::Url;

/// Extensions that always mark build output, wherever they live.
const BUILD_EXTENSIONS: &[&str] = &["js", "css", "json"];

/// Resource kind of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    BuildAsset,
    StaticMedia,
    Navigation,
    Api,
    Other,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::BuildAsset => "build-asset",
            RouteKind::StaticMedia => "static-media",
            RouteKind::Navigation => "navigation",
            RouteKind::Api => "api",
            RouteKind::Other => "other",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL-shape rules for classification.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    build_marker: String,
    chunk_marker: String,
    api_prefix: String,
    media_extensions: Vec<String>,
}

impl RouteClassifier {
    pub fn new(build_marker: &str, chunk_marker: &str, api_prefix: &str, media_extensions: &[String]) -> Self {
        Self {
            build_marker: build_marker.to_string(),
            chunk_marker: chunk_marker.to_string(),
            api_prefix: api_prefix.trim_end_matches('/').to_string(),
            media_extensions: media_extensions.iter().map(|ext| ext.trim_start_matches('.').to_lowercase()).collect(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(&config.build_marker, &config.chunk_marker, &config.api_prefix, &config.media_extensions)
    }

    /// Classify a request. First match wins.
    pub fn classify(&self, request: &Request) -> RouteKind {
        let path = request.url.path();
        let extension = extension(path);

        if path.contains(&self.build_marker) || extension.as_deref().is_some_and(|ext| BUILD_EXTENSIONS.contains(&ext)) {
            return RouteKind::BuildAsset;
        }

        if extension.is_some_and(|ext| self.media_extensions.contains(&ext)) {
            return RouteKind::StaticMedia;
        }

        if request.mode == RequestMode::Navigate || request.accepts_html() {
            return RouteKind::Navigation;
        }

        if self.is_api(path) {
            return RouteKind::Api;
        }

        RouteKind::Other
    }

    /// The API prefix matches whole segments: `/api` and `/api/x`, not `/apiary`.
    fn is_api(&self, path: &str) -> bool {
        path.strip_prefix(self.api_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Whether the URL points at a code-split chunk of the build output.
    pub fn is_build_chunk(&self, url: &Url) -> bool {
        url.path().contains(&self.chunk_marker)
    }
}

/// Lowercased extension of the last path segment, if it has one.
fn extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
