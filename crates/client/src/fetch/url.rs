//! URL helpers for routing and cache fallback lookups.
//!
//! Cache keys are exact URL strings, so the navigation fallback chain has to
//! spell out the variants it tries: without the query, with and without the
//! trailing slash.

use url::Url;

use companion_core::Error;

/// Whether two URLs share scheme, host and port.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Resolve a route path (or absolute URL) against the origin.
pub fn resolve(origin: &Url, path: &str) -> Result<Url, Error> {
    origin.join(path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
}

/// The URL with its query string and fragment removed.
///
/// Returns `None` when there was no query to strip.
pub fn strip_query(url: &Url) -> Option<Url> {
    url.query()?;
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    Some(stripped)
}

/// The URL with a trailing slash appended to, or removed from, its path.
///
/// The root path is never toggled: `/` has no slash-less form.
pub fn toggle_trailing_slash(url: &Url) -> Option<Url> {
    let path = url.path();
    if path == "/" {
        return None;
    }

    let toggled = match path.strip_suffix('/') {
        Some(trimmed) => trimmed.to_string(),
        None => format!("{path}/"),
    };

    let mut out = url.clone();
    out.set_path(&toggled);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_same_origin() {
        assert!(is_same_origin(&url("https://app.test/a"), &url("https://app.test/b?c")));
    }

    #[test]
    fn test_cross_origin_host() {
        assert!(!is_same_origin(&url("https://app.test/"), &url("https://cdn.test/")));
    }

    #[test]
    fn test_cross_origin_scheme_and_port() {
        assert!(!is_same_origin(&url("https://app.test/"), &url("http://app.test/")));
        assert!(!is_same_origin(&url("https://app.test/"), &url("https://app.test:8443/")));
    }

    #[test]
    fn test_resolve_path() {
        let origin = url("https://app.test");
        assert_eq!(resolve(&origin, "/schedule").unwrap().as_str(), "https://app.test/schedule");
        assert_eq!(resolve(&origin, "/").unwrap().as_str(), "https://app.test/");
    }

    #[test]
    fn test_strip_query() {
        let stripped = strip_query(&url("https://app.test/speakers?id=7")).unwrap();
        assert_eq!(stripped.as_str(), "https://app.test/speakers");
    }

    #[test]
    fn test_strip_query_without_query() {
        assert!(strip_query(&url("https://app.test/speakers")).is_none());
    }

    #[test]
    fn test_toggle_adds_slash() {
        let toggled = toggle_trailing_slash(&url("https://app.test/map")).unwrap();
        assert_eq!(toggled.as_str(), "https://app.test/map/");
    }

    #[test]
    fn test_toggle_removes_slash() {
        let toggled = toggle_trailing_slash(&url("https://app.test/map/")).unwrap();
        assert_eq!(toggled.as_str(), "https://app.test/map");
    }

    #[test]
    fn test_toggle_keeps_query() {
        let toggled = toggle_trailing_slash(&url("https://app.test/map?day=2")).unwrap();
        assert_eq!(toggled.as_str(), "https://app.test/map/?day=2");
    }

    #[test]
    fn test_toggle_root_is_none() {
        assert!(toggle_trailing_slash(&url("https://app.test/")).is_none());
    }
}
