//! Offline fallback page.
//!
//! A self-contained HTML document served when a navigation fails and nothing
//! in the cache can stand in for it. It is rendered per request and never
//! stored.

use companion_core::Response;

/// Offline page builder over a fixed list of page routes.
#[derive(Debug, Clone)]
pub struct OfflinePage {
    links: Vec<(String, String)>,
}

impl OfflinePage {
    pub fn new(pages: &[String]) -> Self {
        Self { links: pages.iter().map(|path| (label_for(path), path.clone())).collect() }
    }

    /// Render the document.
    pub fn render(&self) -> String {
        let items: String = self
            .links
            .iter()
            .map(|(label, href)| format!("        <li><a href=\"{}\">{}</a></li>\n", escape(href), escape(label)))
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Offline</title>
    <style>
        body {{ font-family: system-ui, sans-serif; margin: 0; padding: 2rem 1.5rem; color: #1f2937; background: #f9fafb; }}
        h1 {{ font-size: 1.5rem; margin: 0 0 0.5rem; }}
        button {{ margin: 1rem 0; padding: 0.6rem 1.2rem; border: 0; border-radius: 0.5rem; background: #2563eb; color: #fff; font-size: 1rem; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ margin: 0.4rem 0; }}
        a {{ color: #2563eb; }}
    </style>
</head>
<body>
    <h1>You're offline</h1>
    <p>This page isn't available without a connection. Pages you've already visited still work.</p>
    <button type="button" onclick="location.reload()">Try again</button>
    <ul>
{items}    </ul>
</body>
</html>
"#
        )
    }

    /// The page as a `200 text/html` response that must not be cached.
    pub fn response(&self) -> Response {
        Response::html(200, self.render()).with_header("cache-control", "no-cache")
    }
}

/// Human label for a route path: `/travel-guide` -> `Travel Guide`, `/` -> `Home`.
fn label_for(path: &str) -> String {
    let segment = path.trim_matches('/').rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        return "Home".to_string();
    }

    segment
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> Vec<String> {
        ["/", "/schedule", "/travel-guide"].into_iter().map(String::from).collect()
    }

    #[test]
    fn test_labels() {
        assert_eq!(label_for("/"), "Home");
        assert_eq!(label_for("/schedule"), "Schedule");
        assert_eq!(label_for("/travel-checklist"), "Travel Checklist");
        assert_eq!(label_for("/more/"), "More");
    }

    #[test]
    fn test_render_lists_every_page() {
        let html = OfflinePage::new(&pages()).render();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<a href="/">Home</a>"#));
        assert!(html.contains(r#"<a href="/schedule">Schedule</a>"#));
        assert!(html.contains(r#"<a href="/travel-guide">Travel Guide</a>"#));
        assert!(html.contains("location.reload()"));
    }

    #[test]
    fn test_render_is_self_contained() {
        let html = OfflinePage::new(&pages()).render();
        assert!(!html.contains("<script src"));
        assert!(!html.contains("<link"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_response_headers() {
        let response = OfflinePage::new(&pages()).response();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(response.header("cache-control"), Some("no-cache"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"/a?b=<c>&d="e""#), "/a?b=&lt;c&gt;&amp;d=&quot;e&quot;");
    }
}
