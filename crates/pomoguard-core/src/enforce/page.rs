use url::Url;

/// Browser-internal schemes that enforcement never redirects away from.
const SYSTEM_PREFIXES: [&str; 3] = ["chrome://", "edge://", "devtools://"];

/// How enforcement treats a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Break,
    /// Browser internals or the extension's own pages.
    System,
    Web,
}

/// Location of the extension's break page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakPage {
    origin: String,
    url: String,
}

impl BreakPage {
    /// `origin` is the extension base URL, `path` the page inside it.
    pub fn new(origin: &str, path: &str) -> Self {
        let origin = if origin.ends_with('/') {
            origin.to_string()
        } else {
            format!("{origin}/")
        };
        let url = format!("{origin}{}", path.trim_start_matches('/'));
        Self { origin, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn is_break_page(&self, url: Option<&str>) -> bool {
        url.is_some_and(|u| u.starts_with(&self.url))
    }

    /// Missing URLs are not system pages.
    pub fn is_system_page(&self, url: Option<&str>) -> bool {
        url.is_some_and(|u| {
            SYSTEM_PREFIXES.iter().any(|p| u.starts_with(p)) || u.starts_with(&self.origin)
        })
    }

    /// Break and system pages are both exempt; everything else is a web page.
    pub fn classify(&self, url: Option<&str>) -> PageKind {
        if self.is_break_page(url) {
            PageKind::Break
        } else if self.is_system_page(url) {
            PageKind::System
        } else {
            PageKind::Web
        }
    }

    pub fn is_exempt(&self, url: Option<&str>) -> bool {
        self.classify(url) != PageKind::Web
    }
}

/// Whether the overlay script can be injected into a page.
pub fn is_http_page(url: Option<&str>) -> bool {
    url.and_then(|u| Url::parse(u).ok())
        .is_some_and(|u| matches!(u.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> BreakPage {
        BreakPage::new("chrome-extension://abc", "/tabs/break.html")
    }

    #[test]
    fn joins_origin_and_path() {
        assert_eq!(page().url(), "chrome-extension://abc/tabs/break.html");
        assert_eq!(page().origin(), "chrome-extension://abc/");
    }

    #[test]
    fn classifies_urls() {
        let page = page();
        assert_eq!(
            page.classify(Some("chrome-extension://abc/tabs/break.html?from=1")),
            PageKind::Break
        );
        assert_eq!(page.classify(Some("chrome://settings")), PageKind::System);
        assert_eq!(page.classify(Some("devtools://devtools/x")), PageKind::System);
        assert_eq!(
            page.classify(Some("chrome-extension://abc/popup.html")),
            PageKind::System
        );
        assert_eq!(
            page.classify(Some("chrome-extension://other/page.html")),
            PageKind::Web
        );
        assert_eq!(page.classify(Some("https://example.com")), PageKind::Web);
        assert_eq!(page.classify(None), PageKind::Web);
    }

    #[test]
    fn http_pages_only() {
        assert!(is_http_page(Some("http://example.com/a")));
        assert!(is_http_page(Some("https://example.com")));
        assert!(!is_http_page(Some("chrome://newtab")));
        assert!(!is_http_page(Some("file:///tmp/x")));
        assert!(!is_http_page(None));
    }
}
