//! Page snapshots and the providers that capture them.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::hints::{extract_hints, ProductHints};

const USER_AGENT: &str = "cartlens/0.1 (+product excerpt tool)";
const MAX_REDIRECTS: usize = 8;

/// Immutable capture of one product page.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// Page URL; also the cart identity of the page.
    pub url: String,
    /// Document title.
    pub title: String,
    /// Serialized document markup.
    pub raw_markup: String,
    /// When the capture happened.
    pub captured_at: SystemTime,
    hints: OnceLock<ProductHints>,
}

impl PageSnapshot {
    /// Captures a snapshot from markup already in hand.
    ///
    /// A blank `title` is replaced by the document's `<title>` text.
    pub fn from_markup(url: impl Into<String>, title: Option<&str>, raw_markup: String) -> Self {
        let title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .or_else(|| markup_excerpt::document_title(&raw_markup))
            .unwrap_or_default();
        Self {
            url: url.into(),
            title,
            raw_markup,
            captured_at: SystemTime::now(),
            hints: OnceLock::new(),
        }
    }

    /// Display hints scraped from the markup. Not authoritative.
    ///
    /// The document is parsed for hints on first use only.
    pub fn hints(&self) -> &ProductHints {
        self.hints
            .get_or_init(|| extract_hints(&self.raw_markup, &self.title))
    }
}

/// Errors raised while capturing a page.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The page URL could not be parsed or uses an unsupported scheme.
    #[error("invalid page url '{0}'")]
    InvalidUrl(String),
    /// The HTTP request failed.
    #[error("failed to fetch page: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("page request returned status {0}")]
    Status(u16),
}

/// Source of page snapshots (browser content script, saved file, HTTP fetch).
pub trait SnapshotProvider {
    /// Captures the current page.
    fn snapshot(&self) -> Result<PageSnapshot, SnapshotError>;
}

/// Provider over markup that was already read from disk or stdin.
#[derive(Debug, Clone)]
pub struct MarkupSnapshot {
    url: String,
    title: Option<String>,
    markup: String,
}

impl MarkupSnapshot {
    /// Wraps `markup` served from `url`.
    pub fn new(url: impl Into<String>, title: Option<String>, markup: String) -> Self {
        Self {
            url: url.into(),
            title,
            markup,
        }
    }
}

impl SnapshotProvider for MarkupSnapshot {
    fn snapshot(&self) -> Result<PageSnapshot, SnapshotError> {
        Ok(PageSnapshot::from_markup(
            self.url.clone(),
            self.title.as_deref(),
            self.markup.clone(),
        ))
    }
}

/// Provider that downloads the page over HTTP.
pub struct HttpSnapshot {
    client: Client,
    url: Url,
    title: Option<String>,
}

impl HttpSnapshot {
    /// Builds a fetcher for `url`.
    pub fn new(url: &str, title: Option<String>, timeout: Duration) -> Result<Self, SnapshotError> {
        let url = Url::parse(url).map_err(|_| SnapshotError::InvalidUrl(url.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SnapshotError::InvalidUrl(url.to_string()));
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url, title })
    }
}

impl SnapshotProvider for HttpSnapshot {
    fn snapshot(&self) -> Result<PageSnapshot, SnapshotError> {
        info!(url = %self.url, "fetching page");
        let resp = self.client.get(self.url.clone()).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SnapshotError::Status(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let final_url = resp.url().to_string();
        let markup = resp.text()?;
        debug!(%content_type, bytes = markup.len(), "page fetched");
        Ok(PageSnapshot::from_markup(
            final_url,
            self.title.as_deref(),
            markup,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_falls_back_to_document_title() {
        let html = "<html><head><title> Grill X | Tienda </title></head><body></body></html>";
        let snapshot = PageSnapshot::from_markup("https://shop.test/grill-x", None, html.into());
        assert_eq!(snapshot.title, "Grill X | Tienda");

        let snapshot =
            PageSnapshot::from_markup("https://shop.test/grill-x", Some("  "), html.into());
        assert_eq!(snapshot.title, "Grill X | Tienda");

        let snapshot =
            PageSnapshot::from_markup("https://shop.test/grill-x", Some("Propio"), html.into());
        assert_eq!(snapshot.title, "Propio");
    }

    #[test]
    fn hints_are_scraped_once_on_demand() {
        let html = r#"<html><head><title>Grill X | Tienda</title></head>
            <body><h1>Parrilla Grill X</h1><span class="price">S/ 199.00</span></body></html>"#;
        let snapshot = PageSnapshot::from_markup("https://shop.test/grill-x", None, html.into());
        assert!(snapshot.hints.get().is_none());

        let first = snapshot.hints();
        assert_eq!(first, &extract_hints(html, "Grill X | Tienda"));
        assert!(std::ptr::eq(first, snapshot.hints()));
    }

    #[test]
    fn markup_provider_never_fails() {
        let provider = MarkupSnapshot::new("file:///tmp/page.html", None, String::new());
        let snapshot = provider.snapshot().expect("snapshot");
        assert_eq!(snapshot.title, "");
        assert_eq!(snapshot.url, "file:///tmp/page.html");
    }

    #[test]
    fn http_provider_rejects_unsupported_schemes() {
        let err = HttpSnapshot::new("ftp://shop.test/x", None, Duration::from_secs(5))
            .err()
            .expect("rejected");
        assert!(matches!(err, SnapshotError::InvalidUrl(_)));
        assert!(HttpSnapshot::new("not a url", None, Duration::from_secs(5)).is_err());
    }
}
