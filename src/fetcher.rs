use crate::types::{FetchConfig, FetchedPage, MonitorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

/// Seam between the orchestrator and the network, so tests can substitute
/// scripted pages for live HTTP.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage>;
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    /// GET the page and derive its visible text. No retries: the caller
    /// records failures as error checks.
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Fetch {
                url: url.to_string(),
                message: format!(
                    "HTTP {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let html = response.text().await.map_err(|e| MonitorError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let text = html_to_text(&html);
        info!("Fetched {} ({} bytes)", url, html.len());

        Ok(FetchedPage { html, text })
    }
}

/// Derive visible plain text from markup: script/style/noscript subtrees
/// are dropped and all whitespace runs collapse to single spaces.
/// Idempotent over text it has already produced.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector");

    let mut raw = String::new();
    if let Some(body) = document.select(&body_selector).next() {
        visible_text(body, &mut raw);
    }

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn visible_text(element: ElementRef, out: &mut String) {
    if matches!(element.value().name(), "script" | "style" | "noscript") {
        return;
    }

    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            visible_text(el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_style_and_noscript() {
        let html = r#"<html><head><style>body { color: red; }</style></head>
            <body>
              <script>var tracking = "beacon";</script>
              <noscript>Enable JavaScript</noscript>
              <h1>Pricing</h1>
              <p>Starter plan: $10/mo</p>
            </body></html>"#;

        let text = html_to_text(html);
        assert_eq!(text, "Pricing Starter plan: $10/mo");
    }

    #[test]
    fn collapses_whitespace_runs() {
        let html = "<body><p>A   lot\n\n\tof\r\n   space</p></body>";
        assert_eq!(html_to_text(html), "A lot of space");
    }

    #[test]
    fn normalization_is_idempotent() {
        let html = "<body><div>one  two</div><div>three</div></body>";
        let once = html_to_text(html);
        let twice = html_to_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_document_yields_empty_text() {
        assert_eq!(html_to_text(""), "");
    }
}
