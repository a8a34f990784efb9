use std::{sync::Arc, time::Duration};

use serde_json::Value;
use thiserror::Error;

use super::{RegistryBrowser, RegistryPage};

/// How much of an unparseable body is kept for diagnostics.
pub const SNIPPET_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no browser page available: {0}")]
    PageUnavailable(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{url} did not render valid JSON")]
    InvalidResponseFormat { url: String, snippet: String },
}

impl FetchError {
    /// Network-level failure, as opposed to a page that rendered something unexpected.
    pub fn is_navigation(&self) -> bool {
        matches!(self, FetchError::Navigation { .. })
    }
}

/// Turns a registry page into JSON by rendering it and reading the body text.
#[derive(Clone)]
pub struct PageFetcher {
    browser: Arc<dyn RegistryBrowser>,
    navigation_timeout: Duration,
}

impl PageFetcher {
    pub fn new(browser: Arc<dyn RegistryBrowser>, navigation_timeout: Duration) -> Self {
        PageFetcher {
            browser,
            navigation_timeout,
        }
    }

    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let page = self.browser.acquire_page().await?;
        let mut lease = PageLease::new(self.browser.as_ref(), page);

        let result = read_json(lease.page_mut(), url, self.navigation_timeout).await;
        lease.release().await;

        if let Err(FetchError::Navigation { url, reason }) = &result {
            log::error!("Browser failed to load {}: {}", url, reason);
        }

        result
    }
}

async fn read_json(
    page: &mut dyn RegistryPage,
    url: &str,
    timeout: Duration,
) -> Result<Value, FetchError> {
    page.navigate(url, timeout).await?;
    let body = page.body_text().await?;
    parse_body(url, &body)
}

fn parse_body(url: &str, body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body).map_err(|e| {
        let snippet: String = body.chars().take(SNIPPET_LEN).collect();
        log::error!("Error parsing JSON from {}: {}", url, e);
        log::error!("Content received (first {} chars): {}", SNIPPET_LEN, snippet);

        FetchError::InvalidResponseFormat {
            url: url.to_string(),
            snippet,
        }
    })
}

/// Holds a page for the duration of one fetch.
///
/// `release` hands the page back to the browser. If the lease is dropped
/// first (the lookup future was cancelled) the page is closed on a
/// background task instead.
struct PageLease<'a> {
    browser: &'a dyn RegistryBrowser,
    page: Option<Box<dyn RegistryPage>>,
}

impl<'a> PageLease<'a> {
    fn new(browser: &'a dyn RegistryBrowser, page: Box<dyn RegistryPage>) -> Self {
        PageLease {
            browser,
            page: Some(page),
        }
    }

    fn page_mut(&mut self) -> &mut dyn RegistryPage {
        self.page
            .as_deref_mut()
            .expect("PageLease: page already released")
    }

    async fn release(mut self) {
        if let Some(page) = self.page.take() {
            self.browser.release_page(page).await;
        }
    }
}

impl Drop for PageLease<'_> {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        log::warn!("Failed to close abandoned browser page: {:?}", e);
                    }
                });
            }
            Err(_) => log::warn!("Browser page dropped outside the runtime and left open"),
        }
    }
}
