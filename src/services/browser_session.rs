use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams},
    error::CdpError,
    Page,
};
use futures::StreamExt;
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};

use crate::configuration::BrowserSettings;

use super::FetchError;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid browser configuration: {0}")]
    Config(String),

    #[error("failed to launch browser: {0}")]
    Launch(#[from] CdpError),
}

/// A single isolated tab leased for one registry lookup.
#[async_trait]
pub trait RegistryPage: Send + Sync {
    /// Navigates and waits until the DOM is ready, giving up after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError>;
    /// Visible text of the rendered body.
    async fn body_text(&self) -> Result<String, FetchError>;
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RegistryBrowser: Send + Sync {
    async fn acquire_page(&self) -> Result<Box<dyn RegistryPage>, FetchError>;

    async fn release_page(&self, page: Box<dyn RegistryPage>) {
        if let Err(e) = page.close().await {
            log::warn!("Failed to close browser page: {:?}", e);
        }
    }

    fn open_pages(&self) -> usize;
}

/// Owns the one headless Chromium process shared by every lookup.
pub struct BrowserSession {
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    open_pages: Arc<AtomicUsize>,
}

impl BrowserSession {
    pub async fn start(settings: &BrowserSettings) -> Result<Self, LaunchError> {
        let config = browser_config(settings)?;
        let (browser, mut handler) = Browser::launch(config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser handler event error: {:?}", e);
                }
            }
        });

        log::info!("Headless browser started");

        Ok(BrowserSession {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler)),
            open_pages: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Closes the browser process. Later calls are no-ops.
    pub async fn stop(&self) {
        let Some(mut browser) = self.browser.write().await.take() else {
            return;
        };

        if let Err(e) = browser.close().await {
            log::error!("Failed to close browser: {:?}", e);
        }
        if let Err(e) = browser.wait().await {
            log::error!("Failed waiting for the browser process to exit: {:?}", e);
        }
        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }

        log::info!("Headless browser closed");
    }
}

#[async_trait]
impl RegistryBrowser for BrowserSession {
    async fn acquire_page(&self) -> Result<Box<dyn RegistryPage>, FetchError> {
        let browser = self.browser.read().await;
        let browser = browser
            .as_ref()
            .ok_or_else(|| FetchError::PageUnavailable("browser session is stopped".to_string()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::PageUnavailable(e.to_string()))?;
        self.open_pages.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumPage {
            page,
            current_url: "about:blank".to_string(),
            open_pages: Arc::clone(&self.open_pages),
        }))
    }

    fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::Relaxed)
    }
}

struct ChromiumPage {
    page: Page,
    current_url: String,
    open_pages: Arc<AtomicUsize>,
}

#[async_trait]
impl RegistryPage for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError> {
        self.current_url = url.to_string();
        let navigation_error = |reason: String| FetchError::Navigation {
            url: url.to_string(),
            reason,
        };

        let navigation = async {
            let mut dom_ready = self
                .page
                .event_listener::<EventDomContentEventFired>()
                .await
                .map_err(|e| navigation_error(e.to_string()))?;

            let response = self
                .page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| navigation_error(e.to_string()))?;
            if let Some(error_text) = response.result.error_text.clone() {
                return Err(navigation_error(error_text));
            }

            dom_ready
                .next()
                .await
                .ok_or_else(|| navigation_error("page closed before the DOM was ready".to_string()))?;

            Ok::<(), FetchError>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(navigation_error(format!(
                "timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn body_text(&self) -> Result<String, FetchError> {
        let navigation_error = |reason: String| FetchError::Navigation {
            url: self.current_url.clone(),
            reason,
        };

        self.page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| navigation_error(e.to_string()))?
            .into_value::<String>()
            .map_err(|e| navigation_error(e.to_string()))
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        let ChromiumPage {
            page, open_pages, ..
        } = *self;
        close_counted(&open_pages, page.close()).await
    }
}

/// A page only stops counting as open once the browser confirms it closed.
async fn close_counted<E>(
    open_pages: &AtomicUsize,
    close: impl Future<Output = Result<(), E>>,
) -> anyhow::Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    close.await?;
    open_pages.fetch_sub(1, Ordering::Relaxed);
    Ok(())
}

fn browser_config(settings: &BrowserSettings) -> Result<BrowserConfig, LaunchError> {
    let mut builder = BrowserConfig::builder().args(settings.args.clone());

    if !settings.headless {
        builder = builder.with_head();
    }
    if !settings.sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(executable) = &settings.executable {
        builder = builder.chrome_executable(executable);
    }

    builder.build().map_err(LaunchError::Config)
}
