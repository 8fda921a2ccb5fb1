use headless_chrome::{LaunchOptions, Tab};
use anyhow;
use url::{Url, ParseError};
use thiserror::Error;
use tracing::{debug, info};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("ChromeError: {0}")]
    ChromeError(#[from] anyhow::Error),
    #[error("UrlError, can't parse given URL: {0}")]
    UrlError(#[from] ParseError),
    #[error("UnsupportedScheme, only http and https pages are rendered: {0}")]
    UnsupportedScheme(String),
    #[error("LaunchOptionsError: {0}")]
    LaunchOptionsError(String),
}
pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Chrome/Chromium binary; auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            sandbox: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserConfig {

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(self.sandbox)
            .path(self.chrome_path.clone())
            .idle_browser_timeout(self.timeout)
            .args(vec![OsStr::new("--disable-dev-shm-usage")])
            .build()
            .map_err(|e| BrowserError::LaunchOptionsError(e.to_string()))
    }
}

/// Produces the rendered DOM of a page.
pub trait PageRenderer {
    fn render(&self, url: &str) -> Result<String>;
}

/// One browser process per `render` call. The process is owned by a local
/// value, so it is killed when `render` returns, whether or not navigation
/// succeeded.
pub struct ChromeRenderer {
    config: BrowserConfig,
}

impl ChromeRenderer {

    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn url_to_tab(&self, browser: &headless_chrome::Browser, url: &str) -> Result<Arc<Tab>> {

        let tab = browser.new_tab()?;
        tab.set_default_timeout(self.config.timeout);

        debug!(url, "navigating");
        tab.navigate_to(url)?.wait_until_navigated()?;

        Ok(tab)
    }
}

impl PageRenderer for ChromeRenderer {

    fn render(&self, url: &str) -> Result<String> {

        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BrowserError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let options = self.config.launch_options()?;
        debug!(path = ?self.config.chrome_path, headless = self.config.headless, "launching browser");
        let browser = headless_chrome::Browser::new(options)?;

        let tab = self.url_to_tab(&browser, url)?;
        let html = tab.get_content()?;

        info!(url, bytes = html.len(), "rendered page");

        Ok(html)
    }
}
