//! Browser driver capability.
//!
//! The pipeline only talks to these traits. `chromium` backs them with a real
//! Chromium over CDP; tests use the in-memory `fake` driver.

pub mod chromium;
#[cfg(test)]
pub mod fake;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

pub type DriverResult<T> = Result<T, DriverError>;

/// How a browser session should be started.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub user_agent: String,
    pub window: (u32, u32),
    /// Accept-Language / UI locale, e.g. `pl-PL`.
    pub locale: Option<String>,
    pub chrome_path: Option<std::path::PathBuf>,
    pub launch_timeout: Duration,
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> DriverResult<Box<dyn BrowserSession>>;
}

/// A running browser. Must be closed explicitly.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> DriverResult<Box<dyn Page>>;
    async fn close(self: Box<Self>) -> DriverResult<()>;
}

/// One tab.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&mut self, url: &str, timeout: Duration) -> DriverResult<()>;
    async fn current_url(&self) -> DriverResult<String>;
    /// Every element matching `selector` in the live document.
    async fn find_all(&self, selector: &str) -> DriverResult<Vec<Box<dyn Element>>>;
    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()>;
    async fn click(&mut self, selector: &str) -> DriverResult<()>;
    /// Whether the rendered page text contains `needle`.
    async fn contains_text(&self, needle: &str) -> DriverResult<bool>;

    async fn find_first(&self, selector: &str) -> DriverResult<Option<Box<dyn Element>>> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }
}

/// Handle to an element. Invalid once the page navigates.
#[async_trait]
pub trait Element: Send + Sync {
    async fn attribute(&self, name: &str) -> DriverResult<Option<String>>;
    async fn text(&self) -> DriverResult<String>;
    async fn inner_html(&self) -> DriverResult<String>;
    async fn click(&self) -> DriverResult<()>;
    async fn find(&self, selector: &str) -> DriverResult<Option<Box<dyn Element>>>;
}
