//! Chromium driver over CDP (chromiumoxide).

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element as CdpElement;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BrowserLauncher, BrowserSession, DriverResult, Element, LaunchOptions, Page};
use crate::error::DriverError;

fn cdp(err: CdpError) -> DriverError {
    match err {
        CdpError::NotFound => DriverError::NotFound("element".into()),
        CdpError::ChannelSendError(_) | CdpError::NoResponse => DriverError::SessionClosed,
        other => {
            let msg = other.to_string();
            // Chrome reports detached DOM nodes as unknown node ids.
            if msg.contains("node with given id") || msg.contains("Node is detached") {
                DriverError::StaleElement
            } else {
                DriverError::Protocol(msg)
            }
        }
    }
}

/// Launches a local Chromium.
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> DriverResult<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.window.0, options.window.1)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", options.user_agent));
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(locale) = &options.locale {
            builder = builder.arg(format!("--lang={}", locale));
        }
        if let Some(path) = &options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = tokio::time::timeout(options.launch_timeout, Browser::launch(config))
            .await
            .map_err(|_| DriverError::Launch("timed out starting Chromium".into()))?
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(headless = options.headless, "Chromium started");
        Ok(Box::new(ChromiumSession { browser, events }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    events: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> DriverResult<Box<dyn Page>> {
        let page = self.browser.new_page("about:blank").await.map_err(cdp)?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        let ChromiumSession { mut browser, events } = *self;
        if let Err(e) = browser.close().await {
            warn!("Closing Chromium failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Waiting for Chromium to exit failed: {}", e);
        }
        events.abort();
        Ok(())
    }
}

pub struct ChromiumPage {
    page: CdpPage,
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> DriverResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: cdp(e).to_string(),
            }),
            Err(_) => Err(DriverError::Timeout {
                what: format!("navigation to {}", url),
                after: timeout,
            }),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.page.url().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn find_all(&self, selector: &str) -> DriverResult<Vec<Box<dyn Element>>> {
        let found = self.page.find_elements(selector).await.map_err(cdp)?;
        Ok(found
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn Element>)
            .collect())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        let field = self.page.find_element(selector).await.map_err(cdp)?;
        field.click().await.map_err(cdp)?;
        field.type_str(value).await.map_err(cdp)?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        let target = self.page.find_element(selector).await.map_err(cdp)?;
        target.click().await.map_err(cdp)?;
        Ok(())
    }

    async fn contains_text(&self, needle: &str) -> DriverResult<bool> {
        let html = self.page.content().await.map_err(cdp)?;
        Ok(html.contains(needle))
    }
}

pub struct ChromiumElement {
    element: CdpElement,
}

#[async_trait]
impl Element for ChromiumElement {
    async fn attribute(&self, name: &str) -> DriverResult<Option<String>> {
        self.element.attribute(name).await.map_err(cdp)
    }

    async fn text(&self) -> DriverResult<String> {
        Ok(self.element.inner_text().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn inner_html(&self) -> DriverResult<String> {
        Ok(self.element.inner_html().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn click(&self) -> DriverResult<()> {
        self.element.click().await.map_err(cdp)?;
        Ok(())
    }

    async fn find(&self, selector: &str) -> DriverResult<Option<Box<dyn Element>>> {
        let found = self.element.find_elements(selector).await.map_err(cdp)?;
        Ok(found
            .into_iter()
            .next()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn Element>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> LaunchOptions {
        LaunchOptions {
            headless: true,
            user_agent: "job_scraper-test".into(),
            window: (1280, 800),
            locale: None,
            chrome_path: None,
            launch_timeout: Duration::from_secs(20),
        }
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn close_without_pages_shuts_down_cleanly() {
        let session = ChromiumLauncher.launch(&options()).await.unwrap();
        assert!(session.close().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn reads_a_data_url() {
        let session = ChromiumLauncher.launch(&options()).await.unwrap();
        let mut page = session.new_page().await.unwrap();
        page.goto("data:text/html,<h1>Hello</h1><a href='/x'>go</a>", Duration::from_secs(10))
            .await
            .unwrap();

        let links = page.find_all("a").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].attribute("href").await.unwrap().as_deref(), Some("/x"));
        let heading = page.find_first("h1").await.unwrap().unwrap();
        assert_eq!(heading.text().await.unwrap(), "Hello");

        drop(links);
        drop(heading);
        drop(page);
        session.close().await.unwrap();
    }
}
