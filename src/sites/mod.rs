//! Site adapters and the name table that selects them.

pub mod eldorado;
pub mod hiringcafe;
pub mod linkedin;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{BrowserLauncher, LaunchOptions};
use crate::config::{Credentials, Settings};
use crate::error::ScrapeError;
use crate::pipeline::Timing;
use crate::record::{JobRecord, SearchParams, SiteInfo};

/// A job source.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn info(&self) -> SiteInfo;

    /// Reject parameters the source cannot work with, before any I/O.
    fn validate(&self, params: &SearchParams) -> Result<(), ScrapeError>;

    /// Scrape at most `params.max_jobs` postings. An empty result is not an error.
    async fn scrape(&self, params: &SearchParams) -> Result<Vec<JobRecord>, ScrapeError>;

    fn build_offer_id(&self, native_id: &str) -> String {
        self.info().build_offer_id(native_id)
    }
}

/// What every adapter gets from the caller.
#[derive(Clone)]
pub struct AdapterContext {
    pub launcher: Arc<dyn BrowserLauncher>,
    pub settings: Settings,
    pub credentials: Option<Credentials>,
    pub http: reqwest::Client,
}

impl AdapterContext {
    pub fn launch_options(&self, locale: Option<&str>) -> LaunchOptions {
        let b = &self.settings.browser;
        LaunchOptions {
            headless: !self.settings.headful,
            user_agent: b.user_agent.clone(),
            window: (b.window_width, b.window_height),
            locale: locale.map(String::from),
            chrome_path: b.chrome_path.clone(),
            launch_timeout: Duration::from_secs(b.launch_timeout_secs),
        }
    }

    /// Timeouts from settings combined with a site's fixed delays.
    pub fn timing(&self, settle_ms: u64, detail_settle_ms: u64, between_jobs_ms: u64) -> Timing {
        let b = &self.settings.browser;
        Timing {
            navigation: b.navigation_timeout(),
            settle: Duration::from_millis(settle_ms),
            listing_wait: b.listing_wait(),
            detail_wait: b.detail_wait(),
            detail_settle: Duration::from_millis(detail_settle_ms),
            between_jobs: Duration::from_millis(between_jobs_ms),
            poll: b.poll_interval(),
        }
    }
}

/// The fixed set of supported sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    LinkedIn,
    HiringCafe,
    Eldorado,
}

impl Site {
    pub const ALL: [Site; 3] = [Site::LinkedIn, Site::HiringCafe, Site::Eldorado];

    pub fn info(self) -> SiteInfo {
        match self {
            Site::LinkedIn => linkedin::INFO,
            Site::HiringCafe => hiringcafe::INFO,
            Site::Eldorado => eldorado::INFO,
        }
    }

    pub fn transport(self) -> &'static str {
        match self {
            Site::HiringCafe => "api",
            Site::LinkedIn | Site::Eldorado => "browser",
        }
    }

    /// Whether the site has a login flow that uses the credentials file.
    pub fn has_login(self) -> bool {
        matches!(self, Site::LinkedIn)
    }

    /// Case-insensitive lookup by key.
    pub fn from_name(name: &str) -> Result<Site, ScrapeError> {
        let wanted = name.trim().to_ascii_lowercase();
        Site::ALL
            .into_iter()
            .find(|s| s.info().key == wanted)
            .ok_or_else(|| ScrapeError::UnknownSite {
                name: name.to_string(),
                available: Site::ALL
                    .iter()
                    .map(|s| s.info().key)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn adapter(self, ctx: AdapterContext) -> Box<dyn SiteAdapter> {
        match self {
            Site::LinkedIn => Box::new(linkedin::LinkedIn::new(ctx)),
            Site::HiringCafe => Box::new(hiringcafe::HiringCafe::new(ctx)),
            Site::Eldorado => Box::new(eldorado::Eldorado::new(ctx)),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context(launcher: Arc<dyn BrowserLauncher>) -> AdapterContext {
    AdapterContext {
        launcher,
        settings: Settings::default(),
        credentials: None,
        http: reqwest::Client::new(),
    }
}
