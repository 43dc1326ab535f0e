//! Browser extraction pipeline shared by every browser-driven site.
//!
//! One run: launch → optional login → search page → listing wait →
//! capture previews → per job (open detail, extract, assemble) → close.
//! A single job failing is logged and skipped; only a lost browser session
//! or an unreachable search page ends the run early.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::browser::{BrowserLauncher, DriverResult, Element, LaunchOptions, Page};
use crate::config::{Credentials, SiteOverrides};
use crate::error::{DriverError, ScrapeError};
use crate::normalize::normalize;
use crate::record::{placeholder_title, JobRecord, SearchParams, SiteInfo, NO_COMPANY};

/// Ordered selector candidates; the first one that matches wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorChain(Vec<String>);

impl SelectorChain {
    pub fn new(candidates: &[&str]) -> Self {
        Self(candidates.iter().map(|s| s.to_string()).collect())
    }

    pub fn candidates(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn replace(&mut self, with: &Option<Vec<String>>) {
        if let Some(chain) = with {
            self.0 = chain.clone();
        }
    }
}

/// How a job's detail view is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMode {
    /// Click the listing and read the detail pane on the same page.
    ClickInPlace,
    /// Navigate to the URL captured from the listing.
    VisitUrl,
}

#[derive(Debug, Clone)]
pub struct Timing {
    pub navigation: Duration,
    /// Fixed pause after the search page loads.
    pub settle: Duration,
    pub listing_wait: Duration,
    pub detail_wait: Duration,
    /// Fixed pause after opening a detail view.
    pub detail_settle: Duration,
    pub between_jobs: Duration,
    pub poll: Duration,
}

impl Timing {
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            navigation: Duration::from_secs(1),
            settle: Duration::ZERO,
            listing_wait: Duration::ZERO,
            detail_wait: Duration::ZERO,
            detail_settle: Duration::ZERO,
            between_jobs: Duration::ZERO,
            poll: Duration::from_millis(1),
        }
    }
}

/// Login form description.
#[derive(Debug, Clone)]
pub struct LoginFlow {
    pub warmup_url: Option<String>,
    pub login_url: String,
    pub username_field: String,
    pub password_field: String,
    pub submit: String,
    /// URL fragment that means we are still on the login page.
    pub login_marker: String,
    pub error_text: String,
    pub field_wait: Duration,
}

/// Everything the pipeline needs to know about one site's markup.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub site: SiteInfo,
    pub listing: SelectorChain,
    pub listing_title: SelectorChain,
    pub listing_company: SelectorChain,
    pub detail: SelectorChain,
    pub title: SelectorChain,
    pub company: SelectorChain,
    pub detail_mode: DetailMode,
    pub login: Option<LoginFlow>,
    pub timing: Timing,
}

impl SiteProfile {
    /// Apply settings-file overrides on top of the built-in profile.
    pub fn with_overrides(mut self, overrides: Option<&SiteOverrides>) -> Self {
        let Some(o) = overrides else {
            return self;
        };
        self.listing.replace(&o.listing);
        self.listing_title.replace(&o.listing_title);
        self.listing_company.replace(&o.listing_company);
        self.detail.replace(&o.detail);
        self.title.replace(&o.title);
        self.company.replace(&o.company);
        if let Some(ms) = o.settle_ms {
            self.timing.settle = Duration::from_millis(ms);
        }
        if let Some(ms) = o.job_delay_ms {
            self.timing.between_jobs = Duration::from_millis(ms);
        }
        self
    }
}

/// Site-specific rules the pipeline defers to.
pub trait SiteRules: Send + Sync {
    fn profile(&self) -> &SiteProfile;

    /// Native job id found in a job URL.
    fn native_id(&self, url: &str) -> Option<String>;

    /// URL stored on the record once the native id is known.
    fn canonical_url(&self, _native_id: &str, url: &str) -> String {
        url.to_string()
    }

    /// Split a displayed title into (title, company) when the site combines them.
    fn split_title(&self, text: &str) -> (String, Option<String>) {
        (text.trim().to_string(), None)
    }
}

/// Data read from a listing before navigating away from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPreview {
    pub url: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
}

/// Poll `chain` until one candidate yields at least one element or `timeout`
/// passes. Returns the winning selector with its matches.
pub async fn wait_for_any(
    page: &dyn Page,
    chain: &SelectorChain,
    timeout: Duration,
    poll: Duration,
) -> DriverResult<Option<(String, Vec<Box<dyn Element>>)>> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        for selector in chain.candidates() {
            match page.find_all(selector).await {
                Ok(found) if !found.is_empty() => {
                    debug!(selector = %selector, count = found.len(), "Selector matched");
                    return Ok(Some((selector.clone(), found)));
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!(selector = %selector, "Selector lookup failed: {}", e),
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(poll).await;
    }
}

fn clean(text: String) -> Option<String> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Text of the first descendant of `el` matching the chain.
async fn text_within(el: &dyn Element, chain: &SelectorChain) -> DriverResult<Option<String>> {
    for selector in chain.candidates() {
        match el.find(selector).await {
            Ok(Some(found)) => match found.text().await {
                Ok(text) => {
                    if let Some(text) = clean(text) {
                        return Ok(Some(text));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => {}
            },
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => {}
        }
    }
    Ok(None)
}

/// Text of the first element on the page matching the chain.
async fn text_on_page(page: &dyn Page, chain: &SelectorChain) -> DriverResult<Option<String>> {
    for selector in chain.candidates() {
        match page.find_first(selector).await {
            Ok(Some(found)) => match found.text().await {
                Ok(text) => {
                    if let Some(text) = clean(text) {
                        return Ok(Some(text));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => {}
            },
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => {}
        }
    }
    Ok(None)
}

/// One configured run of the pipeline for one site.
pub struct Pipeline<'a> {
    launcher: &'a dyn BrowserLauncher,
    launch: LaunchOptions,
    rules: &'a dyn SiteRules,
    credentials: Option<&'a Credentials>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        launcher: &'a dyn BrowserLauncher,
        launch: LaunchOptions,
        rules: &'a dyn SiteRules,
        credentials: Option<&'a Credentials>,
    ) -> Self {
        Self {
            launcher,
            launch,
            rules,
            credentials,
        }
    }

    fn profile(&self) -> &SiteProfile {
        self.rules.profile()
    }

    /// Run against `search_url`. The browser is closed on every path out.
    pub async fn run(
        &self,
        search_url: &str,
        params: &SearchParams,
    ) -> Result<Vec<JobRecord>, ScrapeError> {
        if params.max_jobs == 0 {
            return Ok(Vec::new());
        }

        let session = self.launcher.launch(&self.launch).await?;
        let result = match session.new_page().await {
            Ok(mut page) => self.drive(page.as_mut(), search_url, params).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = session.close().await {
            warn!("Closing browser failed: {}", e);
        }
        result
    }

    async fn drive(
        &self,
        page: &mut dyn Page,
        search_url: &str,
        params: &SearchParams,
    ) -> Result<Vec<JobRecord>, ScrapeError> {
        let profile = self.profile();
        let timing = &profile.timing;

        if let (Some(flow), Some(creds)) = (&profile.login, self.credentials) {
            match self.login(page, flow, creds).await {
                Ok(true) => info!("Logged in to {} as {}", profile.site.name, creds.username),
                Ok(false) => warn!("Login to {} failed; continuing anonymously", profile.site.name),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => warn!("Login to {} failed ({}); continuing anonymously", profile.site.name, e),
            }
        }

        info!("Navigating to {}", search_url);
        page.goto(search_url, timing.navigation)
            .await
            .map_err(|source| ScrapeError::SearchUnreachable {
                url: search_url.to_string(),
                source,
            })?;
        tokio::time::sleep(timing.settle).await;

        let Some((selector, listings)) =
            wait_for_any(page, &profile.listing, timing.listing_wait, timing.poll).await?
        else {
            info!("No job listings found on {}", profile.site.name);
            return Ok(Vec::new());
        };

        let take = listings.len().min(params.max_jobs);
        info!("Found {} job listings, processing {}", listings.len(), take);

        let mut previews = Vec::with_capacity(take);
        for (i, listing) in listings.iter().take(take).enumerate() {
            match self.preview(listing.as_ref()).await {
                Ok(p) => previews.push(p),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("Could not read listing {}: {}", i + 1, e);
                    previews.push(ListingPreview::default());
                }
            }
        }
        drop(listings);

        let pb = ProgressBar::new(previews.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let mut records = Vec::with_capacity(previews.len());
        for (i, preview) in previews.iter().enumerate() {
            pb.set_message(preview.title.clone().unwrap_or_default());
            match self.job(page, &selector, i, preview).await {
                Ok(record) => {
                    debug!(offer_id = %record.offer_id, "Extracted {}", record.title);
                    records.push(record);
                }
                Err(e) if e.is_fatal() => {
                    pb.abandon();
                    return Err(e);
                }
                Err(e) => warn!("Skipping job {}/{}: {}", i + 1, previews.len(), e),
            }
            pb.inc(1);
            if i + 1 < previews.len() {
                tokio::time::sleep(timing.between_jobs).await;
            }
        }
        pb.finish_and_clear();

        info!("Extracted {} of {} jobs from {}", records.len(), previews.len(), profile.site.name);
        Ok(records)
    }

    async fn login(
        &self,
        page: &mut dyn Page,
        flow: &LoginFlow,
        creds: &Credentials,
    ) -> DriverResult<bool> {
        let timing = &self.profile().timing;
        if let Some(warmup) = &flow.warmup_url {
            page.goto(warmup, timing.navigation).await?;
            tokio::time::sleep(timing.settle).await;
        }
        page.goto(&flow.login_url, timing.navigation).await?;

        let field = SelectorChain::new(&[flow.username_field.as_str()]);
        if wait_for_any(page, &field, flow.field_wait, timing.poll).await?.is_none() {
            debug!("Login form did not appear");
            return Ok(false);
        }
        page.fill(&flow.username_field, &creds.username).await?;
        page.fill(&flow.password_field, &creds.password).await?;
        page.click(&flow.submit).await?;
        tokio::time::sleep(timing.settle).await;

        let url = page.current_url().await?;
        if url.contains(&flow.login_marker) || page.contains_text(&flow.error_text).await? {
            return Ok(false);
        }
        Ok(true)
    }

    async fn preview(&self, listing: &dyn Element) -> DriverResult<ListingPreview> {
        let profile = self.profile();

        let href = match listing.attribute("href").await? {
            Some(h) if !h.trim().is_empty() => Some(h),
            _ => match listing.find("a").await? {
                Some(a) => a.attribute("href").await?,
                None => None,
            },
        };
        let url = href
            .filter(|h| !h.trim().is_empty())
            .map(|h| profile.site.absolute_url(&h));

        let shown = match text_within(listing, &profile.listing_title).await? {
            Some(t) => Some(t),
            None if profile.listing_title.is_empty() => clean(listing.text().await?),
            None => None,
        };
        let (title, split_company) = match shown {
            Some(t) => {
                let (title, company) = self.rules.split_title(&t);
                (Some(title).filter(|t| !t.is_empty()), company)
            }
            None => (None, None),
        };
        let company = text_within(listing, &profile.listing_company)
            .await?
            .or(split_company)
            .filter(|c| !c.is_empty());

        Ok(ListingPreview { url, title, company })
    }

    async fn open_detail(
        &self,
        page: &mut dyn Page,
        listing_selector: &str,
        index: usize,
        preview: &ListingPreview,
    ) -> Result<(), ScrapeError> {
        let timing = &self.profile().timing;
        match self.profile().detail_mode {
            DetailMode::ClickInPlace => {
                // Handles from before the last click are stale; look them up again.
                let listings = page.find_all(listing_selector).await?;
                let target = listings
                    .get(index)
                    .ok_or_else(|| DriverError::NotFound(format!("{} #{}", listing_selector, index + 1)))?;
                target.click().await?;
            }
            DetailMode::VisitUrl => {
                let url = preview
                    .url
                    .as_deref()
                    .ok_or_else(|| DriverError::NotFound("listing link".into()))?;
                page.goto(url, timing.navigation).await?;
            }
        }
        tokio::time::sleep(timing.detail_settle).await;
        Ok(())
    }

    async fn job(
        &self,
        page: &mut dyn Page,
        listing_selector: &str,
        index: usize,
        preview: &ListingPreview,
    ) -> Result<JobRecord, ScrapeError> {
        let profile = self.profile();
        let timing = &profile.timing;

        self.open_detail(page, listing_selector, index, preview).await?;

        let (_, mut found) = wait_for_any(page, &profile.detail, timing.detail_wait, timing.poll)
            .await?
            .ok_or_else(|| DriverError::Timeout {
                what: "job details".into(),
                after: timing.detail_wait,
            })?;
        let container = found.swap_remove(0);

        let shown_title = match text_within(container.as_ref(), &profile.title).await? {
            Some(t) => Some(t),
            None => text_on_page(page, &profile.title).await?,
        };
        let (title, title_company) = match shown_title {
            Some(t) => {
                let (title, company) = self.rules.split_title(&t);
                (Some(title).filter(|t| !t.is_empty()), company)
            }
            None => (None, None),
        };
        let company = match text_within(container.as_ref(), &profile.company).await? {
            Some(c) => Some(c),
            None => text_on_page(page, &profile.company).await?,
        };

        let html = container.inner_html().await?;
        let current = page.current_url().await?;
        drop(container);

        let native = self
            .rules
            .native_id(&current)
            .or_else(|| preview.url.as_deref().and_then(|u| self.rules.native_id(u)))
            .unwrap_or_default();
        let base_url = preview.url.clone().unwrap_or(current);
        let url = if native.is_empty() {
            base_url
        } else {
            self.rules.canonical_url(&native, &base_url)
        };

        Ok(JobRecord {
            title: title
                .or_else(|| preview.title.clone())
                .unwrap_or_else(|| placeholder_title(index + 1)),
            company: company
                .or(title_company)
                .or_else(|| preview.company.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| NO_COMPANY.to_string()),
            url,
            offer_id: profile.site.build_offer_id(&native),
            description: normalize(&html),
            source: profile.site.name.to_string(),
        })
    }
}
