use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use url::form_urlencoded;

use super::{AdapterContext, SiteAdapter};
use crate::error::ScrapeError;
use crate::pipeline::{DetailMode, LoginFlow, Pipeline, SelectorChain, SiteProfile, SiteRules};
use crate::record::{JobRecord, SearchParams, SiteInfo};

pub const INFO: SiteInfo = SiteInfo {
    key: "linkedin",
    name: "LinkedIn",
    prefix: "LN",
    base_url: "https://www.linkedin.com",
};

/// Worldwide.
const GEO_ID: &str = "91000000";

static VIEW_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/jobs/view/(\d+)").unwrap());
static CURRENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]currentJobId=(\d+)").unwrap());

pub fn search_url(params: &SearchParams) -> String {
    let keywords: String = form_urlencoded::byte_serialize(params.keywords().unwrap_or("").as_bytes()).collect();
    let mut url = format!(
        "https://www.linkedin.com/jobs/search/?keywords={}&geoId={}",
        keywords, GEO_ID
    );

    let f = &params.filters;
    match f.raw.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => {
            url.push('&');
            url.push_str(raw.trim_start_matches('&'));
        }
        None => {
            if f.active_only {
                url.push_str("&f_AL=true");
            }
            if let Some(t) = &f.time_range {
                url.push_str(&format!("&f_TPR={}", t));
            }
            if let Some(w) = &f.work_type {
                url.push_str(&format!("&f_WT={}", w));
            }
        }
    }

    url.push_str("&origin=JOB_SEARCH_PAGE_JOB_FILTER&refresh=true");
    url
}

pub fn job_id(url: &str) -> Option<String> {
    VIEW_ID_RE
        .captures(url)
        .or_else(|| CURRENT_ID_RE.captures(url))
        .map(|c| c[1].to_string())
}

fn profile(ctx: &AdapterContext) -> SiteProfile {
    SiteProfile {
        site: INFO,
        listing: SelectorChain::new(&[
            ".job-card-container__link",
            "a[data-tracking-control-name*=\"jobcard\"]",
            ".jobs-search-results__list-item a",
            ".job-card-list__title a",
        ]),
        listing_title: SelectorChain::default(),
        listing_company: SelectorChain::new(&[".artdeco-entity-lockup__subtitle"]),
        detail: SelectorChain::new(&[
            "div.jobs-search__job-details--wrapper",
            "section.jobs-search__job-details",
            "div[data-job-details]",
            ".job-view-layout",
        ]),
        title: SelectorChain::new(&[
            "h1",
            "h2.jobs-unified-top-card__job-title",
            ".jobs-unified-top-card__job-title",
        ]),
        company: SelectorChain::new(&[
            "div.job-details-jobs-unified-top-card__company-name > a",
            "div.job-details-jobs-unified-top-card__company-name",
        ]),
        detail_mode: DetailMode::ClickInPlace,
        login: Some(LoginFlow {
            warmup_url: Some("https://www.linkedin.com".into()),
            login_url: "https://www.linkedin.com/login".into(),
            username_field: "input[name=\"session_key\"]".into(),
            password_field: "input[name=\"session_password\"]".into(),
            submit: "button[type=\"submit\"]".into(),
            login_marker: "/login".into(),
            error_text: "Wrong email or password".into(),
            field_wait: Duration::from_secs(10),
        }),
        timing: ctx.timing(5000, 2000, 1000),
    }
    .with_overrides(ctx.settings.site(INFO.key))
}

pub struct LinkedIn {
    ctx: AdapterContext,
    profile: SiteProfile,
}

impl LinkedIn {
    pub fn new(ctx: AdapterContext) -> Self {
        let profile = profile(&ctx);
        Self { ctx, profile }
    }
}

impl SiteRules for LinkedIn {
    fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn native_id(&self, url: &str) -> Option<String> {
        job_id(url)
    }

    fn canonical_url(&self, native_id: &str, _url: &str) -> String {
        format!("https://www.linkedin.com/jobs/view/{}/", native_id)
    }
}

#[async_trait]
impl SiteAdapter for LinkedIn {
    fn info(&self) -> SiteInfo {
        INFO
    }

    fn validate(&self, params: &SearchParams) -> Result<(), ScrapeError> {
        if params.keywords().is_none() {
            return Err(ScrapeError::MissingParameter("LinkedIn needs --keywords".into()));
        }
        Ok(())
    }

    async fn scrape(&self, params: &SearchParams) -> Result<Vec<JobRecord>, ScrapeError> {
        let url = search_url(params);
        Pipeline::new(
            self.ctx.launcher.as_ref(),
            self.ctx.launch_options(None),
            self,
            self.ctx.credentials.as_ref(),
        )
        .run(&url, params)
        .await
    }
}
