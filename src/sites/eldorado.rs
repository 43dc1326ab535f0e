use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::{form_urlencoded, Url};

use super::{AdapterContext, SiteAdapter};
use crate::error::ScrapeError;
use crate::pipeline::{DetailMode, Pipeline, SelectorChain, SiteProfile, SiteRules};
use crate::record::{JobRecord, SearchParams, SiteInfo};

pub const INFO: SiteInfo = SiteInfo {
    key: "eldorado",
    name: "Eldorado",
    prefix: "ED",
    base_url: "https://czyjesteldorado.pl",
};

const LOCALE: &str = "pl-PL";

static OFFER_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/offer/(\d+)").unwrap());

pub fn search_url(params: &SearchParams) -> String {
    let q: String = form_urlencoded::byte_serialize(params.keywords().unwrap_or("").as_bytes()).collect();
    format!("{}/search?q={}&sort=relevance&exact=0", INFO.base_url, q)
}

/// `/offer/<digits>`, else the last non-empty path segment.
pub fn offer_id(url: &str) -> Option<String> {
    if let Some(c) = OFFER_ID_RE.captures(url) {
        return Some(c[1].to_string());
    }
    Url::parse(url)
        .ok()?
        .path_segments()?
        .filter(|p| !p.is_empty())
        .last()
        .map(String::from)
}

/// Listing titles read `"Title @ Company"`; the company keeps any later `@`.
pub fn split_title(text: &str) -> (String, Option<String>) {
    match text.split_once('@') {
        Some((title, company)) => {
            let company = company.trim();
            (title.trim().to_string(), (!company.is_empty()).then(|| company.to_string()))
        }
        None => (text.trim().to_string(), None),
    }
}

fn profile(ctx: &AdapterContext) -> SiteProfile {
    SiteProfile {
        site: INFO,
        listing: SelectorChain::new(&["div.offer-list div.offer-row", "div.offer-row", "a[href*=\"/offer/\"]"]),
        listing_title: SelectorChain::new(&["h2", "h3", ".job-title", ".offer-title", "[class*=\"title\"]"]),
        listing_company: SelectorChain::new(&[".company-name", "[class*=\"company\"]"]),
        detail: SelectorChain::new(&["div.col-12", "main"]),
        title: SelectorChain::new(&["h1", "h2.job-title", ".offer-title"]),
        company: SelectorChain::new(&[".company-name"]),
        detail_mode: DetailMode::VisitUrl,
        login: None,
        timing: ctx.timing(3000, 2000, 1000),
    }
    .with_overrides(ctx.settings.site(INFO.key))
}

pub struct Eldorado {
    ctx: AdapterContext,
    profile: SiteProfile,
}

impl Eldorado {
    pub fn new(ctx: AdapterContext) -> Self {
        let profile = profile(&ctx);
        Self { ctx, profile }
    }
}

impl SiteRules for Eldorado {
    fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    fn native_id(&self, url: &str) -> Option<String> {
        offer_id(url)
    }

    fn split_title(&self, text: &str) -> (String, Option<String>) {
        split_title(text)
    }
}

#[async_trait]
impl SiteAdapter for Eldorado {
    fn info(&self) -> SiteInfo {
        INFO
    }

    fn validate(&self, params: &SearchParams) -> Result<(), ScrapeError> {
        if params.keywords().is_none() {
            return Err(ScrapeError::MissingParameter("Eldorado needs --keywords".into()));
        }
        Ok(())
    }

    async fn scrape(&self, params: &SearchParams) -> Result<Vec<JobRecord>, ScrapeError> {
        let url = search_url(params);
        Pipeline::new(
            self.ctx.launcher.as_ref(),
            self.ctx.launch_options(Some(LOCALE)),
            self,
            None,
        )
        .run(&url, params)
        .await
    }
}
