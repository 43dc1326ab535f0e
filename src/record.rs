use serde::Serialize;
use url::Url;

/// Value used when a posting has no company.
pub const NO_COMPANY: &str = "N/A";
/// Status written next to every fresh row.
pub const PENDING: &str = "pending";

/// Static description of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteInfo {
    /// Lookup key used on the command line.
    pub key: &'static str,
    /// Human readable name, written into saved documents.
    pub name: &'static str,
    /// Offer id prefix.
    pub prefix: &'static str,
    /// Origin that relative listing links are joined with.
    pub base_url: &'static str,
}

impl SiteInfo {
    pub fn build_offer_id(&self, native_id: &str) -> String {
        build_offer_id(self.prefix, native_id)
    }

    /// Resolve `href` against the site origin. Absolute links pass through.
    pub fn absolute_url(&self, href: &str) -> String {
        let href = href.trim();
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        Url::parse(self.base_url)
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url.trim_end_matches('/'), href))
    }
}

pub fn build_offer_id(prefix: &str, native_id: &str) -> String {
    format!("{}-{}", prefix, native_id)
}

/// One scraped job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub url: String,
    pub offer_id: String,
    /// Markdown body.
    pub description: String,
    pub source: String,
}

impl JobRecord {
    /// Whether the record may reach a sink: it needs a url and an offer id
    /// with a non-empty native part.
    pub fn is_deliverable(&self) -> bool {
        let native = self
            .offer_id
            .split_once('-')
            .map(|(_, id)| id)
            .unwrap_or("");
        !self.url.trim().is_empty() && !native.trim().is_empty()
    }
}

/// Placeholder title for the n-th (1-based) job when none could be read.
pub fn placeholder_title(n: usize) -> String {
    format!("job_{}", n)
}

/// Search filters; `raw` wins over the structured fields when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    pub raw: Option<String>,
    pub time_range: Option<String>,
    pub work_type: Option<String>,
    pub active_only: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            raw: None,
            time_range: Some("r604800".into()),
            work_type: Some("2".into()),
            active_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub keywords: Option<String>,
    pub departments: Vec<String>,
    pub max_jobs: usize,
    pub filters: SearchFilters,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            keywords: None,
            departments: Vec::new(),
            max_jobs: 10,
            filters: SearchFilters::default(),
        }
    }
}

impl SearchParams {
    /// Keywords with surrounding whitespace removed, `None` when blank.
    pub fn keywords(&self) -> Option<&str> {
        self.keywords.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Split a comma-separated department list.
pub fn parse_departments(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}
