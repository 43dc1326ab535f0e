use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AdapterContext, SiteAdapter};
use crate::error::ScrapeError;
use crate::normalize::normalize;
use crate::record::{placeholder_title, JobRecord, SearchParams, SiteInfo, NO_COMPANY};

pub const INFO: SiteInfo = SiteInfo {
    key: "hiringcafe",
    name: "HiringCafe",
    prefix: "HC",
    base_url: "https://hiring.cafe",
};

const API_URL: &str = "https://hiring.cafe/api/search-jobs";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchState {
    search_query: String,
    departments: Vec<String>,
    locations: serde_json::Value,
    workplace_types: &'static [&'static str],
    default_to_user_location: bool,
    physical_environments: &'static [&'static str],
    commitment_types: &'static [&'static str],
    seniority_level: &'static [&'static str],
    role_types: &'static [&'static str],
    sort_by: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayload {
    size: usize,
    page: u32,
    search_state: SearchState,
}

pub fn search_payload(params: &SearchParams) -> SearchPayload {
    SearchPayload {
        size: params.max_jobs,
        page: 0,
        search_state: SearchState {
            search_query: params.keywords().unwrap_or("").to_string(),
            departments: params.departments.clone(),
            locations: serde_json::json!([{
                "formatted_address": "Poland",
                "types": ["country"],
                "geometry": { "location": { "lat": "52.1792", "lon": "21.0011" } },
                "id": "user_country",
                "address_components": [
                    { "long_name": "Poland", "short_name": "PL", "types": ["country"] }
                ],
                "options": { "flexible_regions": ["anywhere_in_continent", "anywhere_in_world"] }
            }]),
            workplace_types: &["Remote", "Hybrid", "Onsite"],
            default_to_user_location: true,
            physical_environments: &["Office", "Outdoor", "Vehicle", "Industrial", "Customer-Facing"],
            commitment_types: &[
                "Full Time", "Part Time", "Contract", "Internship", "Temporary", "Seasonal", "Volunteer",
            ],
            seniority_level: &["No Prior Experience Required", "Entry Level", "Mid Level", "Senior Level"],
            role_types: &["Individual Contributor", "People Manager"],
            sort_by: "default",
        },
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct JobInformation {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessedJob {
    core_job_title: Option<String>,
    company_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessedCompany {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiJob {
    id: String,
    apply_url: Option<String>,
    job_information: Option<JobInformation>,
    v5_processed_job_data: Option<ProcessedJob>,
    v5_processed_company_data: Option<ProcessedCompany>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Map one API result; `None` when it has no usable id.
fn to_record(job: ApiJob, n: usize) -> Option<JobRecord> {
    let native = job.id.rsplit("___").next().unwrap_or("").trim().to_string();
    if native.is_empty() {
        return None;
    }
    let info = job.job_information.unwrap_or_default();
    let processed = job.v5_processed_job_data.unwrap_or_default();
    let company = job.v5_processed_company_data.unwrap_or_default();

    Some(JobRecord {
        title: non_empty(info.title)
            .or_else(|| non_empty(processed.core_job_title))
            .unwrap_or_else(|| placeholder_title(n)),
        company: non_empty(company.name)
            .or_else(|| non_empty(processed.company_name))
            .unwrap_or_else(|| NO_COMPANY.to_string()),
        url: non_empty(job.apply_url).unwrap_or_else(|| format!("{}/job/{}", INFO.base_url, native)),
        offer_id: INFO.build_offer_id(&native),
        description: normalize(info.description.as_deref().unwrap_or("")),
        source: INFO.name.to_string(),
    })
}

pub struct HiringCafe {
    ctx: AdapterContext,
    endpoint: String,
}

impl HiringCafe {
    pub fn new(ctx: AdapterContext) -> Self {
        let endpoint = ctx
            .settings
            .site(INFO.key)
            .and_then(|o| o.endpoint.clone())
            .unwrap_or_else(|| API_URL.to_string());
        Self { ctx, endpoint }
    }
}

#[async_trait]
impl SiteAdapter for HiringCafe {
    fn info(&self) -> SiteInfo {
        INFO
    }

    fn validate(&self, params: &SearchParams) -> Result<(), ScrapeError> {
        if params.keywords().is_none() && params.departments.is_empty() {
            return Err(ScrapeError::MissingParameter(
                "HiringCafe needs --keywords or --departments".into(),
            ));
        }
        Ok(())
    }

    async fn scrape(&self, params: &SearchParams) -> Result<Vec<JobRecord>, ScrapeError> {
        if params.max_jobs == 0 {
            return Ok(Vec::new());
        }
        info!(
            keywords = params.keywords().unwrap_or(""),
            departments = ?params.departments,
            "Searching HiringCafe"
        );

        let resp = self
            .ctx
            .http
            .post(&self.endpoint)
            .header("accept", "*/*")
            .header("user-agent", &self.ctx.settings.browser.user_agent)
            .json(&search_payload(params))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }
        let data: SearchResponse = resp.json().await?;
        info!("Found {} jobs", data.results.len());

        let mut jobs = Vec::new();
        for (i, value) in data.results.into_iter().enumerate() {
            let mapped = serde_json::from_value::<ApiJob>(value)
                .map_err(|e| e.to_string())
                .and_then(|job| to_record(job, i + 1).ok_or_else(|| "missing id".to_string()));
            match mapped {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("Skipping HiringCafe result {}: {}", i + 1, e),
            }
            if jobs.len() >= params.max_jobs {
                break;
            }
        }
        Ok(jobs)
    }
}
