//! Spreadsheet sink and the Google Sheets v4 REST client behind it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::error::ScrapeError;
use crate::record::{JobRecord, PENDING};

pub const HEADER: [&str; 7] = ["created_at", "offerId", "title", "company", "url", "description", "status"];

/// Minimal spreadsheet API.
#[async_trait]
pub trait SheetsClient: Send + Sync {
    /// Title of the first sheet (tab).
    async fn sheet_title(&self) -> Result<String, ScrapeError>;
    /// Write `header` into `range` unless it already holds values.
    async fn ensure_header(&self, range: &str, header: &[&str]) -> Result<(), ScrapeError>;
    /// Append rows after the last filled row; returns rows written.
    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<usize, ScrapeError>;
}

/// `Sheet1` stays bare, anything else is quoted.
fn qualify(sheet: &str, cells: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{}!{}", sheet, cells)
    } else {
        format!("'{}'!{}", sheet.replace('\'', "''"), cells)
    }
}

pub fn row(record: &JobRecord, created_at: &str) -> Vec<String> {
    vec![
        created_at.to_string(),
        record.offer_id.clone(),
        record.title.clone(),
        record.company.clone(),
        record.url.clone(),
        record.description.clone(),
        PENDING.to_string(),
    ]
}

/// Batches records into one append call.
pub struct SheetSink {
    client: Box<dyn SheetsClient>,
}

impl SheetSink {
    pub fn new(client: Box<dyn SheetsClient>) -> Self {
        Self { client }
    }

    pub async fn append(&self, records: &[JobRecord], created_at: &str) -> Result<usize, ScrapeError> {
        if records.is_empty() {
            return Ok(0);
        }
        let sheet = self.client.sheet_title().await?;
        self.client
            .ensure_header(&qualify(&sheet, "A1:G1"), &HEADER)
            .await?;
        let rows = records.iter().map(|r| row(r, created_at)).collect();
        let written = self.client.append_rows(&qualify(&sheet, "A:G"), rows).await?;
        info!("Appended {} rows to sheet '{}'", written, sheet);
        Ok(written)
    }
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_rows: Option<usize>,
}

/// Google Sheets over REST with a pre-obtained OAuth bearer token.
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    token: String,
}

impl GoogleSheetsClient {
    pub fn new(http: reqwest::Client, api_base: &str, spreadsheet_id: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, tail: &[&str]) -> Result<Url, ScrapeError> {
        let mut url = Url::parse(&self.api_base).map_err(|e| ScrapeError::Sheets(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ScrapeError::Sheets(format!("bad API base {}", self.api_base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ScrapeError> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::Sheets(format!("{}: {}", status, body)));
        }
        Ok(resp)
    }
}

#[async_trait]
impl SheetsClient for GoogleSheetsClient {
    async fn sheet_title(&self) -> Result<String, ScrapeError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");
        let doc: Spreadsheet = self.send(self.http.get(url)).await?.json().await?;
        doc.sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or_else(|| ScrapeError::Sheets("spreadsheet has no sheets".into()))
    }

    async fn ensure_header(&self, range: &str, header: &[&str]) -> Result<(), ScrapeError> {
        let url = self.url(&["values", range])?;
        let current: ValueRange = self.send(self.http.get(url.clone())).await?.json().await?;
        if current.values.iter().any(|r| !r.is_empty()) {
            debug!("Header already present in {}", range);
            return Ok(());
        }

        let mut url = url;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.send(self.http.put(url).json(&json!({ "values": [header] })))
            .await?;
        info!("Wrote header row to {}", range);
        Ok(())
    }

    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<usize, ScrapeError> {
        let count = rows.len();
        let target = format!("{}:append", range);
        let mut url = self.url(&["values", target.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let resp: AppendResponse = self
            .send(self.http.post(url).json(&json!({ "values": rows })))
            .await?
            .json()
            .await?;
        Ok(resp.updates.and_then(|u| u.updated_rows).unwrap_or(count))
    }
}
