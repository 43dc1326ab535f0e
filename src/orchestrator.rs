use std::path::PathBuf;

use chrono::{Local, SecondsFormat};
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::record::{JobRecord, SearchParams};
use crate::sinks::{FileSink, SheetSink};
use crate::sites::{AdapterContext, Site, SiteAdapter};

/// Counts reported after a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub site: String,
    pub found: usize,
    pub dropped: usize,
    pub saved: Vec<PathBuf>,
    pub failed_saves: usize,
    pub sheet_rows: usize,
    pub sheet_error: Option<String>,
}

impl RunSummary {
    pub fn line(&self) -> String {
        format!("{} jobs saved", self.saved.len())
    }

    pub fn print(&self) {
        println!("\n{}: {} found, {} dropped (no url or id)", self.site, self.found, self.dropped);
        if self.failed_saves > 0 {
            println!("{} files could not be written", self.failed_saves);
        }
        if self.sheet_rows > 0 {
            println!("{} rows appended to the spreadsheet", self.sheet_rows);
        }
        if let Some(e) = &self.sheet_error {
            println!("Spreadsheet upload failed: {}", e);
        }
        println!("{}", self.line());
    }
}

/// Resolves a site, runs it and fans the records out to the sinks.
pub struct Orchestrator {
    ctx: AdapterContext,
    files: FileSink,
    sheet: Option<SheetSink>,
}

impl Orchestrator {
    pub fn new(ctx: AdapterContext, files: FileSink, sheet: Option<SheetSink>) -> Self {
        Self { ctx, files, sheet }
    }

    pub async fn run(&self, site_name: &str, params: &SearchParams) -> Result<RunSummary, ScrapeError> {
        let site = Site::from_name(site_name)?;
        let adapter = site.adapter(self.ctx.clone());
        self.run_adapter(adapter.as_ref(), params).await
    }

    pub async fn run_adapter(
        &self,
        adapter: &dyn SiteAdapter,
        params: &SearchParams,
    ) -> Result<RunSummary, ScrapeError> {
        let info = adapter.info();
        adapter.validate(params)?;

        info!("Scraping {} (max {} jobs)", info.name, params.max_jobs);
        let records = adapter.scrape(params).await?;
        let found = records.len();

        let (records, rejected): (Vec<JobRecord>, Vec<JobRecord>) =
            records.into_iter().partition(JobRecord::is_deliverable);
        for r in &rejected {
            warn!("Dropping '{}': missing url or offer id", r.title);
        }

        let mut summary = RunSummary {
            site: info.name.to_string(),
            found,
            dropped: rejected.len(),
            ..Default::default()
        };
        if records.is_empty() {
            return Ok(summary);
        }

        let now = Local::now();
        for record in &records {
            match self.files.save(record, &now) {
                Ok(path) => summary.saved.push(path),
                Err(e) => {
                    warn!("Could not save {}: {}", record.offer_id, e);
                    summary.failed_saves += 1;
                }
            }
        }
        info!("Saved {} files to {}", summary.saved.len(), self.files.dir().display());

        if let Some(sheet) = &self.sheet {
            let created_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);
            match sheet.append(&records, &created_at).await {
                Ok(n) => summary.sheet_rows = n,
                Err(e) => {
                    warn!("Spreadsheet upload failed: {}", e);
                    summary.sheet_error = Some(e.to_string());
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::browser::fake::FakeBrowser;
    use crate::config::SiteOverrides;
    use crate::normalize::normalize;
    use crate::record::{SiteInfo, NO_COMPANY};
    use crate::sinks::sheets::SheetsClient;
    use crate::sites::test_context;

    const INFO: SiteInfo = SiteInfo {
        key: "canned",
        name: "Canned",
        prefix: "CN",
        base_url: "https://canned.test",
    };

    struct Canned(Vec<JobRecord>);

    #[async_trait]
    impl SiteAdapter for Canned {
        fn info(&self) -> SiteInfo {
            INFO
        }

        fn validate(&self, _params: &SearchParams) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn scrape(&self, _params: &SearchParams) -> Result<Vec<JobRecord>, ScrapeError> {
            Ok(self.0.clone())
        }
    }

    fn job(title: &str, native: &str, url: &str) -> JobRecord {
        JobRecord {
            title: title.into(),
            company: NO_COMPANY.into(),
            url: url.into(),
            offer_id: INFO.build_offer_id(native),
            description: normalize("<h1>Engineer</h1><p>Build <strong>systems</strong>.</p>"),
            source: INFO.name.into(),
        }
    }

    #[derive(Clone, Default)]
    struct Rows(Arc<Mutex<Vec<Vec<String>>>>);

    #[async_trait]
    impl SheetsClient for Rows {
        async fn sheet_title(&self) -> Result<String, ScrapeError> {
            Ok("Sheet1".into())
        }

        async fn ensure_header(&self, _range: &str, _header: &[&str]) -> Result<(), ScrapeError> {
            Ok(())
        }

        async fn append_rows(&self, _range: &str, rows: Vec<Vec<String>>) -> Result<usize, ScrapeError> {
            let n = rows.len();
            self.0.lock().unwrap().extend(rows);
            Ok(n)
        }
    }

    struct Broken;

    #[async_trait]
    impl SheetsClient for Broken {
        async fn sheet_title(&self) -> Result<String, ScrapeError> {
            Err(ScrapeError::Sheets("401 Unauthorized".into()))
        }

        async fn ensure_header(&self, _range: &str, _header: &[&str]) -> Result<(), ScrapeError> {
            unreachable!()
        }

        async fn append_rows(&self, _range: &str, _rows: Vec<Vec<String>>) -> Result<usize, ScrapeError> {
            unreachable!()
        }
    }

    fn orchestrator(dir: &std::path::Path, sheet: Option<SheetSink>) -> Orchestrator {
        Orchestrator::new(test_context(Arc::new(FakeBrowser::new())), FileSink::new(dir), sheet)
    }

    #[tokio::test]
    async fn saves_markdown_and_batches_rows() {
        let dir = tempfile::tempdir().unwrap();
        let rows = Rows::default();
        let orch = orchestrator(dir.path(), Some(SheetSink::new(Box::new(rows.clone()))));
        let adapter = Canned(vec![
            job("Engineer", "1", "https://canned.test/1"),
            job("Engineer", "2", "https://canned.test/2"),
        ]);

        let summary = orch.run_adapter(&adapter, &SearchParams::default()).await.unwrap();
        assert_eq!(summary.found, 2);
        assert_eq!(summary.saved.len(), 2);
        assert_eq!(summary.sheet_rows, 2);
        assert_eq!(summary.line(), "2 jobs saved");

        let name = summary.saved[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Engineer_"), "{name}");
        assert!(name.ends_with(".md"));
        let text = std::fs::read_to_string(&summary.saved[0]).unwrap();
        assert!(text.ends_with("---\n\n# Engineer\n\nBuild **systems**.\n"));

        let rows = rows.0.lock().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "CN-1");
        assert_eq!(rows[1][6], "pending");
    }

    #[tokio::test]
    async fn undeliverable_records_never_reach_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), None);
        let adapter = Canned(vec![
            job("Kept", "1", "https://canned.test/1"),
            job("No id", "", "https://canned.test/2"),
            job("No url", "3", ""),
        ]);

        let summary = orch.run_adapter(&adapter, &SearchParams::default()).await.unwrap();
        assert_eq!(summary.found, 3);
        assert_eq!(summary.dropped, 2);
        assert_eq!(summary.saved.len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn spreadsheet_failure_does_not_block_files() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Some(SheetSink::new(Box::new(Broken))));
        let adapter = Canned(vec![job("Engineer", "1", "https://canned.test/1")]);

        let summary = orch.run_adapter(&adapter, &SearchParams::default()).await.unwrap();
        assert_eq!(summary.saved.len(), 1);
        assert_eq!(summary.sheet_rows, 0);
        assert!(summary.sheet_error.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn unknown_site_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(dir.path(), None)
            .run("monster", &SearchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::UnknownSite { .. }));
    }

    #[tokio::test]
    async fn missing_keywords_fail_before_scraping() {
        let dir = tempfile::tempdir().unwrap();
        let browser = FakeBrowser::new();
        let orch = Orchestrator::new(
            test_context(Arc::new(browser.clone())),
            FileSink::new(dir.path()),
            None,
        );
        let err = orch.run("linkedin", &SearchParams::default()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::MissingParameter(_)));
        assert_eq!(browser.state.lock().unwrap().launches, 0);
    }

    #[tokio::test]
    async fn api_source_with_no_results_saves_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut ctx = test_context(Arc::new(FakeBrowser::new()));
        ctx.settings.sites.insert(
            "hiringcafe".into(),
            SiteOverrides {
                endpoint: Some(server.uri()),
                ..Default::default()
            },
        );
        let rows = Rows::default();
        let orch = Orchestrator::new(ctx, FileSink::new(&out), Some(SheetSink::new(Box::new(rows.clone()))));

        let params = SearchParams {
            keywords: Some("rust".into()),
            ..Default::default()
        };
        let summary = orch.run("hiringcafe", &params).await.unwrap();
        assert_eq!(summary.line(), "0 jobs saved");
        assert!(!out.exists());
        assert!(rows.0.lock().unwrap().is_empty());
    }
}
