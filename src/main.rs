mod browser;
mod config;
mod error;
mod normalize;
mod orchestrator;
mod pipeline;
mod record;
mod sinks;
mod sites;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};

use crate::browser::chromium::ChromiumLauncher;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::record::{parse_departments, SearchFilters, SearchParams};
use crate::sinks::{FileSink, GoogleSheetsClient, SheetSink};
use crate::sites::{AdapterContext, Site};

#[derive(Parser)]
#[command(name = "job_scraper", about = "Multi-site job posting scraper")]
struct Cli {
    /// Settings file (default: ./job_scraper.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one site and save the postings
    Scrape {
        /// Site to scrape (linkedin, hiringcafe, eldorado)
        #[arg(short, long)]
        site: String,
        /// Search keywords
        #[arg(short, long)]
        keywords: Option<String>,
        /// Comma-separated departments (HiringCafe)
        #[arg(short, long)]
        departments: Option<String>,
        /// Output directory for Markdown files
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Max jobs to scrape
        #[arg(short = 'n', long)]
        max_jobs: Option<usize>,
        /// Also append rows to this Google Sheet id
        #[arg(long)]
        google_sheet: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// Raw query-string filters, replacing the ones below (LinkedIn)
        #[arg(long)]
        filters: Option<String>,
        /// Posting age filter (LinkedIn f_TPR)
        #[arg(short, long, default_value = "r604800")]
        time_range: String,
        /// Work type filter (LinkedIn f_WT: 1 onsite, 2 remote, 3 hybrid)
        #[arg(short, long, default_value = "2")]
        work_type: String,
        /// Don't restrict to actively hiring postings
        #[arg(long)]
        no_active_filter: bool,
        /// Credentials file for sites with a login
        #[arg(long)]
        credentials: Option<PathBuf>,
    },
    /// List supported sites
    Sites,
    /// Print the Markdown for an HTML file
    Normalize {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape {
            site,
            keywords,
            departments,
            output,
            max_jobs,
            google_sheet,
            headful,
            filters,
            time_range,
            work_type,
            no_active_filter,
            credentials,
        } => {
            let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
            if let Some(dir) = output {
                settings.output_dir = dir;
            }
            if let Some(n) = max_jobs {
                settings.max_jobs = n;
            }
            if headful {
                settings.headful = true;
            }
            if let Some(path) = credentials {
                settings.credentials_file = path;
            }

            let params = SearchParams {
                keywords,
                departments: departments.as_deref().map(parse_departments).unwrap_or_default(),
                max_jobs: settings.max_jobs,
                filters: SearchFilters {
                    raw: filters,
                    time_range: Some(time_range),
                    work_type: Some(work_type),
                    active_only: !no_active_filter,
                },
            };

            let chosen = Site::from_name(&site)?;
            let credentials = if chosen.has_login() {
                crate::config::load_credentials(&settings.credentials_file)
            } else {
                None
            };

            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?;

            let sheet = match google_sheet {
                Some(id) => {
                    let token = settings.sheets.access_token.clone().ok_or_else(|| {
                        anyhow!("--google-sheet needs an access token (JOB_SCRAPER_SHEETS__ACCESS_TOKEN)")
                    })?;
                    let client = GoogleSheetsClient::new(http.clone(), &settings.sheets.api_base, &id, &token);
                    Some(SheetSink::new(Box::new(client)))
                }
                None => None,
            };

            let files = FileSink::new(settings.output_dir.clone());
            let ctx = AdapterContext {
                launcher: Arc::new(ChromiumLauncher),
                settings,
                credentials,
                http,
            };
            let orchestrator = Orchestrator::new(ctx, files, sheet);

            println!("Scraping {} for up to {} jobs...", chosen.info().name, params.max_jobs);
            let summary = orchestrator.run(&site, &params).await?;
            for path in &summary.saved {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                println!("  {}", truncate(&name, 80));
            }
            summary.print();
            Ok(())
        }
        Commands::Sites => {
            println!("{:<12} | {:<10} | {:<6} | {:<8} | {}", "Key", "Name", "Prefix", "Via", "Base URL");
            println!("{}", "-".repeat(72));
            for site in Site::ALL {
                let info = site.info();
                println!(
                    "{:<12} | {:<10} | {:<6} | {:<8} | {}",
                    info.key, info.name, info.prefix, site.transport(), info.base_url
                );
            }
            Ok(())
        }
        Commands::Normalize { file } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            println!("{}", crate::normalize::normalize(&html));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
