//! Settings and credentials.
//!
//! Layering, lowest first: built-in defaults, `job_scraper.toml` (or the
//! file given with `--config`), `JOB_SCRAPER_*` environment variables with
//! `__` between nested keys. CLI flags are applied on top by `main`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "job_scraper.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub max_jobs: usize,
    pub headful: bool,
    pub credentials_file: PathBuf,
    pub browser: BrowserSettings,
    pub sheets: SheetsSettings,
    /// Per-site overrides keyed by site key (`linkedin`, `eldorado`, ...).
    pub sites: HashMap<String, SiteOverrides>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("scraped_jobs"),
            max_jobs: 10,
            headful: false,
            credentials_file: PathBuf::from("linkedin_creds.json"),
            browser: BrowserSettings::default(),
            sheets: SheetsSettings::default(),
            sites: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub launch_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub listing_wait_secs: u64,
    pub detail_wait_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .into(),
            window_width: 1920,
            window_height: 1080,
            launch_timeout_secs: 30,
            navigation_timeout_secs: 60,
            listing_wait_secs: 30,
            detail_wait_secs: 10,
            poll_interval_ms: 250,
        }
    }
}

impl BrowserSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn listing_wait(&self) -> Duration {
        Duration::from_secs(self.listing_wait_secs)
    }

    pub fn detail_wait(&self) -> Duration {
        Duration::from_secs(self.detail_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    /// OAuth bearer token with the spreadsheets scope.
    pub access_token: Option<String>,
    pub api_base: String,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base: "https://sheets.googleapis.com".into(),
        }
    }
}

/// Selector chains and delays that replace a site's built-in profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteOverrides {
    pub listing: Option<Vec<String>>,
    pub listing_title: Option<Vec<String>>,
    pub listing_company: Option<Vec<String>>,
    pub detail: Option<Vec<String>>,
    pub title: Option<Vec<String>>,
    pub company: Option<Vec<String>>,
    pub settle_ms: Option<u64>,
    pub job_delay_ms: Option<u64>,
    /// API endpoint for API-backed sites.
    pub endpoint: Option<String>,
}

impl Settings {
    /// Load settings. A missing default file is fine; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("JOB_SCRAPER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        debug!(?settings, "Settings loaded");
        Ok(settings)
    }

    pub fn site(&self, key: &str) -> Option<&SiteOverrides> {
        self.sites.get(key)
    }
}

/// Login credentials. The password never shows up in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn field_re(key: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i)["']?{key}["']?\s*[:=]\s*(?:"([^"]*)"|'([^']*)'|([^\s,;}}]+))"#
    ))
    .unwrap()
}

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| field_re("username"));
static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| field_re("password"));

fn field(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let value = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse loosely structured credential text: JSON, JS object literals,
/// `key = value` lines. Both fields must be present.
pub fn parse_credentials(text: &str) -> Option<Credentials> {
    Some(Credentials {
        username: field(&USERNAME_RE, text)?,
        password: field(&PASSWORD_RE, text)?,
    })
}

/// Read and parse a credentials file. Problems are logged and yield `None`.
pub fn load_credentials(path: &Path) -> Option<Credentials> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!("No credentials from {}: {}; continuing without login", path.display(), e);
            return None;
        }
    };
    let creds = parse_credentials(&text);
    if creds.is_none() {
        warn!("Could not parse credentials in {}; continuing without login", path.display());
    }
    creds
}
