use std::time::Duration;

/// Failures reported by a browser driver.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {:.1}s waiting for {what}", .after.as_secs_f64())]
    Timeout { what: String, after: Duration },

    #[error("element reference is stale")]
    StaleElement,

    #[error("no element matches {0}")]
    NotFound(String),

    #[error("browser session closed")]
    SessionClosed,

    #[error("driver protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// True when the session itself is gone and nothing else on the page can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Launch(_) | DriverError::SessionClosed)
    }
}

/// Everything that can stop or reject a scrape run.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("unknown site '{name}'. Available sites: {available}")]
    UnknownSite { name: String, available: String },

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("search page {url} unreachable: {source}")]
    SearchUnreachable {
        url: String,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("spreadsheet error: {0}")]
    Sheets(String),
}

impl ScrapeError {
    /// Errors that end an adapter run instead of skipping a single job.
    pub fn is_fatal(&self) -> bool {
        match self {
            ScrapeError::Driver(e) => e.is_fatal(),
            ScrapeError::SearchUnreachable { .. }
            | ScrapeError::Http(_)
            | ScrapeError::ApiStatus { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_loss_is_fatal_but_timeouts_are_not() {
        assert!(ScrapeError::Driver(DriverError::SessionClosed).is_fatal());
        assert!(!ScrapeError::Driver(DriverError::StaleElement).is_fatal());
        assert!(ScrapeError::ApiStatus { status: 500, body: String::new() }.is_fatal());
        assert!(!ScrapeError::MissingParameter("keywords".into()).is_fatal());
        let timeout = DriverError::Timeout {
            what: "detail".into(),
            after: Duration::from_secs(10),
        };
        assert!(!timeout.is_fatal());
        assert_eq!(timeout.to_string(), "timed out after 10.0s waiting for detail");
    }

    #[test]
    fn unknown_site_lists_choices() {
        let e = ScrapeError::UnknownSite {
            name: "monster".into(),
            available: "linkedin, hiringcafe".into(),
        };
        assert_eq!(
            e.to_string(),
            "unknown site 'monster'. Available sites: linkedin, hiringcafe"
        );
    }
}
