use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;
use tracing::debug;

use crate::record::JobRecord;

static ILLEGAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x08\x0b\x0c\x0e-\x1f\x7f]"#).unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const MAX_NAME_CHARS: usize = 100;
/// Leaves room for the timestamp, counter and extension under the usual
/// 255-byte file name limit.
const MAX_NAME_BYTES: usize = 200;

/// Make `title` safe as a file name stem.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned = ILLEGAL_RE.replace_all(title, "");
    let cut: String = cleaned.trim().chars().take(MAX_NAME_CHARS).collect();
    let mut name = WS_RE.replace_all(&cut, "_").into_owned();
    if name.len() > MAX_NAME_BYTES {
        let mut end = MAX_NAME_BYTES;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
        name.truncate(name.trim_end_matches('_').len());
    }
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name
    }
}

/// `YYYY-MM-DDTHH-MM-SS-mmm`
pub fn file_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3f").to_string()
}

pub fn render_document(record: &JobRecord, scraped_at: &str) -> String {
    format!(
        "# {title}\n\n\
         *Scraped on: {scraped_at}*\n\n\
         *Source: {source}*\n\n\
         *OfferID: {offer_id}*\n\n\
         *Company: {company}*\n\n\
         *URL: {url}*\n\n\
         ---\n\n\
         {description}\n",
        title = record.title,
        source = record.source,
        offer_id = record.offer_id,
        company = record.company,
        url = record.url,
        description = record.description,
    )
}

/// Writes one Markdown document per job.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `record`; returns the written path. Never overwrites an existing file.
    pub fn save(&self, record: &JobRecord, at: &DateTime<Local>) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let stem = format!("{}_{}", sanitize_filename(&record.title), file_timestamp(at));
        let mut path = self.dir.join(format!("{}.md", stem));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}.md", stem, n));
            n += 1;
        }

        std::fs::write(&path, render_document(record, &at.to_rfc3339()))?;
        debug!("Saved {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::normalize::normalize;

    fn record(title: &str) -> JobRecord {
        JobRecord {
            title: title.into(),
            company: "Acme".into(),
            url: "https://jobs.test/job/1".into(),
            offer_id: "TS-1".into(),
            description: normalize("<h1>Engineer</h1><p>Build <strong>systems</strong>.</p>"),
            source: "Test".into(),
        }
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn sanitizing() {
        assert_eq!(sanitize_filename("Senior Rust Engineer"), "Senior_Rust_Engineer");
        assert_eq!(sanitize_filename("C/C++ Dev: <Remote>?"), "CC++_Dev_Remote");
        assert_eq!(sanitize_filename("  tabs\tand\nnewlines  "), "tabs_and_newlines");
        assert_eq!(sanitize_filename("<>:\"/\\|?*"), "untitled");
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename(&"x".repeat(300)).chars().count(), 100);
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let inputs = [
            "Senior Rust Engineer",
            "  a  /  b  ",
            "<>:\"/\\|?*",
            "Zażółć gęślą jaźń @ Kraków",
            &"word ".repeat(40),
            &"高级软件工程师".repeat(20),
            &"Ingénieur ".repeat(30),
        ];
        for input in inputs {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once);
            assert!(!once.contains(['<', '>', ':', '"', '/', '\\', '|', '?', '*']));
        }
    }

    #[test]
    fn multibyte_titles_fit_a_file_name() {
        let name = sanitize_filename(&"高级软件工程师".repeat(20));
        assert!(name.len() <= MAX_NAME_BYTES);
        assert_eq!(name.chars().count(), 66);
        assert!("高级软件工程师".repeat(20).starts_with(&name));
    }

    #[test]
    fn saves_long_multibyte_title() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let path = sink.save(&record(&"高级软件工程师".repeat(20)), &at()).unwrap();
        assert!(path.file_name().unwrap().len() < 255);
        assert!(path.exists());
    }

    #[test]
    fn timestamp_format() {
        let at = at() + chrono::Duration::milliseconds(42);
        assert_eq!(file_timestamp(&at), "2024-03-09T14-05-07-042");
    }

    #[test]
    fn saves_markdown_document() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("out"));
        let path = sink.save(&record("Engineer"), &at()).unwrap();

        assert_eq!(path, dir.path().join("out").join("Engineer_2024-03-09T14-05-07-000.md"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Engineer\n\n*Scraped on: 2024-03-09T14:05:07"));
        assert!(text.contains("*Source: Test*\n\n*OfferID: TS-1*\n\n*Company: Acme*\n\n"));
        assert!(text.contains("*URL: https://jobs.test/job/1*\n\n---\n\n"));
        assert!(text.ends_with("# Engineer\n\nBuild **systems**.\n"));
    }

    #[test]
    fn same_title_same_instant_gets_a_counter() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let first = sink.save(&record("Engineer"), &at()).unwrap();
        let second = sink.save(&record("Engineer"), &at()).unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-000_1.md"));
    }
}
