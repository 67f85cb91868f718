use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};
use crate::models::AssignmentFailure;

/// Source of report pages, keyed by URL.
#[allow(async_fn_in_trait)]
pub trait PageClient {
    async fn get_page(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpPageClient {
    client: reqwest::Client,
}

impl HttpPageClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TriageError::Fetch {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl PageClient for HttpPageClient {
    async fn get_page(&self, url: &str) -> Result<Vec<u8>> {
        let to_error = |e: reqwest::Error| TriageError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(to_error)?;
        let body = response.bytes().await.map_err(to_error)?;
        Ok(body.to_vec())
    }
}

#[derive(Debug, Default)]
pub struct FetchSummary {
    pub fetched: Vec<String>,
    pub cached: Vec<String>,
    pub failures: Vec<AssignmentFailure>,
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://\S+").expect("valid url regex"))
}

/// Last URL mentioned in an index file; the similarity tool prints the
/// results link as its final line.
pub fn find_report_url(index: &str) -> Option<String> {
    index
        .lines()
        .rev()
        .find_map(|line| url_pattern().find(line))
        .map(|m| m.as_str().to_string())
}

pub fn cached_page_path(pages_dir: &Path, assignment: &str) -> PathBuf {
    pages_dir.join(format!("{assignment}.html"))
}

/// Index files in `index_dir` as `(assignment, path)`, sorted by assignment.
pub fn list_index_files(index_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(index_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem() else {
            continue;
        };
        entries.push((stem.to_string_lossy().into_owned(), path));
    }
    entries.sort();
    Ok(entries)
}

/// Download every report page that is not cached yet. Cached pages are never
/// re-fetched; a failing assignment is logged and skipped.
pub async fn fetch_reports<C: PageClient>(
    client: &C,
    index_dir: &Path,
    pages_dir: &Path,
) -> Result<FetchSummary> {
    fs::create_dir_all(pages_dir)?;
    let mut summary = FetchSummary::default();

    for (assignment, index_path) in list_index_files(index_dir)? {
        let target = cached_page_path(pages_dir, &assignment);
        if target.is_file() {
            debug!(assignment = %assignment, "report page already cached");
            summary.cached.push(assignment);
            continue;
        }

        match fetch_one(client, &index_path, &target).await {
            Ok(url) => {
                info!(assignment = %assignment, url = %url, "saved report page");
                summary.fetched.push(assignment);
            }
            Err(err) => {
                warn!(assignment = %assignment, error = %err, "skipping assignment");
                summary.failures.push(AssignmentFailure {
                    assignment,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

async fn fetch_one<C: PageClient>(client: &C, index_path: &Path, target: &Path) -> Result<String> {
    let index = fs::read_to_string(index_path)?;
    let url = find_report_url(&index).ok_or_else(|| TriageError::MissingUrl {
        path: index_path.to_path_buf(),
    })?;
    let body = client.get_page(&url).await?;
    write_atomically(target, &body)?;
    Ok(url)
}

/// Write `contents` next to `target` and rename it into place, so readers
/// never observe a partially written file.
pub fn write_atomically(target: &Path, contents: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(target)?;
    Ok(())
}
