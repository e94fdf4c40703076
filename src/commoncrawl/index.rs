//! Index fetching: pull every index page for a site and cache it on disk.
//!
//! The CommonCrawl index answers a `showNumPages` query with the number of
//! result pages for a URL glob, then serves each page as JSON lines. Each page
//! is cached as `index_<n>.json` (a JSON array) under the site's index
//! directory. Pages already on disk are never requested again, so an
//! interrupted run can simply be restarted.

use crate::config::SiteRule;
use crate::error::{HarvestError, Result};
use crate::models::IndexRecord;
use crate::utils::list_files_with_extension;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Read access to the CommonCrawl columnar index.
pub trait IndexApi {
    /// Number of result pages for `url_query`.
    async fn num_pages(&self, url_query: &str) -> Result<u64>;

    /// One page of results for `url_query`, as raw JSON objects.
    async fn fetch_page(&self, url_query: &str, page: u64) -> Result<Vec<Value>>;
}

/// Outcome of fetching one site's index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Pages the server reported for the query.
    pub pages: u64,
    /// Pages fetched and written during this run.
    pub written: u64,
    /// Pages skipped because their file already existed.
    pub already_fetched: u64,
    /// Pages the server answered with an `error` object.
    pub errors: u64,
}

/// Cache file for page `page` inside a site's index directory.
pub fn page_file_name(page: u64) -> String {
    format!("index_{page}.json")
}

/// Fetch and persist every index page for `site` into `index_dir`.
///
/// Pages whose file exists are skipped. A page that comes back as a single
/// object with an `error` key is logged and skipped without writing a file;
/// it will be requested again on the next run. Transport failures propagate.
#[instrument(level = "info", skip_all, fields(site = %site.host))]
pub async fn fetch_site_index<A: IndexApi>(
    api: &A,
    site: &SiteRule,
    index_dir: &Path,
) -> Result<FetchReport> {
    fs::create_dir_all(index_dir).await?;

    let query = site.url_query();
    let pages = api.num_pages(&query).await?;
    info!(pages, "Fetching index pages");

    let mut report = FetchReport {
        pages,
        ..FetchReport::default()
    };

    for page in 0..pages {
        let path = index_dir.join(page_file_name(page));
        if fs::try_exists(&path).await? {
            debug!(page, "Already fetched, skipping");
            report.already_fetched += 1;
            continue;
        }

        info!(page = page + 1, of = pages, "Fetching index page");
        let records = api.fetch_page(&query, page).await?;
        if let Some(error) = error_message(&records) {
            warn!(page, %error, "Index server returned an error; skipping page");
            report.errors += 1;
            continue;
        }

        // A page file on disk is always complete.
        let partial = path.with_extension("json.tmp");
        fs::write(&partial, serde_json::to_string(&records)?).await?;
        fs::rename(&partial, &path).await?;
        report.written += 1;
    }

    info!(
        written = report.written,
        already_fetched = report.already_fetched,
        errors = report.errors,
        "Index fetch complete"
    );
    Ok(report)
}

/// The `error` text of a page that consists of a single error object.
fn error_message(records: &[Value]) -> Option<String> {
    match records {
        [only] => only.get("error").map(|e| match e.as_str() {
            Some(s) => s.to_string(),
            None => e.to_string(),
        }),
        _ => None,
    }
}

/// Parse a JSON-lines body, ignoring blank lines.
pub fn parse_json_lines(body: &str) -> Result<Vec<Value>> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str::<Value>(l).map_err(HarvestError::from))
        .collect()
}

/// Load every cached index page in `index_dir` into one list.
///
/// Entries that do not describe a capture (missing `url`, `filename`,
/// `offset` or `length`) are skipped with a warning. A missing directory
/// yields an empty list.
#[instrument(level = "info", skip_all, fields(dir = %index_dir.display()))]
pub fn load_index(index_dir: &Path) -> Result<Vec<IndexRecord>> {
    let mut records = Vec::new();
    let files = list_files_with_extension(index_dir, "json")?;
    for path in files.iter().filter(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("index"))
    }) {
        let text = std::fs::read_to_string(path)?;
        let entries: Vec<Value> = serde_json::from_str(&text)?;
        for entry in entries {
            match serde_json::from_value::<IndexRecord>(entry) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping malformed index entry")
                }
            }
        }
    }
    info!(records = records.len(), "Loaded index");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory index server.
    struct FakeIndex {
        pages: HashMap<u64, Vec<Value>>,
        page_count: u64,
        requested: RefCell<Vec<u64>>,
    }

    impl FakeIndex {
        fn new(page_count: u64) -> Self {
            let pages = (0..page_count)
                .map(|p| {
                    (
                        p,
                        vec![json!({
                            "url": format!("https://arstechnica.com/2017/05/story-{p}"),
                            "filename": "crawl-data/x.warc.gz",
                            "offset": (p * 1000).to_string(),
                            "length": "500",
                            "status": "200",
                        })],
                    )
                })
                .collect();
            Self {
                pages,
                page_count,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl IndexApi for FakeIndex {
        async fn num_pages(&self, _url_query: &str) -> Result<u64> {
            Ok(self.page_count)
        }

        async fn fetch_page(&self, _url_query: &str, page: u64) -> Result<Vec<Value>> {
            self.requested.borrow_mut().push(page);
            Ok(self.pages.get(&page).cloned().unwrap_or_default())
        }
    }

    fn site() -> SiteRule {
        SiteRule::include("arstechnica.com", r".+?/201[67]/\d{2}/[\w-]+")
    }

    #[tokio::test]
    async fn test_fetch_writes_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeIndex::new(3);

        let report = fetch_site_index(&api, &site(), dir.path()).await.unwrap();
        assert_eq!(report.pages, 3);
        assert_eq!(report.written, 3);
        for p in 0..3 {
            assert!(dir.path().join(page_file_name(p)).exists());
        }

        let records = load_index(dir.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().any(|r| r.offset == 2000 && r.length == 500));
    }

    #[tokio::test]
    async fn test_refetch_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeIndex::new(4);
        fetch_site_index(&api, &site(), dir.path()).await.unwrap();
        assert_eq!(api.requested.borrow().len(), 4);

        let report = fetch_site_index(&api, &site(), dir.path()).await.unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.already_fetched, 4);
        assert_eq!(api.requested.borrow().len(), 4);
    }

    #[tokio::test]
    async fn test_resumes_missing_pages_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(page_file_name(0)), "[]").unwrap();
        let api = FakeIndex::new(2);

        let report = fetch_site_index(&api, &site(), dir.path()).await.unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(*api.requested.borrow(), vec![1]);
    }

    #[tokio::test]
    async fn test_leftover_partial_page_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("index_0.json.tmp");
        std::fs::write(&partial, "[{\"url\": \"https://arst").unwrap();
        let api = FakeIndex::new(1);

        let report = fetch_site_index(&api, &site(), dir.path()).await.unwrap();
        assert_eq!(report.written, 1);
        assert!(!partial.exists());
        assert_eq!(load_index(dir.path()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_page_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut api = FakeIndex::new(2);
        api.pages
            .insert(1, vec![json!({"error": "No Captures found for: arstechnica.com/*"})]);

        let report = fetch_site_index(&api, &site(), dir.path()).await.unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.errors, 1);
        assert!(!dir.path().join(page_file_name(1)).exists());
    }

    #[test]
    fn test_parse_json_lines() {
        let body = "{\"url\": \"a\"}\n\n{\"url\": \"b\"}\n";
        let values = parse_json_lines(body).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["url"], "b");
        assert!(parse_json_lines("<html>busy</html>").is_err());
    }

    #[test]
    fn test_load_index_skips_malformed_entries_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index_0.json"),
            r#"[{"url": "https://a.com/1", "filename": "f", "offset": "1", "length": "2"}, {"url": "no location"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.json"), "not json").unwrap();

        let records = load_index(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://a.com/1");
    }

    #[test]
    fn test_load_index_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_index(&dir.path().join("absent")).unwrap().is_empty());
    }
}
