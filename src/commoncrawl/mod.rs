//! Access to the CommonCrawl index server and WARC archive.
//!
//! Two remote services are involved:
//!
//! | Service | Trait | Module |
//! |---------|-------|--------|
//! | Columnar index (`index.commoncrawl.org`) | [`IndexApi`] | [`index`] |
//! | WARC archive (`commoncrawl.s3.amazonaws.com`) | [`RangeFetch`] | [`records`] |
//!
//! [`CommonCrawlClient`] implements both over `reqwest`. The traits exist so
//! the fetch and extract logic can run against in-memory fakes in tests.
//!
//! Requests are issued one at a time; there is no retry, timeout, or backoff.
//! A failed request aborts the caller.

pub mod index;
pub mod records;

pub use index::IndexApi;
pub use records::{ByteRange, RangeFetch};

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

/// HTTP client for the CommonCrawl index and archive.
#[derive(Debug, Clone)]
pub struct CommonCrawlClient {
    http: Client,
    index_endpoint: String,
    archive_host: String,
    filter: String,
    from: String,
    to: String,
    page_size: u32,
}

impl CommonCrawlClient {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            http: Client::new(),
            index_endpoint: format!(
                "{}/{}",
                config.index_host.trim_end_matches('/'),
                config.archive_bucket
            ),
            archive_host: config.archive_host.trim_end_matches('/').to_string(),
            filter: config.filter.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
            page_size: config.page_size,
        }
    }

    /// Index query URL for `url_query`, either the page count or one page.
    fn index_url(&self, url_query: &str, page: Option<u64>) -> Result<Url> {
        let page_size = self.page_size.to_string();
        let mut params = vec![
            ("url", url_query.to_string()),
            ("output", "json".to_string()),
            ("filter", self.filter.clone()),
            ("pageSize", page_size),
            ("from", self.from.clone()),
            ("to", self.to.clone()),
        ];
        match page {
            Some(page) => params.push(("page", page.to_string())),
            None => params.push(("showNumPages", "true".to_string())),
        }
        Url::parse_with_params(&self.index_endpoint, &params)
            .map_err(|e| HarvestError::Config(format!("bad index endpoint: {e}")))
    }

    fn archive_url(&self, path: &str) -> String {
        format!("{}/{}", self.archive_host, path.trim_start_matches('/'))
    }
}

impl IndexApi for CommonCrawlClient {
    #[instrument(level = "info", skip(self))]
    async fn num_pages(&self, url_query: &str) -> Result<u64> {
        let url = self.index_url(url_query, None)?;
        let res = self.http.get(url.clone()).send().await?;
        let status = res.status();
        let body = res.bytes().await?;
        let pages = page_count_response(url.as_str(), status, &body)?;
        info!(pages, "Index page count");
        Ok(pages)
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_page(&self, url_query: &str, page: u64) -> Result<Vec<Value>> {
        let url = self.index_url(url_query, Some(page))?;
        let res = self.http.get(url.clone()).send().await?;
        let status = res.status();
        let body = res.text().await?;
        let records = index_page_response(url.as_str(), status, &body)?;
        debug!(records = records.len(), %status, "Fetched index page");
        Ok(records)
    }
}

impl RangeFetch for CommonCrawlClient {
    #[instrument(level = "info", skip(self, range), fields(range = %range))]
    async fn fetch_range(&self, path: &str, range: ByteRange) -> Result<Vec<u8>> {
        let url = self.archive_url(path);
        let res = self
            .http
            .get(&url)
            .header("Range", range.header_value())
            .send()
            .await?;
        check_range_status(&url, res.status())?;
        let body = res.bytes().await?;
        info!(%url, bytes = body.len(), "Fetched archive range");
        Ok(body.to_vec())
    }
}

/// Page count from a `showNumPages` answer.
///
/// An unparseable body is a status error when the status was not 2xx, and a
/// JSON error otherwise. An `error` object or a missing `pages` field is a
/// malformed index response.
fn page_count_response(url: &str, status: StatusCode, body: &[u8]) -> Result<u64> {
    let json: Value = serde_json::from_slice(body).map_err(|e| {
        if status.is_success() {
            HarvestError::Json(e)
        } else {
            HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        }
    })?;
    if let Some(err) = json.get("error") {
        return Err(HarvestError::MalformedIndex(format!("page count: {err}")));
    }
    json.get("pages")
        .and_then(Value::as_u64)
        .ok_or_else(|| HarvestError::MalformedIndex(format!("no `pages` field in {json}")))
}

/// Records of one index page.
///
/// The server reports "no captures" and similar as a JSON `error` object with
/// a non-2xx status, so any parseable body is returned whatever the status;
/// only an unparseable one is fatal.
fn index_page_response(url: &str, status: StatusCode, body: &str) -> Result<Vec<Value>> {
    match index::parse_json_lines(body) {
        Ok(records) => Ok(records),
        Err(_) if !status.is_success() => Err(HarvestError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }),
        Err(e) => Err(e),
    }
}

/// Ranged reads must come back as `206 Partial Content`; anything else,
/// including a full `200`, is an error.
fn check_range_status(url: &str, status: StatusCode) -> Result<()> {
    if status == StatusCode::PARTIAL_CONTENT {
        Ok(())
    } else {
        Err(HarvestError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
