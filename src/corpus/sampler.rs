//! Sampling misses: filter a site's index, draw a random sample, and store
//! each sampled capture as an article file.
//!
//! For every site the sampler:
//!
//! 1. Loads the cached index pages.
//! 2. Drops PDFs and `robots.txt`, then applies the site's include/exclude rule.
//! 3. Drops URLs the site's ledger says were sampled before.
//! 4. Draws `min(candidates, cap - existing + 1)` records uniformly at random,
//!    where `existing` is the ledger count (at least 1).
//! 5. Fetches each sampled capture's WARC response, extracts the article and
//!    writes it as `<n>.txt`, numbering from `existing`.
//!
//! Starting the numbering at `existing` means the first new article replaces
//! the highest-numbered one already present; together with the `+1` in the
//! cap this keeps a site's folder at no more than `cap` files.

use crate::commoncrawl::RangeFetch;
use crate::commoncrawl::index::load_index;
use crate::commoncrawl::records::{content_type, fetch_record, http_response_parts};
use crate::config::{SiteRule, UrlFilter, anchored};
use crate::corpus::DataLayout;
use crate::corpus::ledger::SampleLedger;
use crate::encoding::decode_html;
use crate::error::Result;
use crate::extract::extract_article;
use crate::models::{ArticleFile, IndexRecord};
use crate::utils::{collapse_blank_lines, truncate_for_log};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use warc::WarcHeader;

/// URLs never worth sampling, whatever the site rule says.
static UNIVERSAL_EXCLUSION: Lazy<Regex> =
    Lazy::new(|| anchored(r".+?(.pdf$|robots.txt)").expect("universal exclusion is valid"));

/// Knobs for one sampling run.
#[derive(Debug, Clone, Copy)]
pub struct SampleOptions {
    /// Maximum number of miss files per site.
    pub sample_cap: usize,
    /// Only report what would be sampled.
    pub dry_run: bool,
}

/// Outcome of sampling one site.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SiteSampleReport {
    pub site: String,
    /// Index records loaded for the site.
    pub total: usize,
    /// Records left after URL filtering.
    pub candidates: usize,
    /// Candidates skipped because the ledger already holds their URL.
    pub already_sampled: usize,
    pub sample_size: usize,
    pub written: usize,
    /// Sampled captures whose chunk held no usable response record.
    pub missing_response: usize,
}

/// How many records to draw given `candidates` eligible records and
/// `existing` files already in the site's folder.
///
/// `existing` is counted as at least 1, so an empty folder allows `cap`
/// new files.
pub fn sample_size(candidates: usize, existing: usize, cap: usize) -> usize {
    let existing = existing.max(1);
    candidates.min((cap + 1).saturating_sub(existing))
}

/// Records eligible for sampling under `filter`.
pub fn filter_candidates<'a>(
    records: &'a [IndexRecord],
    filter: &UrlFilter,
) -> Vec<&'a IndexRecord> {
    records
        .iter()
        .filter(|r| !UNIVERSAL_EXCLUSION.is_match(&r.url))
        .filter(|r| filter.keeps(&r.url))
        .collect()
}

/// Draw `amount` distinct items uniformly at random, in random order.
pub fn draw<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &[&'a T], amount: usize) -> Vec<&'a T> {
    rand::seq::index::sample(rng, items.len(), amount.min(items.len()))
        .into_iter()
        .map(|i| items[i])
        .collect()
}

/// Sample every site in `sites`, one after another.
pub async fn sample_sites<F: RangeFetch, R: Rng + ?Sized>(
    fetcher: &F,
    rng: &mut R,
    sites: &[&SiteRule],
    layout: &DataLayout,
    options: SampleOptions,
) -> Result<Vec<SiteSampleReport>> {
    let mut reports = Vec::with_capacity(sites.len());
    for site in sites {
        let report = sample_site(
            fetcher,
            rng,
            site,
            &layout.index_dir(&site.host),
            &layout.misses_dir(&site.host),
            options,
        )
        .await?;
        reports.push(report);
    }
    Ok(reports)
}

/// Sample one site's index into `site_dir`.
#[instrument(level = "info", skip_all, fields(site = %site.host))]
pub async fn sample_site<F: RangeFetch, R: Rng + ?Sized>(
    fetcher: &F,
    rng: &mut R,
    site: &SiteRule,
    index_dir: &Path,
    site_dir: &Path,
    options: SampleOptions,
) -> Result<SiteSampleReport> {
    let filter = site.compile()?;
    let records = load_index(index_dir)?;
    info!(total = records.len(), "Loaded index records");

    let eligible = filter_candidates(&records, &filter);
    info!(candidates = eligible.len(), "Filtered candidate pages");

    let mut ledger = SampleLedger::load(site_dir).await?;

    // An index can list the same URL more than once.
    let fresh: Vec<&IndexRecord> = eligible
        .iter()
        .copied()
        .filter(|r| !ledger.contains(&r.url))
        .unique_by(|r| r.url.as_str())
        .collect();

    let existing = ledger.count.max(1);
    let size = sample_size(fresh.len(), existing, options.sample_cap);
    let mut report = SiteSampleReport {
        site: site.host.clone(),
        total: records.len(),
        candidates: eligible.len(),
        already_sampled: eligible.iter().filter(|r| ledger.contains(&r.url)).count(),
        sample_size: size,
        ..SiteSampleReport::default()
    };
    info!(existing = ledger.count, sample_size = size, "Drawing sample");

    let sampled = draw(rng, &fresh, size);
    if options.dry_run {
        for record in &sampled {
            info!(url = %record.url, "Would sample");
        }
        return Ok(report);
    }
    fs::create_dir_all(site_dir).await?;

    // Fetches run strictly one after another.
    let mut fetched = std::pin::pin!(stream::iter(sampled).then(|record| async move {
        let article = fetch_article(fetcher, record).await;
        (record, article)
    }));

    let mut number = existing;
    while let Some((record, article)) = fetched.next().await {
        let Some(article) = article? else {
            report.missing_response += 1;
            continue;
        };
        let path = site_dir.join(format!("{number}.txt"));
        article.write(&path).await?;
        ledger.record(&record.url, number);
        ledger.save(site_dir).await?;
        debug!(
            path = %path.display(),
            url = %record.url,
            pub_date = ?article.pub_date(),
            authors = article.authors().len(),
            "Wrote article"
        );
        number += 1;
        report.written += 1;
    }

    info!(
        written = report.written,
        missing_response = report.missing_response,
        "Site sampled"
    );
    Ok(report)
}

/// Fetch one capture and turn it into an article file.
///
/// `Ok(None)` when the chunk has no response record or the response has no
/// payload.
#[instrument(level = "info", skip_all, fields(url = %record.url))]
async fn fetch_article<F: RangeFetch>(
    fetcher: &F,
    record: &IndexRecord,
) -> Result<Option<ArticleFile>> {
    let Some(warc_record) = fetch_record(
        fetcher,
        &record.filename,
        record.offset,
        record.length,
        WarcHeader::WarcType,
        "response",
    )
    .await?
    else {
        warn!("No response record in WARC chunk");
        return Ok(None);
    };

    let target = warc_record
        .header(WarcHeader::TargetURI)
        .map(|uri| uri.into_owned())
        .unwrap_or_else(|| record.url.clone());

    let Some((headers, payload)) = http_response_parts(warc_record.body()) else {
        warn!(%target, "Response record has no HTTP payload");
        return Ok(None);
    };
    let html = decode_html(content_type(headers).as_deref(), payload);
    debug!(preview = %truncate_for_log(&html, 200), "Response payload");

    let extracted = extract_article(&html, &target);
    let body = collapse_blank_lines(&extracted.body);
    Ok(Some(ArticleFile::new(
        &extracted.title,
        extracted.pub_date,
        &extracted.authors,
        body,
    )))
}
