//! Harvest configuration: crawl settings and per-site URL rules.
//!
//! Configuration is read from an optional YAML file. Every field has a
//! default, so a file only needs to list what it changes:
//!
//! ```yaml
//! archive_bucket: CC-MAIN-2017-17-index
//! sample_cap: 100
//! sites:
//!   - host: arstechnica.com
//!     pattern_kind: include
//!     pattern: '.+?/201[67]/\d{2}/[\w-]+'
//!   - host: www.kurzweilai.net
//!     pattern_kind: exclude
//!     pattern: '.+?(/page/|robots.txt|/feed|/news/)'
//! ```
//!
//! Patterns are matched from the start of the URL. The `regex` crate has no
//! look-around, so a rule may carry an `unless` pattern: a URL only counts as
//! matching the rule when it matches `pattern` and does not match `unless`.

use crate::error::{HarvestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};

/// Whether a site rule keeps or drops the URLs it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Include,
    Exclude,
}

/// URL eligibility rule for one site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SiteRule {
    /// Host name as it appears in URLs, e.g. `www.wired.com`.
    pub host: String,
    pub pattern_kind: PatternKind,
    pub pattern: String,
    /// Guard pattern; matches of `pattern` that also match this are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless: Option<String>,
}

impl SiteRule {
    pub fn include(host: &str, pattern: &str) -> Self {
        Self {
            host: host.to_string(),
            pattern_kind: PatternKind::Include,
            pattern: pattern.to_string(),
            unless: None,
        }
    }

    pub fn exclude(host: &str, pattern: &str) -> Self {
        Self {
            host: host.to_string(),
            pattern_kind: PatternKind::Exclude,
            pattern: pattern.to_string(),
            unless: None,
        }
    }

    pub fn unless(mut self, pattern: &str) -> Self {
        self.unless = Some(pattern.to_string());
        self
    }

    /// The index query covering every capture on this host.
    pub fn url_query(&self) -> String {
        format!("{}/*", self.host)
    }

    /// Compile the rule's patterns into a [`UrlFilter`].
    pub fn compile(&self) -> Result<UrlFilter> {
        Ok(UrlFilter {
            kind: self.pattern_kind,
            pattern: anchored(&self.pattern)?,
            unless: self.unless.as_deref().map(anchored).transpose()?,
        })
    }
}

/// Compiled form of a [`SiteRule`].
#[derive(Debug, Clone)]
pub struct UrlFilter {
    kind: PatternKind,
    pattern: Regex,
    unless: Option<Regex>,
}

impl UrlFilter {
    /// Whether the URL matches the rule (ignoring whether that keeps or drops it).
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url) && !self.unless.as_ref().is_some_and(|u| u.is_match(url))
    }

    /// Whether the rule leaves the URL eligible for sampling.
    pub fn keeps(&self, url: &str) -> bool {
        match self.kind {
            PatternKind::Include => self.matches(url),
            PatternKind::Exclude => !self.matches(url),
        }
    }
}

/// Compile `pattern` so that it only matches at the start of the input.
pub fn anchored(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})"))?)
}

/// Crawl settings and site rules for every pipeline stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// CommonCrawl index collection to query.
    pub archive_bucket: String,
    /// Base URL of the CommonCrawl index server.
    pub index_host: String,
    /// Base URL WARC filenames are resolved against.
    pub archive_host: String,
    /// Index `filter` parameter.
    pub filter: String,
    pub from: String,
    pub to: String,
    /// Index blocks per result page.
    pub page_size: u32,
    /// Maximum number of miss files kept per site.
    pub sample_cap: usize,
    /// Miss bodies shorter than this many characters are deleted by the cleaner.
    pub min_body_chars: usize,
    pub sites: Vec<SiteRule>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            archive_bucket: "CC-MAIN-2017-17-index".to_string(),
            index_host: "http://index.commoncrawl.org".to_string(),
            archive_host: "https://commoncrawl.s3.amazonaws.com".to_string(),
            filter: "!~filename:crawldiagnostics&mime:text/html&status:200".to_string(),
            from: "2016".to_string(),
            to: "2017".to_string(),
            page_size: 1,
            sample_cap: 100,
            min_body_chars: 1000,
            sites: default_sites(),
        }
    }
}

impl HarvestConfig {
    /// Load the configuration from `path`, or the defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let config: HarvestConfig = serde_yaml::from_str(&text)?;
                info!(path = %path.display(), sites = config.sites.len(), "Loaded configuration");
                config
            }
            None => {
                info!("No configuration file given; using built-in site list");
                HarvestConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(HarvestError::Config("page_size must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for site in &self.sites {
            if site.host.trim().is_empty() {
                return Err(HarvestError::Config("site with empty host".into()));
            }
            if !seen.insert(site.host.as_str()) {
                return Err(HarvestError::Config(format!(
                    "site {} is listed more than once",
                    site.host
                )));
            }
            site.compile()?;
        }
        Ok(())
    }

    /// Rules for the requested host, or for every site when `only` is `None`.
    pub fn select_sites(&self, only: Option<&str>) -> Result<Vec<&SiteRule>> {
        match only {
            None => Ok(self.sites.iter().collect()),
            Some(host) => self
                .sites
                .iter()
                .find(|s| s.host == host)
                .map(|s| vec![s])
                .ok_or_else(|| HarvestError::Config(format!("no rule configured for site {host}"))),
        }
    }
}

/// Sites and article URL shapes used when no configuration file is given.
fn default_sites() -> Vec<SiteRule> {
    vec![
        SiteRule::exclude(
            "theconversation.com",
            r".+?(/topics/|/columns|/feeds|/partners/|robots.txt|/fr|/profiles/)",
        ),
        SiteRule::include("testing.googleblog.com", r".+?/\d{4}/\d{2}/.+"),
        SiteRule::include("arstechnica.com", r".+?/201[67]/\d{2}/[\w-]+"),
        SiteRule::include("www.wired.com", r".+?com/201[67]/\d{2}/[\w-]+"),
        SiteRule::include("dev.to", r".+?dev.to/.+?/.+?").unless(r".+?dev.to/t/"),
        SiteRule::include("blog.openai.com", r".+?blog.openai.com/.+?/")
            .unless(r".+?blog.openai.com/tag/"),
        SiteRule::include("www.theatlantic.com", r".+?/archive/201[67]/\d{2}/.+?"),
        SiteRule::exclude(
            "www.kurzweilai.net",
            r".+?(/page/|robots.txt|/feed|/news/)",
        ),
        SiteRule::include("www.theguardian.com", r".+?/201[67]/\w{3}/\d{2}/[\w-]+"),
        SiteRule::include("medium.com", r".+?/@.+?/[\w-]+")
            .unless(r".+?/@[^/]+/(has-recommended|latest|following)[^/]*/?([?#].*)?$"),
        SiteRule::include(
            "www.breitbart.com",
            r".+?com/.+?/201[67]/\d{2}/\d{2}/[\w-]+",
        )
        .unless(r".+?com/video"),
        SiteRule::include("www.foxnews.com", r".+?/201[67]/\d{2}/\d{2}/[\w-]+"),
    ]
}
