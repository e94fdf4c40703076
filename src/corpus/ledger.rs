//! Per-site record of sampled misses.
//!
//! The ledger lives next to the articles it describes
//! (`<misses>/<site>/.ledger.json`) and tracks how many article files have been
//! written for the site and which URLs they came from. A folder populated
//! before ledgers existed is adopted by counting its `*.txt` files.

use crate::error::Result;
use crate::utils::list_files_with_extension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

pub const LEDGER_FILE: &str = ".ledger.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SampleLedger {
    /// Number of article files written for the site so far.
    pub count: usize,
    /// URLs already sampled for the site.
    pub urls: BTreeSet<String>,
}

impl SampleLedger {
    pub fn path(site_dir: &Path) -> PathBuf {
        site_dir.join(LEDGER_FILE)
    }

    /// Load the ledger for `site_dir`, seeding it from the files on disk when
    /// none has been written yet.
    #[instrument(level = "debug", skip_all, fields(dir = %site_dir.display()))]
    pub async fn load(site_dir: &Path) -> Result<Self> {
        let path = Self::path(site_dir);
        if fs::try_exists(&path).await? {
            let text = fs::read_to_string(&path).await?;
            let ledger: SampleLedger = serde_json::from_str(&text)?;
            debug!(count = ledger.count, urls = ledger.urls.len(), "Loaded ledger");
            return Ok(ledger);
        }
        let count = list_files_with_extension(site_dir, "txt")?.len();
        debug!(count, "No ledger yet; counted existing article files");
        Ok(Self {
            count,
            urls: BTreeSet::new(),
        })
    }

    pub async fn save(&self, site_dir: &Path) -> Result<()> {
        fs::write(Self::path(site_dir), serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Note that the article numbered `number` was written from `url`.
    pub fn record(&mut self, url: &str, number: usize) {
        self.urls.insert(url.to_string());
        self.count = self.count.max(number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeds_count_from_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=3 {
            std::fs::write(dir.path().join(format!("{n}.txt")), "x").unwrap();
        }
        let ledger = SampleLedger::load(dir.path()).await.unwrap();
        assert_eq!(ledger.count, 3);
        assert!(ledger.urls.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = SampleLedger::default();
        ledger.record("https://a.com/1", 1);
        ledger.record("https://a.com/2", 2);
        ledger.save(dir.path()).await.unwrap();

        // The ledger, not the directory listing, is authoritative once written.
        std::fs::write(dir.path().join("stray.txt"), "x").unwrap();
        let reloaded = SampleLedger::load(dir.path()).await.unwrap();
        assert_eq!(reloaded, ledger);
        assert_eq!(reloaded.count, 2);
        assert!(reloaded.contains("https://a.com/2"));
    }

    #[test]
    fn test_record_never_lowers_count() {
        let mut ledger = SampleLedger {
            count: 10,
            ..SampleLedger::default()
        };
        ledger.record("https://a.com/x", 4);
        assert_eq!(ledger.count, 10);
    }
}
