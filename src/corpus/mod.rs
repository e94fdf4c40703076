//! Local corpus stages: sampling misses, cleaning, and note export.
//!
//! All stages work on one data directory:
//!
//! ```text
//! data/
//! ├── index/<site>/index_<n>.json     cached index pages
//! ├── misses/<site>/<n>.txt           sampled articles (+ .ledger.json)
//! ├── interesting/*.html              notes exported as HTML
//! ├── processed/<n>.txt               notes converted to article files
//! └── to_analyse/{hits,misses}/       labelled corpus fed to the classifier
//! ```

pub mod cleaner;
pub mod ledger;
pub mod notes;
pub mod sampler;
pub mod sites;

use std::path::{Path, PathBuf};

/// Paths of the pipeline's directories below one data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cached index pages for `host`.
    pub fn index_dir(&self, host: &str) -> PathBuf {
        self.root.join("index").join(host)
    }

    /// Sampled miss articles for `host`.
    pub fn misses_dir(&self, host: &str) -> PathBuf {
        self.root.join("misses").join(host)
    }

    pub fn interesting_dir(&self) -> PathBuf {
        self.root.join("interesting")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    /// Labelled corpus folder for `category` (`hits` or `misses`).
    pub fn to_analyse_dir(&self, category: &str) -> PathBuf {
        self.root.join("to_analyse").join(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::new("data");
        assert_eq!(layout.index_dir("dev.to"), PathBuf::from("data/index/dev.to"));
        assert_eq!(layout.misses_dir("dev.to"), PathBuf::from("data/misses/dev.to"));
        assert_eq!(layout.to_analyse_dir("hits"), PathBuf::from("data/to_analyse/hits"));
        assert_eq!(layout.processed_dir(), PathBuf::from("data/processed"));
        assert_eq!(layout.interesting_dir(), PathBuf::from("data/interesting"));
    }
}
