//! Pruning the misses corpus against the hits.
//!
//! A miss is removed when its body is too short to be an article, or when its
//! title matches a hit exactly (the same story got sampled as a miss).

use crate::error::Result;
use crate::models::ArticleFile;
use crate::utils::list_article_files;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// What a cleaning pass found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub scanned: usize,
    pub deleted_short: usize,
    pub deleted_duplicate: usize,
    /// Files whose metadata block could not be parsed.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    TooShort,
    DuplicateTitle,
}

/// Trimmed titles of every article below `hits_dir`.
///
/// Unreadable hits are logged and ignored.
pub fn collect_titles(hits_dir: &Path) -> HashSet<String> {
    list_article_files(hits_dir)
        .into_iter()
        .filter_map(|path| match ArticleFile::read(&path) {
            Ok(article) => article.title().map(str::to_string),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable hit");
                None
            }
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn judge(article: &ArticleFile, hit_titles: &HashSet<String>, min_body_chars: usize) -> Verdict {
    if article.body_chars() < min_body_chars {
        Verdict::TooShort
    } else if article.title().is_some_and(|t| hit_titles.contains(t)) {
        Verdict::DuplicateTitle
    } else {
        Verdict::Keep
    }
}

/// Delete misses below `misses_dir` that are shorter than `min_body_chars`
/// or share a title with a hit below `hits_dir`.
///
/// With `dry_run` the files are only reported.
#[instrument(
    level = "info",
    skip_all,
    fields(hits = %hits_dir.display(), misses = %misses_dir.display())
)]
pub async fn clean_misses(
    hits_dir: &Path,
    misses_dir: &Path,
    min_body_chars: usize,
    dry_run: bool,
) -> Result<CleanReport> {
    let hit_titles = collect_titles(hits_dir);
    info!(hits = hit_titles.len(), "Collected hit titles");

    let mut report = CleanReport::default();
    let mut doomed: Vec<(PathBuf, Verdict)> = Vec::new();

    for path in list_article_files(misses_dir) {
        report.scanned += 1;
        let article = match ArticleFile::read(&path) {
            Ok(article) => article,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping malformed miss");
                report.skipped += 1;
                continue;
            }
        };
        match judge(&article, &hit_titles, min_body_chars) {
            Verdict::Keep => {}
            Verdict::TooShort => {
                report.deleted_short += 1;
                doomed.push((path, Verdict::TooShort));
            }
            Verdict::DuplicateTitle => {
                report.deleted_duplicate += 1;
                doomed.push((path, Verdict::DuplicateTitle));
            }
        }
    }

    for (path, verdict) in &doomed {
        if dry_run {
            info!(path = %path.display(), ?verdict, "Would delete");
        } else {
            fs::remove_file(path).await?;
            info!(path = %path.display(), ?verdict, "Deleted");
        }
    }

    info!(
        scanned = report.scanned,
        deleted_short = report.deleted_short,
        deleted_duplicate = report.deleted_duplicate,
        skipped = report.skipped,
        dry_run,
        "Cleaning finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_article(path: &Path, title: &str, body_chars: usize) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let article = ArticleFile::new(title, None, &[], "x".repeat(body_chars));
        std::fs::write(path, article.render()).unwrap();
    }

    #[tokio::test]
    async fn test_deletes_short_and_duplicate_misses() {
        let root = tempfile::tempdir().unwrap();
        let hits = root.path().join("hits");
        let misses = root.path().join("misses");

        write_article(&hits.join("notes/1.txt"), "Shared Story", 3000);
        write_article(&misses.join("a.com/1.txt"), "Tiny", 500);
        write_article(&misses.join("a.com/2.txt"), "Shared Story", 1500);
        write_article(&misses.join("b.com/1.txt"), "Unique Story", 1500);
        std::fs::write(misses.join("b.com/2.txt"), "no delimiters here").unwrap();

        let report = clean_misses(&hits, &misses, 1000, false).await.unwrap();

        assert_eq!(
            report,
            CleanReport {
                scanned: 4,
                deleted_short: 1,
                deleted_duplicate: 1,
                skipped: 1,
            }
        );
        assert!(!misses.join("a.com/1.txt").exists());
        assert!(!misses.join("a.com/2.txt").exists());
        assert!(misses.join("b.com/1.txt").exists());
        assert!(misses.join("b.com/2.txt").exists());
    }

    #[tokio::test]
    async fn test_dry_run_keeps_files() {
        let root = tempfile::tempdir().unwrap();
        let misses = root.path().join("misses");
        write_article(&misses.join("a.com/1.txt"), "Tiny", 10);

        let report = clean_misses(&root.path().join("hits"), &misses, 1000, true)
            .await
            .unwrap();
        assert_eq!(report.deleted_short, 1);
        assert!(misses.join("a.com/1.txt").exists());
    }

    #[test]
    fn test_length_checked_before_title() {
        let titles: HashSet<String> = ["Same".to_string()].into();
        let short = ArticleFile::new("Same", None, &[], "x".repeat(999));
        assert_eq!(judge(&short, &titles, 1000), Verdict::TooShort);
        let exactly = ArticleFile::new("Other", None, &[], "é".repeat(1000));
        assert_eq!(judge(&exactly, &titles, 1000), Verdict::Keep);
    }
}
