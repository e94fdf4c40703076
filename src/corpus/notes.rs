//! Converting notes exported as HTML into article files.
//!
//! Each export is one HTML page per note: the note title in `<title>`, a
//! metadata table (`Created:`, `Source:`, `Tags:` rows) and the note content
//! in the second `<div>` of the page. The exporter also writes an index page,
//! which is ignored.

use crate::error::Result;
use crate::models::ArticleFile;
use crate::utils::{collapse_blank_lines, list_files_with_extension};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Index page written alongside the notes.
pub const NOTES_INDEX_FILE: &str = "Evernote_index.html";

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").expect("valid selector"));
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").expect("valid selector"));

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    pub skipped: usize,
}

/// Convert one exported note page, or `None` when it lacks a title or content.
pub fn convert_note(html: &str) -> Option<ArticleFile> {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())?;
    let metadata = document
        .select(&TABLE)
        .next()
        .map(table_lines)
        .unwrap_or_default();
    let content = document.select(&DIV).nth(1)?;
    let body = collapse_blank_lines(content.text().collect::<String>().trim());

    Some(ArticleFile::with_metadata(&title, &metadata, body))
}

/// The table as `Key: value` lines, one per row.
fn table_lines(table: ElementRef<'_>) -> String {
    let rows: Vec<String> = table
        .select(&ROW)
        .map(|row| {
            row.select(&CELL)
                .map(|cell| cell.text().collect::<String>().split_whitespace().join(" "))
                .filter(|c| !c.is_empty())
                .join(" ")
        })
        .filter(|r| !r.is_empty())
        .collect();
    if rows.is_empty() {
        table.text().collect::<String>().trim().to_string()
    } else {
        rows.join("\n")
    }
}

/// Export every note page in `interesting_dir` into `processed_dir` as
/// `1.txt`, `2.txt`, ... in file name order.
#[instrument(
    level = "info",
    skip_all,
    fields(from = %interesting_dir.display(), to = %processed_dir.display())
)]
pub async fn export_notes(interesting_dir: &Path, processed_dir: &Path) -> Result<ExportReport> {
    fs::create_dir_all(processed_dir).await?;
    let mut report = ExportReport::default();
    let mut number = 1usize;

    for path in list_files_with_extension(interesting_dir, "html")? {
        if path.file_name().is_some_and(|n| n == NOTES_INDEX_FILE) {
            debug!("Ignoring notes index page");
            continue;
        }
        let html = fs::read_to_string(&path).await?;
        let Some(article) = convert_note(&html) else {
            warn!(path = %path.display(), "Note has no title or content; skipping");
            report.skipped += 1;
            continue;
        };
        let out = processed_dir.join(format!("{number}.txt"));
        article.write(&out).await?;
        debug!(note = %path.display(), out = %out.display(), "Exported note");
        number += 1;
        report.exported += 1;
    }

    info!(exported = report.exported, skipped = report.skipped, "Notes exported");
    Ok(report)
}
