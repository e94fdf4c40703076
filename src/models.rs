//! Data models for index captures and on-disk article files.
//!
//! - [`IndexRecord`]: one capture returned by the CommonCrawl index API
//! - [`ArticleFile`]: an article stored as text with a `---` delimited
//!   metadata block, used for both hits and misses

use crate::error::{HarvestError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_number_from_string;
use std::path::Path;

/// Format used for the `PubDate:` metadata line.
pub const PUB_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DELIMITER: &str = "---";

/// A single capture listed by the CommonCrawl index.
///
/// The index serves `offset` and `length` as strings; they are parsed to
/// integers here. Fields we do not interpret (`status`, `mime`, `digest`,
/// `timestamp`, ...) are kept in `extra` so a record re-serialises unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndexRecord {
    /// The captured URL.
    pub url: String,
    /// Path of the WARC file holding the capture, relative to the archive host.
    pub filename: String,
    /// Byte offset of the gzipped record inside the WARC file.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub offset: u64,
    /// Length in bytes of the gzipped record.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub length: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An article stored on disk.
///
/// ```text
/// ---
/// Title: <string>
/// PubDate: <YYYY-MM-DD HH:MM:SS or empty>
/// Author(s): <comma-separated>
/// ---
/// <body text>
/// ```
///
/// Metadata lines are kept verbatim, so files written by other tools (for
/// example notes carrying `Source:` or `Created:` lines) survive a
/// parse/render cycle. Only lines that are exactly `---` act as delimiters,
/// and only the first two of them; the body is everything after the second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFile {
    /// Raw `Key: value` lines of the metadata block, in file order.
    pub metadata: Vec<String>,
    /// Free text following the metadata block.
    pub body: String,
}

impl ArticleFile {
    /// Build an article with the standard `Title`/`PubDate`/`Author(s)` block.
    pub fn new(
        title: &str,
        pub_date: Option<NaiveDateTime>,
        authors: &[String],
        body: impl Into<String>,
    ) -> Self {
        let pub_date = pub_date
            .map(|d| d.format(PUB_DATE_FORMAT).to_string())
            .unwrap_or_default();
        Self {
            metadata: vec![
                format!("Title: {}", single_line(title)),
                format!("PubDate: {pub_date}"),
                format!("Author(s): {}", single_line(&authors.join(", "))),
            ],
            body: body.into(),
        }
    }

    /// Build an article from a title plus preformatted metadata lines.
    ///
    /// Blank lines in `extra_metadata` are dropped since the block has no
    /// notion of paragraphs.
    pub fn with_metadata(title: &str, extra_metadata: &str, body: impl Into<String>) -> Self {
        let mut metadata = vec![format!("Title: {}", single_line(title))];
        metadata.extend(
            extra_metadata
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && *l != DELIMITER)
                .map(str::to_string),
        );
        Self {
            metadata,
            body: body.into(),
        }
    }

    /// Parse the textual form of an article.
    pub fn parse(text: &str) -> std::result::Result<Self, &'static str> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text.split_inclusive('\n');

        match lines.next() {
            Some(first) if trim_eol(first) == DELIMITER => {}
            _ => return Err("missing opening `---` delimiter"),
        }

        let mut metadata = Vec::new();
        let mut consumed = text.split_inclusive('\n').next().map_or(0, str::len);
        let mut closed = false;
        for line in lines {
            consumed += line.len();
            let line = trim_eol(line);
            if line == DELIMITER {
                closed = true;
                break;
            }
            if !line.trim().is_empty() {
                metadata.push(line.to_string());
            }
        }
        if !closed {
            return Err("missing closing `---` delimiter");
        }

        Ok(Self {
            metadata,
            body: text[consumed..].to_string(),
        })
    }

    /// Read and parse an article file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|reason| HarvestError::MalformedArticle {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })
    }

    /// Render the article to its on-disk form.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 128);
        out.push_str(DELIMITER);
        out.push('\n');
        for line in &self.metadata {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&self.body);
        out
    }

    /// Write the article to `path`, replacing any existing file.
    pub async fn write(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render()).await?;
        Ok(())
    }

    /// Value of the first metadata line named `key`, trimmed.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata.iter().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            (k.trim() == key).then(|| v.trim())
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.field("Title")
    }

    /// Publish date, if present and in [`PUB_DATE_FORMAT`].
    pub fn pub_date(&self) -> Option<NaiveDateTime> {
        self.field("PubDate")
            .filter(|s| !s.is_empty())
            .and_then(|s| NaiveDateTime::parse_from_str(s, PUB_DATE_FORMAT).ok())
    }

    pub fn authors(&self) -> Vec<String> {
        self.field("Author(s)")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `Source:` URL of exported notes.
    pub fn source(&self) -> Option<&str> {
        self.field("Source")
    }

    /// Body length in characters, the unit the cleaner's threshold uses.
    pub fn body_chars(&self) -> usize {
        self.body.chars().count()
    }
}

fn trim_eol(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

// Metadata values must not spill onto a second line.
fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_index_record_parses_string_numbers() {
        let json = r#"{"urlkey": "com,arstechnica)/2017/05/foo", "timestamp": "20170423120000",
            "url": "https://arstechnica.com/2017/05/foo", "mime": "text/html", "status": "200",
            "length": "16650", "offset": "64016172",
            "filename": "crawl-data/CC-MAIN-2017-17/segments/1492917118707.23/warc/CC-MAIN-20170423031158-00001-ip-10-145-167-34.ec2.internal.warc.gz"}"#;
        let record: IndexRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.url, "https://arstechnica.com/2017/05/foo");
        assert_eq!(record.offset, 64016172);
        assert_eq!(record.length, 16650);
        assert_eq!(record.extra["status"], "200");
    }

    #[test]
    fn test_index_record_keeps_unknown_fields() {
        let json = r#"{"url": "http://a.com/", "filename": "f.warc.gz", "offset": 1, "length": 2, "digest": "ABC"}"#;
        let record: IndexRecord = serde_json::from_str(json).unwrap();
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["digest"], "ABC");
        assert_eq!(back["offset"], 1);
    }

    #[test]
    fn test_article_round_trip() {
        let date = NaiveDate::from_ymd_opt(2017, 5, 2)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        let authors = vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()];
        let body = "First paragraph.\n\n---\nNot a delimiter for us.\n";
        let article = ArticleFile::new("On Engines", Some(date), &authors, body);

        let text = article.render();
        assert!(text.starts_with("---\nTitle: On Engines\nPubDate: 2017-05-02 13:45:00\n"));

        let parsed = ArticleFile::parse(&text).unwrap();
        assert_eq!(parsed.title(), Some("On Engines"));
        assert_eq!(parsed.pub_date(), Some(date));
        assert_eq!(parsed.authors(), authors);
        assert_eq!(parsed.body, body);
    }

    #[test]
    fn test_article_without_date_or_authors() {
        let article = ArticleFile::new("Untitled", None, &[], "body");
        let text = article.render();
        assert!(text.contains("PubDate: \n"));
        assert!(text.contains("Author(s): \n"));

        let parsed = ArticleFile::parse(&text).unwrap();
        assert_eq!(parsed.pub_date(), None);
        assert!(parsed.authors().is_empty());
    }

    #[test]
    fn test_title_is_kept_on_one_line() {
        let article = ArticleFile::new("Broken\nheadline", None, &[], "");
        assert_eq!(article.title(), Some("Broken headline"));
    }

    #[test]
    fn test_parse_note_metadata() {
        let text = "---\nTitle: Saved note\nCreated: 2017-01-01\nSource: https://medium.com/@x/y\n---\nBody";
        let parsed = ArticleFile::parse(text).unwrap();
        assert_eq!(parsed.source(), Some("https://medium.com/@x/y"));
        assert_eq!(parsed.field("Created"), Some("2017-01-01"));
        assert_eq!(parsed.render(), text);
    }

    #[test]
    fn test_parse_rejects_missing_delimiters() {
        assert!(ArticleFile::parse("Title: x\n---\nbody").is_err());
        assert!(ArticleFile::parse("---\nTitle: x\nbody").is_err());
    }

    #[test]
    fn test_body_chars_counts_characters() {
        let article = ArticleFile::new("t", None, &[], "héllo");
        assert_eq!(article.body_chars(), 5);
    }
}
