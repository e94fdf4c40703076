//! Article field extraction from captured HTML.
//!
//! A light heuristic extractor: it reads the title, authors and publish date
//! from common meta tags (Open Graph, Dublin Core, schema.org `itemprop`) and
//! builds the body from paragraph text, preferring paragraphs inside an
//! `<article>` element. It does not attempt boilerplate scoring.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

/// Fields pulled from an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub body: String,
    pub pub_date: Option<NaiveDateTime>,
    pub authors: Vec<String>,
}

const TITLE_META: &[&str] = &["og:title", "twitter:title", "dc.title", "title"];

const AUTHOR_META: &[&str] = &[
    "author",
    "article:author",
    "dc.creator",
    "byl",
    "sailthru.author",
    "parsely-author",
];

const DATE_META: &[&str] = &[
    "article:published_time",
    "og:article:published_time",
    "article:published",
    "datepublished",
    "dc.date",
    "dc.date.issued",
    "dcterms.created",
    "date",
    "pubdate",
    "publish_date",
    "publishdate",
    "sailthru.date",
    "parsely-pub-date",
];

static META: Lazy<Selector> = Lazy::new(|| sel("meta"));
static TITLE: Lazy<Selector> = Lazy::new(|| sel("title"));
static H1: Lazy<Selector> = Lazy::new(|| sel("h1"));
static TIME: Lazy<Selector> = Lazy::new(|| sel("time[datetime]"));
static AUTHOR_NODES: Lazy<Selector> =
    Lazy::new(|| sel(r#"[rel="author"], [itemprop="author"], .byline-author, .author-name"#));
static ARTICLE_PARAGRAPHS: Lazy<Selector> = Lazy::new(|| sel("article p"));
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| sel("p"));
static URL_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})(?:/|$)").expect("URL date pattern is valid")
});

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// Extract title, body, publish date and authors from `html`.
///
/// `url` is only used as a fallback source for the publish date
/// (`/YYYY/MM/DD/` path segments).
#[instrument(level = "debug", skip(html))]
pub fn extract_article(html: &str, url: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);

    let title = meta_content(&document, TITLE_META)
        .or_else(|| first_text(&document, &TITLE))
        .or_else(|| first_text(&document, &H1))
        .unwrap_or_default();

    let pub_date = meta_content(&document, DATE_META)
        .as_deref()
        .and_then(parse_date)
        .or_else(|| {
            document
                .select(&TIME)
                .filter_map(|t| t.value().attr("datetime"))
                .find_map(parse_date)
        })
        .or_else(|| date_from_url(url));

    let authors = extract_authors(&document);
    let body = extract_body(&document);

    debug!(
        %title,
        ?pub_date,
        authors = authors.len(),
        body_chars = body.chars().count(),
        "Extracted article fields"
    );
    ExtractedArticle {
        title,
        body,
        pub_date,
        authors,
    }
}

/// Content of the first `<meta>` whose name/property/itemprop is in `names`,
/// honouring the order of `names`.
fn meta_content(document: &Html, names: &[&str]) -> Option<String> {
    let metas: Vec<(String, &str)> = document
        .select(&META)
        .filter_map(|m| {
            let v = m.value();
            let name = v
                .attr("property")
                .or_else(|| v.attr("name"))
                .or_else(|| v.attr("itemprop"))?;
            let content = v.attr("content")?.trim();
            (!content.is_empty()).then(|| (name.to_ascii_lowercase(), content))
        })
        .collect();

    names.iter().find_map(|wanted| {
        metas
            .iter()
            .find(|(name, _)| name == wanted)
            .map(|(_, content)| normalize_whitespace(content))
    })
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

fn extract_authors(document: &Html) -> Vec<String> {
    let from_meta = document
        .select(&META)
        .filter(|m| {
            let v = m.value();
            v.attr("name")
                .or_else(|| v.attr("property"))
                .is_some_and(|n| AUTHOR_META.contains(&n.to_ascii_lowercase().as_str()))
        })
        .filter_map(|m| m.value().attr("content").map(str::to_string));
    let from_nodes = document.select(&AUTHOR_NODES).map(element_text);

    from_meta
        .chain(from_nodes)
        .flat_map(|raw| split_authors(&raw))
        .filter(|a| is_plausible_name(a))
        .unique_by(|a| a.to_lowercase())
        .collect()
}

fn split_authors(raw: &str) -> Vec<String> {
    let raw = normalize_whitespace(raw);
    let raw = raw
        .strip_prefix("By ")
        .or_else(|| raw.strip_prefix("by "))
        .unwrap_or(&raw);
    raw.split([',', '|', '&'])
        .flat_map(|part| part.split(" and "))
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

// Profile URLs and long blurbs are not names.
fn is_plausible_name(s: &str) -> bool {
    !s.contains("://") && !s.starts_with('@') && s.split_whitespace().count() <= 5
}

fn extract_body(document: &Html) -> String {
    let mut paragraphs: Vec<String> = document
        .select(&ARTICLE_PARAGRAPHS)
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.is_empty() {
        paragraphs = document
            .select(&PARAGRAPHS)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect();
    }
    paragraphs.join("\n\n")
}

/// Parse the date formats commonly found in article metadata.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn date_from_url(url: &str) -> Option<NaiveDateTime> {
    let caps = URL_DATE.captures(url)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head>
  <title>Fallback title | Site</title>
  <meta property="og:title" content="The Real   Title">
  <meta name="author" content="Jane Doe and John Smith">
  <meta property="article:published_time" content="2017-05-02T13:45:00+00:00">
  <meta name="twitter:creator" content="@janedoe">
</head><body>
  <nav><p>Subscribe now</p></nav>
  <article>
    <h1>The Real Title</h1>
    <span rel="author">Jane Doe</span>
    <p>First   paragraph of the story.</p>
    <p></p>
    <p>Second paragraph.</p>
  </article>
</body></html>"#;

    #[test]
    fn test_extracts_all_fields() {
        let article = extract_article(PAGE, "https://arstechnica.com/2017/05/a-story/");
        assert_eq!(article.title, "The Real Title");
        assert_eq!(article.body, "First paragraph of the story.\n\nSecond paragraph.");
        assert_eq!(
            article.pub_date,
            NaiveDate::from_ymd_opt(2017, 5, 2).unwrap().and_hms_opt(13, 45, 0)
        );
        assert_eq!(article.authors, vec!["Jane Doe", "John Smith"]);
    }

    #[test]
    fn test_falls_back_to_title_tag_and_all_paragraphs() {
        let html = "<html><head><title> Plain page </title></head><body><p>One</p><div><p>Two</p></div></body></html>";
        let article = extract_article(html, "https://example.com/about");
        assert_eq!(article.title, "Plain page");
        assert_eq!(article.body, "One\n\nTwo");
        assert_eq!(article.pub_date, None);
        assert!(article.authors.is_empty());
    }

    #[test]
    fn test_date_from_time_element_and_url() {
        let html = r#"<html><body><time datetime="2016-11-30">Nov 30</time></body></html>"#;
        let article = extract_article(html, "https://example.com/x");
        assert_eq!(
            article.pub_date,
            NaiveDate::from_ymd_opt(2016, 11, 30).unwrap().and_hms_opt(0, 0, 0)
        );

        let article = extract_article("<html></html>", "https://www.foxnews.com/2017/03/14/story-slug");
        assert_eq!(
            article.pub_date,
            NaiveDate::from_ymd_opt(2017, 3, 14).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2017, 1, 9)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(parse_date("2017-01-09T08:30:00Z"), Some(expected));
        assert_eq!(parse_date("2017-01-09T08:30:00"), Some(expected));
        assert_eq!(parse_date("2017-01-09 08:30:00"), Some(expected));
        assert_eq!(parse_date("2017-01-09T08:30:00+0000"), Some(expected));
        assert_eq!(
            parse_date("2017-01-09"),
            NaiveDate::from_ymd_opt(2017, 1, 9).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_date("last Tuesday"), None);
    }

    #[test]
    fn test_author_filtering() {
        assert_eq!(split_authors("By Ada Lovelace, Grace Hopper"), vec!["Ada Lovelace", "Grace Hopper"]);
        assert!(!is_plausible_name("https://www.facebook.com/someone"));
        assert!(!is_plausible_name("@handle"));
    }
}
