//! Charset detection and decoding of captured HTML.
//!
//! The charset comes from the HTTP `Content-Type` header when it names one,
//! then from a `<meta charset>` or `<meta http-equiv="Content-Type">` tag in
//! the first kilobyte of the page, and falls back to UTF-8.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).expect("valid regex"));

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s/>;]+)"#).expect("valid regex")
});

/// Encoding for a page, from its `Content-Type` header value and body.
pub fn detect_encoding(content_type: Option<&str>, html: &[u8]) -> &'static Encoding {
    let from_header = content_type
        .and_then(|ct| HEADER_CHARSET.captures(ct))
        .and_then(|c| Encoding::for_label(c[1].as_bytes()));
    if let Some(encoding) = from_header {
        return encoding;
    }

    let head = String::from_utf8_lossy(&html[..html.len().min(1024)]);
    META_CHARSET
        .captures(&head)
        .and_then(|c| Encoding::for_label(c[1].as_bytes()))
        .unwrap_or(UTF_8)
}

/// Decode `html` to a string, replacing undecodable bytes with U+FFFD.
pub fn decode_html(content_type: Option<&str>, html: &[u8]) -> String {
    let encoding = detect_encoding(content_type, html);
    if encoding == UTF_8 {
        return String::from_utf8_lossy(html).into_owned();
    }
    let (decoded, _, _) = encoding.decode(html);
    decoded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_charset_wins() {
        let html = br#"<html><head><meta charset="utf-8"></head></html>"#;
        let encoding = detect_encoding(Some("text/html; charset=ISO-8859-1"), html);
        // ISO-8859-1 is decoded as windows-1252 on the web.
        assert_eq!(encoding.name(), "windows-1252");
    }

    #[test]
    fn test_meta_charset_and_http_equiv() {
        let html = br#"<html><head><meta charset="windows-1251"></head></html>"#;
        assert_eq!(detect_encoding(None, html).name(), "windows-1251");

        let html = br#"<meta http-equiv="Content-Type" content="text/html; charset=Shift_JIS">"#;
        assert_eq!(detect_encoding(Some("text/html"), html).name(), "Shift_JIS");
    }

    #[test]
    fn test_defaults_to_utf8() {
        assert_eq!(detect_encoding(None, b"<html></html>"), UTF_8);
        assert_eq!(detect_encoding(Some("text/html; charset=bogus"), b"<p></p>"), UTF_8);
    }

    #[test]
    fn test_decodes_latin1_payload() {
        let html = b"<p>caf\xe9 cr\xe8me</p>";
        assert_eq!(
            decode_html(Some("text/html; charset=iso-8859-1"), html),
            "<p>café crème</p>"
        );
        assert_eq!(decode_html(None, "<p>café</p>".as_bytes()), "<p>café</p>");
    }
}
