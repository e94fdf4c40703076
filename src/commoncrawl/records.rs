//! Record extraction: fetch one gzipped WARC record by byte range.
//!
//! Each WARC file in the archive is a concatenation of independently gzipped
//! records, so a single capture can be fetched with an HTTP range request
//! using the `offset` and `length` the index reports, then decompressed as one
//! GZIP member and parsed as a small WARC container.

use crate::error::{HarvestError, Result};
use std::fmt;
use std::io::Read;
use tracing::{debug, instrument};
use warc::{BufferedBody, Record, WarcHeader, WarcReader};

/// Inclusive byte range within a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range covering `length` bytes from `offset`.
    ///
    /// Fails for a zero length or a range that would overflow.
    pub fn new(offset: u64, length: u64) -> Result<Self> {
        let end = length
            .checked_sub(1)
            .and_then(|l| offset.checked_add(l))
            .ok_or_else(|| {
                HarvestError::MalformedIndex(format!(
                    "invalid record location offset={offset} length={length}"
                ))
            })?;
        Ok(Self { start: offset, end })
    }

    /// Value for the HTTP `Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Ranged reads from the WARC archive.
pub trait RangeFetch {
    /// The raw bytes in `range` of the archive file at `path`.
    async fn fetch_range(&self, path: &str, range: ByteRange) -> Result<Vec<u8>>;
}

/// Fetch the record at `offset`/`length` of `filename` and return the first
/// WARC record whose `header` equals `value`.
///
/// Returns `Ok(None)` when the chunk parses but no record matches.
#[instrument(level = "info", skip(fetcher, header))]
pub async fn fetch_record<F: RangeFetch>(
    fetcher: &F,
    filename: &str,
    offset: u64,
    length: u64,
    header: WarcHeader,
    value: &str,
) -> Result<Option<Record<BufferedBody>>> {
    let range = ByteRange::new(offset, length)?;
    let compressed = fetcher.fetch_range(filename, range).await?;
    let data = gunzip(&compressed)?;
    debug!(
        compressed = compressed.len(),
        decompressed = data.len(),
        "Decompressed WARC chunk"
    );
    find_record(&data, header, value)
}

/// Decompress a single GZIP member.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut buffer = Vec::new();
    decoder
        .read_to_end(&mut buffer)
        .map_err(|e| HarvestError::Warc(format!("gzip: {e}")))?;
    Ok(buffer)
}

/// Scan the WARC records in `data` in order and return the first whose
/// `header` equals `value`.
pub fn find_record(
    data: &[u8],
    header: WarcHeader,
    value: &str,
) -> Result<Option<Record<BufferedBody>>> {
    for record in WarcReader::new(data).iter_records() {
        let record = record.map_err(|e| HarvestError::Warc(e.to_string()))?;
        if record.header(header.clone()).is_some_and(|v| v == value) {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Split an HTTP response captured in a WARC body into its header block and
/// payload.
///
/// The payload starts after the first blank line (`\r\n\r\n`, or `\n\n` for
/// captures with bare newlines). Returns `None` if there is no blank line.
pub fn http_response_parts(response: &[u8]) -> Option<(&[u8], &[u8])> {
    find(response, b"\r\n\r\n")
        .map(|i| (&response[..i], &response[i + 4..]))
        .or_else(|| find(response, b"\n\n").map(|i| (&response[..i], &response[i + 2..])))
}

/// Value of the `Content-Type` header in an HTTP header block.
pub fn content_type(headers: &[u8]) -> Option<String> {
    String::from_utf8_lossy(headers).lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
