//! Error type shared by every pipeline stage.
//!
//! Stage functions return [`Result`]; the binary entry point boxes these into
//! `Box<dyn Error>` and propagates them.

use std::path::PathBuf;

/// Errors raised while fetching, sampling, or cleaning the corpus.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The HTTP request itself failed (DNS, connection, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered, but not with the status we need.
    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The index server returned something other than what its API documents.
    #[error("malformed index response: {0}")]
    MalformedIndex(String),

    /// Decompressing or parsing a WARC chunk failed.
    #[error("malformed WARC record: {0}")]
    Warc(String),

    /// An article file on disk does not follow the `---` metadata layout.
    #[error("malformed article file {path}: {reason}")]
    MalformedArticle { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, HarvestError>;
