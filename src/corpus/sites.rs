//! The set of sites the exported notes came from.

use crate::models::ArticleFile;
use crate::utils::{host_of, list_article_files};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Sorted unique hosts of the `Source:` URLs of the articles in `processed_dir`.
///
/// Articles without a parseable source are skipped.
#[instrument(level = "info", skip_all, fields(dir = %processed_dir.display()))]
pub fn unique_sites(processed_dir: &Path) -> BTreeSet<String> {
    let mut sites = BTreeSet::new();
    for path in list_article_files(processed_dir) {
        let article = match ArticleFile::read(&path) {
            Ok(article) => article,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable note");
                continue;
            }
        };
        match article.source().and_then(host_of) {
            Some(host) => {
                sites.insert(host);
            }
            None => debug!(path = %path.display(), "No usable Source line"),
        }
    }
    sites
}
