//! # cc_harvest
//!
//! Builds a labelled corpus of articles for interest classification:
//! "hits" are articles saved to a notes app, "misses" are articles sampled at
//! random from the same sites through the CommonCrawl archive.
//!
//! ## Usage
//!
//! ```sh
//! cc_harvest export-notes     # data/interesting/*.html -> data/processed/<n>.txt
//! cc_harvest unique-sites     # hosts the notes came from
//! cc_harvest fetch-index      # data/index/<site>/index_<n>.json
//! cc_harvest sample           # data/misses/<site>/<n>.txt
//! cc_harvest clean            # prune data/to_analyse/misses against the hits
//! ```
//!
//! ## Architecture
//!
//! Every stage runs sequentially, one HTTP request at a time:
//! 1. **Index**: page through the CommonCrawl index for `<site>/*` and cache it
//! 2. **Sample**: filter the cached records by the site's URL rule, draw a
//!    random sample, fetch each capture's WARC record by byte range, extract
//!    the article and write it as an article file
//! 3. **Clean**: drop misses that are too short or share a title with a hit

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod commoncrawl;
mod config;
mod corpus;
mod encoding;
mod error;
mod extract;
mod models;
mod utils;

use cli::{Cli, Command};
use commoncrawl::CommonCrawlClient;
use commoncrawl::index::fetch_site_index;
use config::HarvestConfig;
use corpus::DataLayout;
use corpus::cleaner::clean_misses;
use corpus::notes::export_notes;
use corpus::sampler::{SampleOptions, sample_sites};
use corpus::sites::unique_sites;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("cc_harvest starting up");

    let args = Cli::parse();
    debug!(
        data_dir = %args.data_dir.display(),
        config = ?args.config,
        command = ?args.command,
        "Parsed CLI arguments"
    );

    let config = HarvestConfig::load(args.config.as_deref())?;
    let layout = DataLayout::new(&args.data_dir);

    if let Err(e) = ensure_writable_dir(layout.root()).await {
        error!(
            path = %layout.root().display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    match args.command {
        Command::FetchIndex { site } => {
            let client = CommonCrawlClient::new(&config);
            for rule in config.select_sites(site.as_deref())? {
                let report = fetch_site_index(&client, rule, &layout.index_dir(&rule.host)).await?;
                info!(site = %rule.host, ?report, "Site index cached");
            }
        }

        Command::Sample {
            site,
            seed,
            dry_run,
        } => {
            let client = CommonCrawlClient::new(&config);
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_rng(&mut rand::rng()),
            };
            let sites = config.select_sites(site.as_deref())?;
            let options = SampleOptions {
                sample_cap: config.sample_cap,
                dry_run,
            };
            let reports = sample_sites(&client, &mut rng, &sites, &layout, options).await?;
            let written: usize = reports.iter().map(|r| r.written).sum();
            info!(sites = reports.len(), written, "Sampling complete");
        }

        Command::Clean {
            hits,
            misses,
            dry_run,
        } => {
            let hits = hits.unwrap_or_else(|| layout.to_analyse_dir("hits"));
            let misses = misses.unwrap_or_else(|| layout.to_analyse_dir("misses"));
            let report = clean_misses(&hits, &misses, config.min_body_chars, dry_run).await?;
            info!(?report, "Clean complete");
        }

        Command::ExportNotes => {
            let report = export_notes(&layout.interesting_dir(), &layout.processed_dir()).await?;
            info!(?report, "Export complete");
        }

        Command::UniqueSites => {
            let sites = unique_sites(&layout.processed_dir());
            info!(count = sites.len(), "Unique sites");
            for site in sites {
                println!("{site}");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
