//! Command-line interface definitions for `cc_harvest`.
//!
//! One subcommand per pipeline stage. The data directory and configuration
//! file are global and may also come from the environment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build a corpus of interesting and uninteresting articles.
///
/// # Examples
///
/// ```sh
/// # Cache the CommonCrawl index for every configured site
/// cc_harvest fetch-index
///
/// # Sample misses for one site, reproducibly
/// cc_harvest sample --site arstechnica.com --seed 7
///
/// # See what the cleaner would delete
/// cc_harvest --data-dir ./data clean --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Root of the data directory
    #[arg(short, long, global = true, env = "CC_HARVEST_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Optional path to a YAML config file with crawl settings and site rules
    #[arg(short, long, global = true, env = "CC_HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Download and cache the CommonCrawl index pages of each site
    FetchIndex {
        /// Only this site (host as listed in the config)
        #[arg(long)]
        site: Option<String>,
    },

    /// Sample random misses from the cached index of each site
    Sample {
        /// Only this site (host as listed in the config)
        #[arg(long)]
        site: Option<String>,

        /// Seed for the random sample
        #[arg(long)]
        seed: Option<u64>,

        /// List the sampled URLs without fetching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete misses that are too short or duplicate a hit
    Clean {
        /// Hits tree (default: <data-dir>/to_analyse/hits)
        #[arg(long)]
        hits: Option<PathBuf>,

        /// Misses tree (default: <data-dir>/to_analyse/misses)
        #[arg(long)]
        misses: Option<PathBuf>,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Convert notes exported as HTML into article files
    ExportNotes,

    /// List the unique sites the exported notes came from
    UniqueSites,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "cc_harvest",
            "--data-dir",
            "/tmp/data",
            "sample",
            "--site",
            "dev.to",
            "--seed",
            "7",
            "--dry-run",
        ]);

        assert_eq!(cli.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(
            cli.command,
            Command::Sample {
                site: Some("dev.to".to_string()),
                seed: Some(7),
                dry_run: true,
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cc_harvest", "clean", "-c", "sites.yaml", "--dry-run"]);
        assert_eq!(cli.config, Some(PathBuf::from("sites.yaml")));
        assert_eq!(
            cli.command,
            Command::Clean {
                hits: None,
                misses: None,
                dry_run: true,
            }
        );
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["cc_harvest"]).is_err());
        let cli = Cli::try_parse_from(["cc_harvest", "fetch-index"]).unwrap();
        assert_eq!(cli.command, Command::FetchIndex { site: None });
    }
}
