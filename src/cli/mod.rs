use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "podscribe",
    about = "Podscribe - Pull podcast and video episode transcripts into documents",
    version,
    long_about = "A CLI tool that lists episodes from podcast RSS feeds and video playlists, retrieves each episode's transcript (caption tracks, embedded transcript APIs, page scraping, or a headless browser as a last resort) and saves it as a .docx or text document."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List episodes from an RSS feed, playlist URL, or local feed file
    List {
        /// Feed URL, playlist URL, or path to a feed file
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Build episode page URLs from this base plus the title slug
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },

    /// Fetch the transcript of a single episode page or video
    Fetch {
        /// Episode page URL or video URL/ID
        #[arg(value_name = "LOCATOR")]
        locator: String,

        /// Title used for the document name (defaults to the locator)
        #[arg(short, long)]
        title: Option<String>,

        /// Directory to write the document to
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Skip the headless browser fallback
        #[arg(long)]
        no_browser: bool,

        /// Print the formatted transcript instead of writing a document
        #[arg(long)]
        print: bool,
    },

    /// Prepare transcript documents for episodes of a feed or playlist
    Download {
        /// Feed URL, playlist URL, or path to a feed file
        #[arg(value_name = "SOURCE")]
        source: String,

        /// 1-based episode numbers as shown by `list` (all episodes if omitted)
        #[arg(short, long = "episode", value_name = "N")]
        episodes: Vec<usize>,

        /// Only the most recent episode
        #[arg(long, conflicts_with = "episodes")]
        latest: bool,

        /// Build episode page URLs from this base plus the title slug
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Directory to write documents to
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Skip the headless browser fallback
        #[arg(long)]
        no_browser: bool,
    },

    /// Show or locate the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported episode sources and transcript strategies
    Sources,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Word document
    Docx,
    /// Plain text
    Text,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Docx => write!(f, "docx"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download_args() {
        let cli = Cli::parse_from([
            "podscribe",
            "download",
            "https://example.com/feed.rss",
            "-e",
            "1",
            "--episode",
            "3",
            "--format",
            "text",
        ]);

        match cli.command {
            Commands::Download {
                episodes, format, latest, ..
            } => {
                assert_eq!(episodes, vec![1, 3]);
                assert_eq!(format, Some(OutputFormat::Text));
                assert!(!latest);
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_latest_conflicts_with_episode() {
        let result = Cli::try_parse_from([
            "podscribe",
            "download",
            "https://example.com/feed.rss",
            "--latest",
            "-e",
            "2",
        ]);
        assert!(result.is_err());
    }
}
