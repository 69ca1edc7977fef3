//! Podscribe - A Rust CLI tool for pulling episode transcripts into documents
//!
//! This library lists episodes from podcast RSS feeds and video playlists, retrieves
//! each episode's transcript through a chain of fallback strategies, reformats it and
//! writes it out as a downloadable document.

pub mod cli;
pub mod config;
pub mod document;
pub mod episodes;
pub mod format;
pub mod pipeline;
pub mod retrieve;
pub mod session;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use document::{DocumentArtifact, DocumentWriter};
pub use episodes::{Episode, EpisodeSource, SourceRegistry};
pub use pipeline::TranscriptPipeline;
pub use retrieve::{TranscriptOutcome, TranscriptRetriever};
pub use session::{DownloadBoard, DownloadState};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to podscribe
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("Unsupported episode source: {0}")]
    UnsupportedSource(String),

    #[error("Feed could not be parsed: {0}")]
    FeedParse(String),

    #[error("No locator could be resolved for episode: {0}")]
    MissingLocator(String),

    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    #[error("Browser session failed: {0}")]
    Browser(String),

    #[error("Document could not be written: {0}")]
    Document(String),
}
