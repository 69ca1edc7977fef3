use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod browser;
pub mod captions;
pub mod embedded;
pub mod fetch;
pub mod slice;

use crate::config::Config;
use crate::{Result, ScribeError};
use browser::{BrowserLauncher, BrowserStrategy};
use captions::CaptionStrategy;
use embedded::EmbeddedApiStrategy;
use fetch::PageFetcher;
use slice::MarkerSliceStrategy;

/// Outcome of a transcript retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// Transcript text and the strategy that produced it
    Found { text: String, strategy: &'static str },

    /// Every strategy failed; the cause lists each attempt
    Failed { cause: String },
}

impl TranscriptOutcome {
    /// Convert into a result, turning `Failed` into an error
    pub fn into_result(self) -> Result<String> {
        match self {
            TranscriptOutcome::Found { text, .. } => Ok(text),
            TranscriptOutcome::Failed { cause } => Err(ScribeError::TranscriptUnavailable(cause).into()),
        }
    }
}

/// Start and end anchors framing the transcript in page text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub start: String,
    pub end: String,
}

impl Markers {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Text between the first start marker and the next end marker after it
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        let start = text.find(&self.start)? + self.start.len();
        let end = start + text[start..].find(&self.end)?;
        Some(text[start..end].trim())
    }
}

/// Per-retrieval state shared by the strategies
///
/// The raw page is fetched at most once, on first request, and the result
/// (or the failure) is reused by every later strategy.
pub struct PageContext<'a> {
    locator: &'a str,
    fetcher: &'a dyn PageFetcher,
    html: Option<std::result::Result<String, String>>,
}

impl<'a> PageContext<'a> {
    pub fn new(locator: &'a str, fetcher: &'a dyn PageFetcher) -> Self {
        Self {
            locator,
            fetcher,
            html: None,
        }
    }

    pub fn locator(&self) -> &'a str {
        self.locator
    }

    pub fn fetcher(&self) -> &'a dyn PageFetcher {
        self.fetcher
    }

    /// Raw HTML of the locator page
    pub async fn html(&mut self) -> Result<&str> {
        let fetched = match self.html.take() {
            Some(cached) => cached,
            None => {
                tracing::debug!("Fetching page: {}", self.locator);
                self.fetcher
                    .fetch_text(self.locator)
                    .await
                    .map_err(|e| format!("{:#}", e))
            }
        };

        match self.html.insert(fetched) {
            Ok(html) => Ok(html.as_str()),
            Err(e) => Err(anyhow::anyhow!("Page fetch failed: {}", e)),
        }
    }
}

/// A single way of obtaining transcript text
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Short name used in logs and failure causes
    fn name(&self) -> &'static str;

    /// Check if this strategy applies to the locator
    fn supports(&self, locator: &str) -> bool;

    /// `Ok(Some)` accepts, `Ok(None)` means nothing usable, `Err` means the attempt raised.
    async fn attempt(&self, page: &mut PageContext<'_>) -> Result<Option<String>>;
}

/// Strategies tried in registration order until one accepts
pub struct TranscriptRetriever {
    fetcher: Arc<dyn PageFetcher>,
    strategies: Vec<Box<dyn TranscriptStrategy>>,
}

impl TranscriptRetriever {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            strategies: Vec::new(),
        }
    }

    /// Build the standard chain from configuration
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        launcher: Option<Arc<dyn BrowserLauncher>>,
    ) -> Self {
        let retrieval = &config.retrieval;
        let markers = Markers::new(&retrieval.start_marker, &retrieval.end_marker);

        let mut retriever = Self::new(fetcher);
        retriever.register(Box::new(CaptionStrategy::new(
            &config.app.yt_dlp_path,
            retrieval.caption_languages.clone(),
        )));
        retriever.register(Box::new(EmbeddedApiStrategy::new(retrieval.min_transcript_chars)));
        retriever.register(Box::new(MarkerSliceStrategy::new(
            markers.clone(),
            retrieval.min_transcript_chars,
        )));

        if let Some(launcher) = launcher {
            retriever.register(Box::new(BrowserStrategy::new(
                launcher,
                markers,
                Duration::from_secs(config.browser.wait_secs),
            )));
        }

        retriever
    }

    pub fn register(&mut self, strategy: Box<dyn TranscriptStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Retrieve the transcript for one locator
    pub async fn retrieve(&self, locator: &str) -> TranscriptOutcome {
        let mut page = PageContext::new(locator, self.fetcher.as_ref());
        let mut causes = Vec::new();

        for strategy in self.strategies.iter().filter(|s| s.supports(locator)) {
            let name = strategy.name();
            tracing::debug!("Trying {} for {}", name, locator);

            match strategy.attempt(&mut page).await {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    tracing::info!("Transcript found by {} ({} characters)", name, text.chars().count());
                    return TranscriptOutcome::Found { text, strategy: name };
                }
                Ok(_) => {
                    tracing::debug!("{} produced nothing usable", name);
                    causes.push(format!("{}: nothing usable", name));
                }
                Err(e) => {
                    tracing::warn!("{} failed: {:#}", name, e);
                    causes.push(format!("{}: {:#}", name, e));
                }
            }
        }

        if causes.is_empty() {
            causes.push("no strategy supports this locator".to_string());
        }

        TranscriptOutcome::Failed {
            cause: causes.join("; "),
        }
    }
}

/// Acceptance gate for statically scraped text
pub(crate) fn long_enough(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() > min_chars
}
