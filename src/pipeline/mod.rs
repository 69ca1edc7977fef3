use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::document::{DocumentArtifact, DocumentWriter};
use crate::episodes::playlist::PlaylistSource;
use crate::episodes::rss::RssSource;
use crate::episodes::{Episode, SourceRegistry};
use crate::format::format_transcript;
use crate::retrieve::browser::{BrowserLauncher, ChromeLauncher};
use crate::retrieve::fetch::{HttpFetcher, PageFetcher};
use crate::retrieve::{TranscriptOutcome, TranscriptRetriever};
use crate::session::DownloadBoard;
use crate::Result;

/// Main transcript pipeline: list, retrieve, format, write
pub struct TranscriptPipeline {
    sources: SourceRegistry,
    retriever: TranscriptRetriever,
    writer: DocumentWriter,
}

impl TranscriptPipeline {
    /// Create a pipeline from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(
            config.request_timeout(),
            &config.retrieval.user_agent,
        )?);

        let launcher: Option<Arc<dyn BrowserLauncher>> = if config.browser.enabled {
            Some(Arc::new(ChromeLauncher::new(
                config.browser.binary_paths.clone(),
                config.browser.allow_download,
            )))
        } else {
            tracing::info!("Headless browser fallback disabled");
            None
        };

        let writer = DocumentWriter::in_scratch_root(&config.output_root());
        Ok(Self::from_parts(config, fetcher, launcher, writer))
    }

    /// Assemble a pipeline from already-built collaborators
    pub fn from_parts(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        launcher: Option<Arc<dyn BrowserLauncher>>,
        writer: DocumentWriter,
    ) -> Self {
        let mut sources = SourceRegistry::empty();
        sources.register(Box::new(PlaylistSource::new(&config.app.yt_dlp_path)));
        sources.register(Box::new(RssSource::new(
            Arc::clone(&fetcher),
            config.feed.episode_base_url.clone(),
        )));

        let retriever = TranscriptRetriever::from_config(config, fetcher, launcher);

        Self {
            sources,
            retriever,
            writer,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        self.writer.scratch_dir()
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.list_sources()
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.retriever.strategy_names()
    }

    /// List episodes from a feed, playlist, or feed file
    pub async fn list_episodes(&self, address: &str) -> Result<Vec<Episode>> {
        self.sources.list_episodes(address).await
    }

    pub async fn latest_episode(&self, address: &str) -> Result<Episode> {
        self.sources.latest_episode(address).await
    }

    /// Retrieve and format the transcript for one locator
    pub async fn fetch_transcript(&self, locator: &str) -> TranscriptOutcome {
        tracing::info!("Retrieving transcript for: {}", locator);

        match self.retriever.retrieve(locator).await {
            TranscriptOutcome::Found { text, strategy } => TranscriptOutcome::Found {
                text: format_transcript(&text),
                strategy,
            },
            failed => failed,
        }
    }

    pub fn write_document(&self, text: &str, title: &str, format: OutputFormat) -> Result<DocumentArtifact> {
        self.writer.write(text, title, format)
    }

    /// Retrieve, format and write one episode, tracking its state on the board
    pub async fn prepare_download(
        &self,
        board: &mut DownloadBoard,
        episode: &Episode,
        format: OutputFormat,
    ) -> Result<DocumentArtifact> {
        if !board.begin(episode) {
            anyhow::bail!("Download already in progress for {}", episode.title);
        }

        let written = match self.fetch_transcript(&episode.locator).await.into_result() {
            Ok(text) => self
                .write_document(&text, &episode.title, format)
                .with_context(|| format!("Failed to write document for {}", episode.title)),
            Err(e) => Err(e),
        };

        match written {
            Ok(artifact) => {
                board.complete(episode, artifact.clone());
                Ok(artifact)
            }
            Err(e) => {
                board.reset(episode);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::fetch::MockPageFetcher;
    use crate::session::DownloadState;
    use mockall::predicate::eq;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Show</title><link>https://example.com</link><description>d</description>
  <item><title>Episode: One</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    fn transcript_page() -> String {
        format!(
            "<main><h3>Transcript</h3><div>{}</div><a>Show full transcript</a></main>",
            "Host: welcome back 01:15 >>Guest: thanks for having me. ".repeat(3)
        )
    }

    fn pipeline(fetcher: MockPageFetcher, dir: &Path) -> TranscriptPipeline {
        let mut config = Config::default();
        config.feed.episode_base_url = Some("https://omny.fm/shows/demo/".to_string());

        TranscriptPipeline::from_parts(&config, Arc::new(fetcher), None, DocumentWriter::new(dir))
    }

    #[tokio::test]
    async fn test_feed_to_document() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch_text()
            .with(eq("https://example.com/feed.rss"))
            .returning(|_| Ok(FEED.to_string()));
        fetcher
            .expect_fetch_text()
            .with(eq("https://omny.fm/shows/demo/episode-one"))
            .times(1)
            .returning(|_| Ok(transcript_page()));

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(fetcher, dir.path());

        let episode = pipeline.latest_episode("https://example.com/feed.rss").await.unwrap();
        assert_eq!(episode.locator, "https://omny.fm/shows/demo/episode-one");

        let mut board = DownloadBoard::new();
        let artifact = pipeline
            .prepare_download(&mut board, &episode, OutputFormat::Text)
            .await
            .unwrap();

        assert_eq!(artifact.filename, "Episode One.txt");
        let written = String::from_utf8(artifact.bytes.clone()).unwrap();
        assert!(written.starts_with("Host: welcome back \n\n01:15 \n\n>>Guest:"));
        assert_eq!(board.state(&episode), &DownloadState::Ready(artifact));
    }

    #[tokio::test]
    async fn test_failed_episode_resets_board() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch_text()
            .returning(|_| Ok("<html>no transcript here</html>".to_string()));

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(fetcher, dir.path());
        let episode = Episode::new("Missing", "https://omny.fm/shows/demo/missing");

        let mut board = DownloadBoard::new();
        let err = pipeline
            .prepare_download(&mut board, &episode, OutputFormat::Docx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Transcript unavailable"));
        assert_eq!(board.state(&episode), &DownloadState::Idle);
        assert!(fs_err::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_registered_sources() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(MockPageFetcher::new(), dir.path());
        assert_eq!(pipeline.source_names(), vec!["Video playlist", "RSS feed"]);
        assert!(!pipeline.strategy_names().contains(&"headless browser"));
    }
}
