use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use std::path::Path;
use std::sync::Arc;

use super::{episode_url, Episode, EpisodeSource};
use crate::retrieve::fetch::PageFetcher;
use crate::{Result, ScribeError};

/// Podcast RSS/Atom feed source
pub struct RssSource {
    fetcher: Arc<dyn PageFetcher>,
    episode_base_url: Option<String>,
}

impl RssSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, episode_base_url: Option<String>) -> Self {
        Self {
            fetcher,
            episode_base_url,
        }
    }

    async fn read_feed(&self, address: &str) -> Result<Vec<u8>> {
        if is_feed_file(address) {
            tracing::debug!("Reading feed from local file: {}", address);
            return Ok(fs_err::read(address)?);
        }

        let body = self.fetcher.fetch_text(address).await?;
        Ok(body.into_bytes())
    }
}

#[async_trait]
impl EpisodeSource for RssSource {
    async fn list(&self, address: &str) -> Result<Vec<Episode>> {
        let bytes = self.read_feed(address).await?;
        parse_feed(&bytes, self.episode_base_url.as_deref())
    }

    fn supports(&self, address: &str) -> bool {
        address.starts_with("http://") || address.starts_with("https://") || is_feed_file(address)
    }

    fn name(&self) -> &'static str {
        "RSS feed"
    }
}

fn is_feed_file(address: &str) -> bool {
    !address.contains("://") && Path::new(address).is_file()
}

/// Parse feed bytes into episodes, keeping feed order
pub fn parse_feed(bytes: &[u8], episode_base_url: Option<&str>) -> Result<Vec<Episode>> {
    let feed = parser::parse(bytes).map_err(|e| ScribeError::FeedParse(e.to_string()))?;

    feed.entries
        .iter()
        .map(|entry| -> Result<Episode> {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let locator = match episode_base_url {
                Some(base) => episode_url(base, &title),
                None => entry_link(entry).ok_or_else(|| ScribeError::MissingLocator(title.clone()))?,
            };

            Ok(Episode { title, locator })
        })
        .collect()
}

fn entry_link(entry: &Entry) -> Option<String> {
    let alternate = entry.links.iter().find(|link| {
        let rel = link.rel.as_deref().unwrap_or("");
        !link.href.trim().is_empty() && (rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    });
    if let Some(link) = alternate {
        return Some(link.href.trim().to_string());
    }

    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return Some(id.to_string());
    }

    None
}
