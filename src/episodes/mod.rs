use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

pub mod playlist;
pub mod rss;

use crate::Result;
use crate::ScribeError;

/// One episode as listed by a feed or playlist
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Episode {
    /// Display title
    pub title: String,

    /// Page URL or platform ID used to retrieve the transcript
    pub locator: String,
}

impl Episode {
    pub fn new(title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: locator.into(),
        }
    }
}

/// Trait for listing episodes from different kinds of sources
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    /// List episodes in source order
    async fn list(&self, address: &str) -> Result<Vec<Episode>>;

    /// Check if this source understands the given address
    fn supports(&self, address: &str) -> bool;

    /// Get the name of this source kind
    fn name(&self) -> &'static str;
}

/// Registry for managing episode sources
pub struct SourceRegistry {
    sources: Vec<Box<dyn EpisodeSource>>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a new source. Earlier registrations win.
    pub fn register(&mut self, source: Box<dyn EpisodeSource>) {
        self.sources.push(source);
    }

    /// Find a source that supports the given address
    pub fn find_source(&self, address: &str) -> Option<&dyn EpisodeSource> {
        self.sources
            .iter()
            .find(|source| source.supports(address))
            .map(|boxed| boxed.as_ref())
    }

    /// List all registered source kinds
    pub fn list_sources(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// List episodes using the appropriate source
    pub async fn list_episodes(&self, address: &str) -> Result<Vec<Episode>> {
        let source = self
            .find_source(address)
            .ok_or_else(|| ScribeError::UnsupportedSource(address.to_string()))?;

        tracing::info!("Listing episodes from {} source: {}", source.name(), address);
        let episodes = source.list(address).await?;
        tracing::info!("Found {} episodes", episodes.len());

        Ok(episodes)
    }

    /// The first listed episode, which feeds publish newest-first
    pub async fn latest_episode(&self, address: &str) -> Result<Episode> {
        self.list_episodes(address)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No episodes found at {}", address))
    }
}

/// Turn an episode title into the URL slug episode pages are published under
pub fn slugify(title: &str) -> String {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let punctuation = PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    let slug = title.trim().to_lowercase().replace(':', "");
    let slug = punctuation.replace_all(&slug, "");
    whitespace.replace_all(&slug, "-").into_owned()
}

/// Join a base URL and a slug without doubling or dropping the separator
pub fn episode_url(base_url: &str, title: &str) -> String {
    let slug = slugify(title);
    if base_url.ends_with('/') {
        format!("{}{}", base_url, slug)
    } else {
        format!("{}/{}", base_url, slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        episodes: Vec<Episode>,
    }

    #[async_trait]
    impl EpisodeSource for FixedSource {
        async fn list(&self, _address: &str) -> Result<Vec<Episode>> {
            Ok(self.episodes.clone())
        }

        fn supports(&self, address: &str) -> bool {
            address.starts_with("fixed:")
        }

        fn name(&self) -> &'static str {
            "Fixed"
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Episode: One"), "episode-one");
        assert_eq!(slugify("What's New?  Part 2"), "whats-new-part-2");
        assert_eq!(slugify("  Ping - Proving Grounds "), "ping---proving-grounds");
    }

    #[test]
    fn test_episode_url_separator() {
        assert_eq!(episode_url("https://host/show/", "A B"), "https://host/show/a-b");
        assert_eq!(episode_url("https://host/show", "A B"), "https://host/show/a-b");
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let mut registry = SourceRegistry::empty();
        registry.register(Box::new(FixedSource {
            episodes: vec![Episode::new("first", "loc-1"), Episode::new("second", "loc-2")],
        }));

        assert_eq!(registry.list_sources(), vec!["Fixed"]);

        let latest = registry.latest_episode("fixed:show").await.unwrap();
        assert_eq!(latest, Episode::new("first", "loc-1"));

        let err = registry.list_episodes("other:show").await.unwrap_err();
        assert!(err.to_string().contains("Unsupported episode source"));
    }
}
