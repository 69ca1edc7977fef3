use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use url::Url;

use super::{long_enough, PageContext, TranscriptStrategy};
use crate::Result;

/// Transcript document served by the hosting platform's API
#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    body: Option<String>,
}

/// Follows a transcript API URL embedded in the page's JSON state
pub struct EmbeddedApiStrategy {
    min_chars: usize,
}

impl EmbeddedApiStrategy {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

#[async_trait]
impl TranscriptStrategy for EmbeddedApiStrategy {
    fn name(&self) -> &'static str {
        "embedded transcript API"
    }

    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("http://") || locator.starts_with("https://")
    }

    async fn attempt(&self, page: &mut PageContext<'_>) -> Result<Option<String>> {
        let locator = page.locator();
        let Some(api_url) = find_transcript_url(page.html().await?, locator) else {
            tracing::debug!("No embedded transcript URL on {}", locator);
            return Ok(None);
        };

        tracing::debug!("Found transcript API URL: {}", api_url);
        let body = page.fetcher().fetch_text(&api_url).await?;
        let text = join_segments(&body)?;

        if !long_enough(&text, self.min_chars) {
            tracing::debug!(
                "Transcript API returned {} characters, not more than {}; treating as placeholder",
                text.trim().chars().count(),
                self.min_chars
            );
            return Ok(None);
        }

        Ok(Some(text))
    }
}

/// Locate and unescape the `TranscriptUrl` field in raw page source
pub fn find_transcript_url(html: &str, page_url: &str) -> Option<String> {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    let field = FIELD.get_or_init(|| {
        Regex::new(r#""TranscriptUrl"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex")
    });

    let raw = field.captures(html)?.get(1)?.as_str();
    let unescaped: String = serde_json::from_str(&format!("\"{}\"", raw)).ok()?;
    if unescaped.trim().is_empty() {
        return None;
    }

    match Url::parse(&unescaped) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(page_url).ok()?.join(&unescaped).ok().map(|u| u.to_string()),
    }
}

/// Concatenate segment bodies from a transcript API response
pub fn join_segments(json: &str) -> Result<String> {
    let document: TranscriptDocument =
        serde_json::from_str(json).context("Failed to parse transcript API response")?;

    let text = document
        .segments
        .iter()
        .filter_map(|segment| segment.body.as_deref())
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(text)
}
