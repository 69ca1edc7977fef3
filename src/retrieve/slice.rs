use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

use super::{long_enough, Markers, PageContext, TranscriptStrategy};
use crate::Result;

/// Cuts the transcript out of raw HTML between two text markers
pub struct MarkerSliceStrategy {
    markers: Markers,
    min_chars: usize,
}

impl MarkerSliceStrategy {
    pub fn new(markers: Markers, min_chars: usize) -> Self {
        Self { markers, min_chars }
    }
}

#[async_trait]
impl TranscriptStrategy for MarkerSliceStrategy {
    fn name(&self) -> &'static str {
        "HTML marker slice"
    }

    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("http://") || locator.starts_with("https://")
    }

    async fn attempt(&self, page: &mut PageContext<'_>) -> Result<Option<String>> {
        let html = page.html().await?;

        let Some(fragment) = self.markers.slice(html) else {
            tracing::debug!("Transcript markers not found in raw HTML");
            return Ok(None);
        };

        let text = clean_fragment(fragment);
        if !long_enough(&text, self.min_chars) {
            tracing::debug!("HTML slice has only {} characters", text.chars().count());
            return Ok(None);
        }

        Ok(Some(text))
    }
}

struct Cleaners {
    css_rules: Regex,
    whitespace: Regex,
}

fn cleaners() -> &'static Cleaners {
    static CLEANERS: OnceLock<Cleaners> = OnceLock::new();
    CLEANERS.get_or_init(|| Cleaners {
        css_rules: Regex::new(r"\.css-[A-Za-z0-9_-]+\s*\{[^}]*\}").expect("valid regex"),
        whitespace: Regex::new(r"\s+").expect("valid regex"),
    })
}

/// Text nodes of the fragment, skipping anything inside `<script>` or `<style>`
fn visible_text(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);

    let text = html
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|element| matches!(element.name(), "script" | "style"))
            });
            (!hidden).then(|| &**text)
        })
        .collect::<Vec<_>>()
        .join(" ");
    text
}

/// Reduce an HTML fragment to its readable text
pub fn clean_fragment(fragment: &str) -> String {
    let cleaners = cleaners();

    let text = visible_text(fragment);
    let text = cleaners.css_rules.replace_all(&text, " ");

    cleaners.whitespace.replace_all(&text, " ").trim().to_string()
}
