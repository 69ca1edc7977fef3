use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::{PageContext, TranscriptStrategy};
use crate::Result;

/// Downloads the video's subtitle track through yt-dlp
pub struct CaptionStrategy {
    yt_dlp_path: String,
    languages: Vec<String>,
}

impl CaptionStrategy {
    pub fn new(yt_dlp_path: impl Into<String>, languages: Vec<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            languages,
        }
    }

    async fn download_track(&self, url: &str, dir: &Path) -> Result<Option<PathBuf>> {
        let template = dir.join("%(id)s.%(ext)s").to_string_lossy().into_owned();
        let languages = if self.languages.is_empty() {
            "en".to_string()
        } else {
            self.languages.join(",")
        };

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                languages.as_str(),
                "--sub-format",
                "json3",
                "--no-warnings",
                "--quiet",
                "--output",
                template.as_str(),
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed to fetch captions: {}", error);
        }

        let track = fs_err::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| path.extension().is_some_and(|ext| ext == "json3"));

        Ok(track)
    }
}

#[async_trait]
impl TranscriptStrategy for CaptionStrategy {
    fn name(&self) -> &'static str {
        "caption track"
    }

    fn supports(&self, locator: &str) -> bool {
        video_url(locator).is_some()
    }

    async fn attempt(&self, page: &mut PageContext<'_>) -> Result<Option<String>> {
        let Some(url) = video_url(page.locator()) else {
            return Ok(None);
        };

        let dir = tempfile::tempdir()?;
        let Some(track) = self.download_track(&url, dir.path()).await? else {
            tracing::debug!("No caption track in {:?} for {}", self.languages, url);
            return Ok(None);
        };

        let content = fs_err::read_to_string(&track)?;
        Ok(Some(parse_json3(&content)?))
    }
}

/// Normalise a YouTube video URL or bare 11-character ID to a watch URL
pub fn video_url(locator: &str) -> Option<String> {
    let locator = locator.trim();

    let is_id = |s: &str| s.len() == 11 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if is_id(locator) {
        return Some(format!("https://www.youtube.com/watch?v={}", locator));
    }

    let url = Url::parse(locator).ok()?;
    let host = url.host_str()?;

    let id = if host == "youtu.be" {
        url.path_segments()?.next()?.to_string()
    } else if host.ends_with("youtube.com") {
        url.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.to_string())?
    } else {
        return None;
    };

    is_id(id.as_str()).then(|| format!("https://www.youtube.com/watch?v={}", id))
}

/// Join the text of every event in a json3 subtitle file
pub fn parse_json3(content: &str) -> Result<String> {
    let track: Value = serde_json::from_str(content)?;
    let empty = vec![];

    let text = track["events"]
        .as_array()
        .unwrap_or(&empty)
        .iter()
        .filter_map(|event| event["segs"].as_array())
        .map(|segs| {
            segs.iter()
                .filter_map(|seg| seg["utf8"].as_str())
                .collect::<String>()
        })
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_url() {
        let watch = Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string());
        assert_eq!(video_url("dQw4w9WgXcQ"), watch);
        assert_eq!(video_url("https://youtu.be/dQw4w9WgXcQ"), watch);
        assert_eq!(video_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1"), watch);
        assert_eq!(video_url("https://omny.fm/shows/x/episode-one"), None);
        assert_eq!(video_url("https://www.youtube.com/watch?v=short"), None);
    }

    #[test]
    fn test_parse_json3() {
        let content = r#"{
            "events": [
                {"tStartMs": 0, "segs": [{"utf8": ">> Welcome"}, {"utf8": " back"}]},
                {"tStartMs": 900, "aAppend": 1, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 1200},
                {"tStartMs": 1500, "segs": [{"utf8": "to the\nshow"}]}
            ]
        }"#;

        assert_eq!(parse_json3(content).unwrap(), ">> Welcome back to the show");
        assert_eq!(parse_json3("{}").unwrap(), "");
        assert!(parse_json3("nope").is_err());
    }
}
