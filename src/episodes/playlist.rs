use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::{Episode, EpisodeSource};
use crate::Result;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Video playlist source using yt-dlp flat extraction
pub struct PlaylistSource {
    yt_dlp_path: String,
}

impl PlaylistSource {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Dump one JSON object per playlist entry without resolving each video
    async fn dump_playlist(&self, address: &str) -> Result<String> {
        tracing::debug!("Enumerating playlist: {}", address);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--flat-playlist", "--dump-json", "--no-warnings", "--quiet", address])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed to enumerate playlist: {}", error);
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

#[async_trait]
impl EpisodeSource for PlaylistSource {
    async fn list(&self, address: &str) -> Result<Vec<Episode>> {
        let dump = self.dump_playlist(address).await?;
        parse_flat_playlist(&dump)
    }

    fn supports(&self, address: &str) -> bool {
        is_playlist_url(address)
    }

    fn name(&self) -> &'static str {
        "Video playlist"
    }
}

/// Check for a YouTube address that carries a playlist
pub fn is_playlist_url(address: &str) -> bool {
    let Ok(url) = Url::parse(address) else {
        return false;
    };

    let on_youtube = url
        .host_str()
        .map(|host| host.ends_with("youtube.com") || host == "youtu.be")
        .unwrap_or(false);

    on_youtube && (url.path().starts_with("/playlist") || url.query_pairs().any(|(k, _)| k == "list"))
}

/// Parse yt-dlp `--flat-playlist --dump-json` output, one entry per line
pub fn parse_flat_playlist(dump: &str) -> Result<Vec<Episode>> {
    let mut episodes = Vec::new();

    for line in dump.lines().filter(|line| !line.trim().is_empty()) {
        let entry: Value = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("Failed to parse yt-dlp JSON output: {}", e))?;

        let id = entry["id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing video ID in playlist entry"))?;

        let title = entry["title"].as_str().unwrap_or(id);

        episodes.push(Episode::new(title, format!("{}{}", WATCH_URL, id)));
    }

    if episodes.is_empty() {
        anyhow::bail!("Playlist is empty or unavailable");
    }

    Ok(episodes)
}
