use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::OutputFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcript retrieval settings
    pub retrieval: RetrievalConfig,

    /// Headless browser fallback
    pub browser: BrowserConfig,

    /// Episode listing
    #[serde(default)]
    pub feed: FeedConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Scraped transcripts must be longer than this to be accepted
    pub min_transcript_chars: usize,

    /// Text that precedes the transcript on episode pages
    pub start_marker: String,

    /// Text that follows the transcript on episode pages
    pub end_marker: String,

    /// HTTP request timeout; unset means no timeout
    pub request_timeout_secs: Option<u64>,

    /// User agent sent with page requests
    pub user_agent: String,

    /// Caption languages to ask for, in preference order
    pub caption_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Use the headless browser as the last fallback
    pub enabled: bool,

    /// How long to wait for the page body
    pub wait_secs: u64,

    /// Known browser binaries, tried in order
    pub binary_paths: Vec<PathBuf>,

    /// Download Chromium when no configured binary exists
    #[serde(default = "default_allow_download")]
    pub allow_download: bool,
}

fn default_allow_download() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Episode pages live at this URL plus the title slug
    pub episode_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root for per-run scratch directories (system temp dir if unset)
    pub output_dir: Option<PathBuf>,

    /// Default output format
    pub default_output_format: OutputFormat,

    /// yt-dlp executable
    pub yt_dlp_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig {
                min_transcript_chars: 100,
                start_marker: "Transcript".to_string(),
                end_marker: "Show full transcript".to_string(),
                request_timeout_secs: Some(30),
                user_agent: concat!("podscribe/", env!("CARGO_PKG_VERSION")).to_string(),
                caption_languages: vec!["en".to_string()],
            },
            browser: BrowserConfig {
                enabled: true,
                wait_secs: 10,
                binary_paths: vec![
                    PathBuf::from("/usr/bin/google-chrome"),
                    PathBuf::from("/usr/bin/chromium"),
                    PathBuf::from("/usr/bin/chromium-browser"),
                    PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
                ],
                allow_download: true,
            },
            feed: FeedConfig::default(),
            app: AppConfig {
                output_dir: None,
                default_output_format: OutputFormat::Docx,
                yt_dlp_path: "yt-dlp".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("podscribe").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.retrieval.start_marker.is_empty() || self.retrieval.end_marker.is_empty() {
            anyhow::bail!("Transcript start and end markers must not be empty");
        }

        if self.browser.enabled && self.browser.wait_secs == 0 {
            anyhow::bail!("Browser wait must be at least one second");
        }

        if let Some(base) = &self.feed.episode_base_url {
            crate::utils::validate_and_normalize_url(base)
                .context("Invalid feed.episode_base_url")?;
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.retrieval.request_timeout_secs.map(Duration::from_secs)
    }

    /// Scratch root for written documents
    pub fn output_root(&self) -> PathBuf {
        self.app
            .output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Min transcript length: {} characters", self.retrieval.min_transcript_chars);
        println!(
            "  Markers: {:?} .. {:?}",
            self.retrieval.start_marker, self.retrieval.end_marker
        );
        match self.retrieval.request_timeout_secs {
            Some(secs) => println!("  Request timeout: {}s", secs),
            None => println!("  Request timeout: none"),
        }
        println!("  Caption languages: {}", self.retrieval.caption_languages.join(", "));
        println!(
            "  Browser fallback: {} (wait {}s)",
            if self.browser.enabled { "enabled" } else { "disabled" },
            self.browser.wait_secs
        );
        println!(
            "  Chromium download: {}",
            if self.browser.allow_download { "allowed" } else { "disabled" }
        );
        if let Some(base) = &self.feed.episode_base_url {
            println!("  Episode base URL: {}", base);
        }
        println!("  Output root: {}", self.output_root().display());
        println!("  Default Format: {}", self.app.default_output_format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retrieval.min_transcript_chars, 100);
        assert_eq!(config.browser.wait_secs, 10);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_saved_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        Config::default().save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.retrieval.end_marker, "Show full transcript");
        assert_eq!(loaded.app.default_output_format, OutputFormat::Docx);
    }

    #[test]
    fn test_feed_section_is_optional() {
        let mut yaml = serde_yaml::to_string(&Config::default()).unwrap();
        yaml = yaml
            .lines()
            .filter(|line| !line.starts_with("feed:") && !line.starts_with("  episode_base_url"))
            .collect::<Vec<_>>()
            .join("\n");
        let (_dir, path) = write_config(&yaml);

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.feed.episode_base_url, None);
    }

    #[test]
    fn test_allow_download_defaults_on() {
        let yaml = serde_yaml::to_string(&Config::default())
            .unwrap()
            .lines()
            .filter(|line| !line.trim_start().starts_with("allow_download"))
            .collect::<Vec<_>>()
            .join("\n");
        let (_dir, path) = write_config(&yaml);

        assert!(Config::load_from(&path).unwrap().browser.allow_download);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.browser.wait_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retrieval.start_marker.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.feed.episode_base_url = Some("ftp://example.com/".to_string());
        assert!(config.validate().is_err());
    }
}
