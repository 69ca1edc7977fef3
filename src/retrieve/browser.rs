use async_trait::async_trait;
use futures_util::FutureExt;
use headless_chrome::browser::FetcherOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{Markers, PageContext, TranscriptStrategy};
use crate::{Result, ScribeError};

/// A live headless browser with one page open
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn wait_for_body(&mut self, timeout: Duration) -> Result<()>;

    /// Visible text of the rendered `<body>`
    async fn body_text(&mut self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

/// Starts browser sessions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Renders the page in a headless browser and slices its visible text
pub struct BrowserStrategy {
    launcher: Arc<dyn BrowserLauncher>,
    markers: Markers,
    wait: Duration,
}

impl BrowserStrategy {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, markers: Markers, wait: Duration) -> Self {
        Self {
            launcher,
            markers,
            wait,
        }
    }

    async fn render(&self, session: &mut dyn BrowserSession, locator: &str) -> Result<Option<String>> {
        session.navigate(locator).await?;
        session.wait_for_body(self.wait).await?;
        let text = session.body_text().await?;

        tracing::debug!("Rendered page has {} characters of text", text.chars().count());

        if text.trim().is_empty() {
            return Ok(None);
        }

        match self.markers.slice(&text) {
            Some(transcript) => Ok(Some(transcript.to_string())),
            None => {
                tracing::warn!("Transcript markers not found in rendered page; using full page text");
                Ok(Some(text))
            }
        }
    }
}

#[async_trait]
impl TranscriptStrategy for BrowserStrategy {
    fn name(&self) -> &'static str {
        "headless browser"
    }

    fn supports(&self, locator: &str) -> bool {
        locator.starts_with("http://") || locator.starts_with("https://")
    }

    async fn attempt(&self, page: &mut PageContext<'_>) -> Result<Option<String>> {
        let locator = page.locator();
        let mut session = self.launcher.launch().await?;

        let rendered = AssertUnwindSafe(self.render(session.as_mut(), locator))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browser session: {:#}", e);
        }

        match rendered {
            Ok(result) => result,
            Err(_) => Err(ScribeError::Browser("render step panicked".to_string()).into()),
        }
    }
}

/// One way of starting Chrome, in the order they are tried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCandidate {
    /// A configured binary that exists on disk
    Configured(PathBuf),

    /// Chromium downloaded into the library's cache on first use
    Downloaded,

    /// The installation found by the library's executable search
    Detected(PathBuf),
}

impl std::fmt::Display for BrowserCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserCandidate::Configured(path) => write!(f, "configured {}", path.display()),
            BrowserCandidate::Downloaded => write!(f, "downloaded Chromium"),
            BrowserCandidate::Detected(path) => write!(f, "detected {}", path.display()),
        }
    }
}

/// Configured paths that exist, then a downloaded Chromium, then the detected install
pub fn launch_candidates(
    binary_paths: &[PathBuf],
    allow_download: bool,
    detected: Option<PathBuf>,
) -> Vec<BrowserCandidate> {
    let mut candidates: Vec<BrowserCandidate> = binary_paths
        .iter()
        .filter(|path| path.exists())
        .cloned()
        .map(BrowserCandidate::Configured)
        .collect();

    if allow_download {
        candidates.push(BrowserCandidate::Downloaded);
    }

    if let Some(detected) = detected {
        if !binary_paths.contains(&detected) {
            candidates.push(BrowserCandidate::Detected(detected));
        }
    }

    candidates
}

/// Launches headless Chrome/Chromium
pub struct ChromeLauncher {
    binary_paths: Vec<PathBuf>,
    allow_download: bool,
}

impl ChromeLauncher {
    pub fn new(binary_paths: Vec<PathBuf>, allow_download: bool) -> Self {
        Self {
            binary_paths,
            allow_download,
        }
    }

    fn candidates(&self) -> Vec<BrowserCandidate> {
        launch_candidates(
            &self.binary_paths,
            self.allow_download,
            headless_chrome::browser::default_executable().ok(),
        )
    }

    fn start(candidate: &BrowserCandidate) -> Result<Browser> {
        let (path, fetcher_options) = match candidate {
            BrowserCandidate::Configured(path) | BrowserCandidate::Detected(path) => {
                (Some(path.clone()), FetcherOptions::default().with_allow_download(false))
            }
            BrowserCandidate::Downloaded => (None, FetcherOptions::default().with_allow_download(true)),
        };

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(path)
            .fetcher_options(fetcher_options)
            .args(vec![OsStr::new("--disable-gpu")])
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid browser launch options: {}", e))?;

        Browser::new(options)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let candidates = self.candidates();

        let (browser, tab) = tokio::task::spawn_blocking(move || {
            let mut last_error = None;

            for candidate in candidates {
                match Self::start(&candidate) {
                    Ok(browser) => {
                        tracing::debug!("Launched headless browser: {}", candidate);
                        let tab = browser.new_tab()?;
                        return Ok((browser, tab));
                    }
                    Err(e) => {
                        tracing::debug!("Browser launch failed for {}: {:#}", candidate, e);
                        last_error = Some(e);
                    }
                }
            }

            Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No browser found and Chromium download is disabled")))
        })
        .await?
        .map_err(|e| ScribeError::Browser(format!("{:#}", e)))?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
        }))
    }
}

/// One open Chrome tab. Dropping the browser handle ends the process.
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || tab.navigate_to(&url).map(|_| ())).await?
    }

    async fn wait_for_body(&mut self, timeout: Duration) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            tab.wait_for_element_with_custom_timeout("body", timeout).map(|_| ())
        })
        .await?
    }

    async fn body_text(&mut self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            let body = tab.find_element("body")?;
            body.get_inner_text()
        })
        .await?
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.take() {
            tracing::debug!("Closing headless browser");
            tokio::task::spawn_blocking(move || drop(browser)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::fetch::MockPageFetcher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = "https://example.com/ep";

    #[derive(Clone, Copy)]
    enum FailAt {
        Nowhere,
        Navigate,
        Wait,
        Text,
    }

    fn session(fail_at: FailAt, text: &'static str) -> MockBrowserSession {
        let mut session = MockBrowserSession::new();
        session.expect_navigate().returning(move |_| match fail_at {
            FailAt::Navigate => Err(anyhow::anyhow!("navigation failed")),
            _ => Ok(()),
        });
        session.expect_wait_for_body().returning(move |_| match fail_at {
            FailAt::Wait => Err(anyhow::anyhow!("timed out")),
            _ => Ok(()),
        });
        session.expect_body_text().returning(move || match fail_at {
            FailAt::Text => Err(anyhow::anyhow!("element gone")),
            _ => Ok(text.to_string()),
        });
        session.expect_close().times(1).returning(|| Ok(()));
        session
    }

    fn strategy(session: MockBrowserSession) -> BrowserStrategy {
        let mut launcher = MockBrowserLauncher::new();
        launcher
            .expect_launch()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn BrowserSession>));

        BrowserStrategy::new(
            Arc::new(launcher),
            Markers::new("Transcript", "Show full transcript"),
            Duration::from_secs(10),
        )
    }

    async fn run(strategy: &BrowserStrategy) -> Result<Option<String>> {
        let fetcher = MockPageFetcher::new();
        let mut page = PageContext::new(PAGE, &fetcher);
        strategy.attempt(&mut page).await
    }

    #[tokio::test]
    async fn test_slices_rendered_text() {
        let strategy = strategy(session(
            FailAt::Nowhere,
            "Menu\nTranscript\nHello and welcome.\nShow full transcript\nFooter",
        ));
        assert_eq!(run(&strategy).await.unwrap(), Some("Hello and welcome.".to_string()));
    }

    #[tokio::test]
    async fn test_returns_full_text_without_markers() {
        let strategy = strategy(session(FailAt::Nowhere, "just a page"));
        assert_eq!(run(&strategy).await.unwrap(), Some("just a page".to_string()));
    }

    #[tokio::test]
    async fn test_session_closed_once_on_each_failure() {
        for fail_at in [FailAt::Navigate, FailAt::Wait, FailAt::Text] {
            let strategy = strategy(session(fail_at, "unused"));
            assert!(run(&strategy).await.is_err());
            // the `times(1)` expectation on close is verified when the mock drops
        }
    }

    struct PanickingSession {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserSession for PanickingSession {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            panic!("driver crashed");
        }

        async fn wait_for_body(&mut self, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn body_text(&mut self) -> Result<String> {
            Ok(String::new())
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_session_closed_when_render_panics() {
        let closes = Arc::new(AtomicUsize::new(0));
        let session = PanickingSession {
            closes: Arc::clone(&closes),
        };

        let mut launcher = MockBrowserLauncher::new();
        launcher
            .expect_launch()
            .return_once(move || Ok(Box::new(session) as Box<dyn BrowserSession>));
        let strategy = BrowserStrategy::new(
            Arc::new(launcher),
            Markers::new("Transcript", "Show full transcript"),
            Duration::from_secs(1),
        );

        let err = run(&strategy).await.unwrap_err();
        assert!(err.to_string().contains("render step panicked"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_an_error() {
        let mut launcher = MockBrowserLauncher::new();
        launcher
            .expect_launch()
            .returning(|| Err(anyhow::anyhow!("no chrome")));

        let strategy = BrowserStrategy::new(
            Arc::new(launcher),
            Markers::new("Transcript", "Show full transcript"),
            Duration::from_secs(1),
        );
        assert!(run(&strategy).await.is_err());
    }

    #[test]
    fn test_launch_candidate_order() {
        let dir = tempfile::tempdir().unwrap();
        let installed = dir.path().join("chrome");
        fs_err::write(&installed, b"").unwrap();
        let missing = dir.path().join("chromium");
        let detected = PathBuf::from("/opt/detected/chrome");

        let candidates = launch_candidates(
            &[missing.clone(), installed.clone()],
            true,
            Some(detected.clone()),
        );
        assert_eq!(
            candidates,
            vec![
                BrowserCandidate::Configured(installed.clone()),
                BrowserCandidate::Downloaded,
                BrowserCandidate::Detected(detected),
            ]
        );

        let candidates = launch_candidates(&[installed.clone()], false, Some(installed.clone()));
        assert_eq!(candidates, vec![BrowserCandidate::Configured(installed)]);

        assert_eq!(launch_candidates(&[missing], true, None), vec![BrowserCandidate::Downloaded]);
    }
}
