use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podscribe::cli::{Cli, Commands, OutputFormat};
use podscribe::config::Config;
use podscribe::episodes::Episode;
use podscribe::pipeline::TranscriptPipeline;
use podscribe::session::DownloadBoard;
use podscribe::{utils, TranscriptOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "podscribe=debug" } else { "podscribe=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load().await?;

    match cli.command {
        Commands::List { source, base_url } => {
            if base_url.is_some() {
                config.feed.episode_base_url = base_url;
            }
            config.browser.enabled = false;

            let pipeline = TranscriptPipeline::new(&config)?;
            let episodes = pipeline.list_episodes(&source).await?;

            println!(
                "Episodes from {}:",
                utils::extract_domain(&source).unwrap_or_else(|| source.clone())
            );
            for (index, episode) in episodes.iter().enumerate() {
                println!("{:>4}. {}", index + 1, style(&episode.title).bold());
                println!("      {}", style(&episode.locator).dim());
            }
        }
        Commands::Fetch {
            locator,
            title,
            output,
            format,
            no_browser,
            print,
        } => {
            if no_browser {
                config.browser.enabled = false;
            }
            let format = format.unwrap_or(config.app.default_output_format);
            let pipeline = build_pipeline(&config, output)?;

            let progress = spinner(cli.quiet, "Retrieving transcript...");
            let outcome = pipeline.fetch_transcript(&locator).await;
            progress.finish_and_clear();

            let text = match outcome {
                TranscriptOutcome::Found { text, strategy } => {
                    tracing::info!("Transcript retrieved via {}", strategy);
                    text
                }
                TranscriptOutcome::Failed { cause } => {
                    anyhow::bail!("Transcript not available: {}", cause);
                }
            };

            if print {
                println!("{}", text);
            } else {
                let title = title.unwrap_or_else(|| locator.clone());
                let artifact = pipeline.write_document(&text, &title, format)?;
                println!("Transcript saved to: {}", artifact.path.display());
            }
        }
        Commands::Download {
            source,
            episodes,
            latest,
            base_url,
            output,
            format,
            no_browser,
        } => {
            if base_url.is_some() {
                config.feed.episode_base_url = base_url;
            }
            if no_browser {
                config.browser.enabled = false;
            }
            let format = format.unwrap_or(config.app.default_output_format);
            let pipeline = build_pipeline(&config, output)?;

            let listed = pipeline.list_episodes(&source).await?;
            let selected = select_episodes(&listed, &episodes, latest)?;

            let mut board = DownloadBoard::new();
            let mut failures = 0usize;

            for episode in selected {
                let progress = spinner(cli.quiet, &format!("Preparing {}...", episode.title));
                let result = pipeline.prepare_download(&mut board, episode, format).await;
                progress.finish_and_clear();

                match result {
                    Ok(artifact) => println!(
                        "{} {} -> {}",
                        style("ready").green().bold(),
                        episode.title,
                        artifact.path.display()
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("{} {}: {:#}", style("failed").red().bold(), episode.title, e);
                    }
                }
            }

            println!(
                "{} document(s) ready in {}",
                board.ready().count(),
                pipeline.scratch_dir().display()
            );
            if failures > 0 {
                anyhow::bail!("{} episode(s) could not be prepared", failures);
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file to change settings:");
                println!("  {}", Config::config_path()?.display());
            }
        }
        Commands::Sources => {
            let pipeline = TranscriptPipeline::new(&config)?;

            println!("Episode sources:");
            for name in pipeline.source_names() {
                println!("  • {}", name);
            }
            println!("Transcript strategies, in order:");
            for name in pipeline.strategy_names() {
                println!("  • {}", name);
            }

            let missing = utils::check_dependencies(&config.app.yt_dlp_path).await;
            if !missing.is_empty() {
                println!("⚠️  Missing optional tools:");
                for dep in missing {
                    println!("   • {}", dep);
                }
            }
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config, output: Option<PathBuf>) -> Result<TranscriptPipeline> {
    let mut config = config.clone();
    if output.is_some() {
        config.app.output_dir = output;
    }
    TranscriptPipeline::new(&config)
}

/// Pick episodes by 1-based number, the latest one, or all of them
fn select_episodes<'a>(listed: &'a [Episode], numbers: &[usize], latest: bool) -> Result<Vec<&'a Episode>> {
    if latest {
        return listed
            .first()
            .map(|episode| vec![episode])
            .ok_or_else(|| anyhow::anyhow!("The source lists no episodes"));
    }

    if numbers.is_empty() {
        return Ok(listed.iter().collect());
    }

    numbers
        .iter()
        .map(|&n| {
            n.checked_sub(1)
                .and_then(|index| listed.get(index))
                .ok_or_else(|| anyhow::anyhow!("No episode number {} (source has {})", n, listed.len()))
        })
        .collect()
}

fn spinner(quiet: bool, message: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(style);
    }
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
