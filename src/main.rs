//! Kumo main entry point
//!
//! Command-line interface for running a crawl from a seed URL.

use anyhow::Context;
use clap::Parser;
use kumo::config::{load_config_with_hash, Config};
use kumo::engine::CrawlEngine;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Kumo: a polite, embeddable web crawler engine
///
/// Crawls breadth-first from a seed URL while respecting robots.txt and
/// per-domain rate limits, and reports what it found.
#[derive(Parser, Debug)]
#[command(name = "kumo")]
#[command(version)]
#[command(about = "A polite web crawler engine", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "URL")]
    seed: String,

    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Stop after this many pages, overriding the config value
    #[arg(long, value_name = "N")]
    max_pages: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash);
            config
        }
        None => {
            tracing::info!("No config file given, using defaults");
            Config::default()
        }
    };

    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages_to_crawl = max_pages;
    }

    let seed = Url::parse(&cli.seed).with_context(|| format!("Invalid seed URL: {}", cli.seed))?;

    let mut engine = CrawlEngine::new(config).context("Failed to build crawl engine")?;

    // Progress reporting via the engine's own event surface
    engine.events().on_page_crawl_completed(|args| {
        let status = args
            .page
            .response
            .as_ref()
            .map(|r| r.status_code.to_string())
            .unwrap_or_else(|| "-".to_string());
        match &args.page.transport_error {
            Some(error) => tracing::warn!("{} failed: {}", args.page.page.uri, error),
            None => tracing::info!(
                "{} [{}] {} bytes",
                args.page.page.uri,
                status,
                args.page.content_size_bytes
            ),
        }
    });
    engine.events().on_page_crawl_disallowed(|args| {
        tracing::debug!("Skipped {}: {}", args.page.uri, args.reason);
    });

    let result = engine.crawl(seed).await;

    print_summary(&result);

    if result.error_occurred {
        anyhow::bail!(
            "Crawl failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kumo=info,warn"),
            1 => EnvFilter::new("kumo=debug,info"),
            2 => EnvFilter::new("kumo=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Prints the end-of-crawl summary
fn print_summary(result: &kumo::engine::CrawlResult) {
    println!("\n=== Crawl Summary ===");
    println!("Root:          {}", result.root_uri);
    println!("Pages crawled: {}", result.context.crawled_count());
    println!("Elapsed:       {:.2?}", result.elapsed);

    if result.context.is_stop_requested() {
        println!(
            "Stopped:       cooperative stop requested ({} pages left queued)",
            result.residual_frontier_count
        );
    }
    if result.error_occurred {
        println!(
            "Error:         {}",
            result.error_message.as_deref().unwrap_or("unknown")
        );
    }
}
