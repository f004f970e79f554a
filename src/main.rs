//! newshound command-line entry point

use anyhow::Context;
use clap::{ArgAction, Parser};
use newshound::config::{load_config_with_hash, SourceRegistry};
use newshound::extract::{ContentAnalyst, HttpAnalyst};
use newshound::planner::Planner;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Polite news-article crawler
#[derive(Parser, Debug)]
#[command(name = "newshound", version, about)]
struct Cli {
    /// Path to the TOML config file
    config: PathBuf,

    /// Path to the JSON source registry
    #[arg(long, default_value = "sources.json")]
    sources: PathBuf,

    /// Operate on a single source instead of all of them
    #[arg(long)]
    source_name: Option<String>,

    /// Discover feed URLs for sources that have none
    #[arg(long)]
    discover_rss: bool,

    /// Poll known feeds and queue recent entries
    #[arg(long)]
    poll_rss: bool,

    /// Expand sitemaps and queue recent entries
    #[arg(long)]
    process_sitemaps: bool,

    /// Harvest article links from listing pages
    #[arg(long)]
    fallback_crawl: bool,

    /// Run the full discovery sequence for every source
    #[arg(long)]
    run_all_discovery: bool,

    /// Consume the work queue: fetch, extract, persist
    #[arg(long)]
    process_queued_items: bool,

    /// How many days back an item still counts as new
    #[arg(long, default_value_t = 2)]
    recency_days: i64,

    /// Repeat the whole run every N minutes (0 runs once)
    #[arg(long, default_value_t = 0)]
    loop_delay_mins: u64,

    /// Print the configured sources and exit
    #[arg(long)]
    list_sources: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// True when no stage flag was given, which means "do everything"
    fn default_run(&self) -> bool {
        !(self.discover_rss
            || self.poll_rss
            || self.process_sitemaps
            || self.fallback_crawl
            || self.run_all_discovery
            || self.process_queued_items)
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "newshound=error"
    } else {
        match verbose {
            0 => "newshound=info,warn",
            1 => "newshound=debug,info",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    tracing::info!(
        "Loaded config {} (sha256 {})",
        cli.config.display(),
        &config_hash[..12]
    );

    let registry = SourceRegistry::load(&cli.sources)
        .with_context(|| format!("loading sources from {}", cli.sources.display()))?;

    if cli.list_sources {
        for source in registry.sources() {
            let feed = source.rss_feed.as_deref().unwrap_or("-");
            let selectors = if source.has_selectors() {
                "selectors"
            } else if source.llm_analysis_pending {
                "learning pending"
            } else {
                "no selectors"
            };
            println!("{}\t{}\tfeed: {}\t{}", source.name, source.base_url, feed, selectors);
        }
        return Ok(());
    }

    let analyst: Option<Arc<dyn ContentAnalyst>> = HttpAnalyst::from_config(&config.analyst)
        .map(|a| Arc::new(a) as Arc<dyn ContentAnalyst>);
    if analyst.is_none() {
        tracing::info!("No analyst endpoint configured; analyst strategies disabled");
    }

    let planner = Arc::new(Planner::new(config, registry, analyst)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; finishing in-flight work");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut cycles: u64 = 0;
    loop {
        cycles += 1;
        tracing::info!("Starting cycle {}", cycles);
        run_cycle(&planner, &cli, shutdown_rx.clone()).await;

        let summary = planner.summary();
        println!(
            "Cycle {} complete: {} processed this run, {} stored in total, {} still queued, {} warnings",
            cycles,
            summary.processed_this_run,
            summary.stored_total,
            summary.queued_remaining,
            summary.warnings,
        );

        if cli.loop_delay_mins == 0 || *shutdown_rx.borrow() {
            break;
        }
        tracing::info!("Sleeping {} minute(s) until the next cycle", cli.loop_delay_mins);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cli.loop_delay_mins * 60)) => {}
            _ = wait_for_shutdown(shutdown_rx.clone()) => break,
        }
    }

    Ok(())
}

/// Resolves once the shutdown signal flips to true
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow() {
            return;
        }
    }
}

/// Runs the stages the CLI asked for, once
async fn run_cycle(planner: &Arc<Planner>, cli: &Cli, shutdown: watch::Receiver<bool>) {
    let default_run = cli.default_run();

    if cli.run_all_discovery || default_run {
        match &cli.source_name {
            Some(name) => run_source_stages(planner, name, cli, true).await,
            None => {
                planner.run_all_discovery(cli.recency_days).await;
            }
        }
    } else if cli.discover_rss || cli.poll_rss || cli.process_sitemaps || cli.fallback_crawl {
        let names = match &cli.source_name {
            Some(name) => vec![name.clone()],
            None => planner.source_names(),
        };
        for name in names {
            run_source_stages(planner, &name, cli, false).await;
        }
    }

    if cli.process_queued_items || default_run || cli.run_all_discovery {
        Arc::clone(planner).process_queued_items(shutdown).await;
    }
}

/// Runs the selected (or, for `all_stages`, the full) discovery sequence
/// for one source, reporting failures without aborting
async fn run_source_stages(planner: &Arc<Planner>, name: &str, cli: &Cli, all_stages: bool) {
    let mut queued = 0;

    if all_stages || cli.discover_rss {
        if let Err(e) = planner.discover_rss_feed_for_source(name).await {
            planner
                .monitor()
                .report_failure("planner", name, &format!("feed discovery failed: {}", e));
        }
    }
    if all_stages || cli.poll_rss {
        match planner.poll_rss_feed(name, cli.recency_days).await {
            Ok(n) => queued += n,
            Err(e) => planner
                .monitor()
                .report_failure("planner", name, &format!("feed poll failed: {}", e)),
        }
    }
    if all_stages || cli.process_sitemaps {
        match planner
            .discover_and_process_sitemaps(name, cli.recency_days)
            .await
        {
            Ok(n) => queued += n,
            Err(e) => planner
                .monitor()
                .report_failure("planner", name, &format!("sitemap discovery failed: {}", e)),
        }
    }
    if cli.fallback_crawl || (all_stages && queued == 0) {
        if let Err(e) = planner.fallback_crawl(name, cli.recency_days).await {
            planner
                .monitor()
                .report_failure("planner", name, &format!("fallback crawl failed: {}", e));
        }
    }
}
