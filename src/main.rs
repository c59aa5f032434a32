use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

mod api;
mod cli;
mod config;
mod console;
mod curator;
mod database;
mod extractor;
mod feed;
mod matcher;
mod models;
mod qbittorrent;
mod traits;

use cli::{Cli, Command};
use config::Config;
use curator::Curator;
use database::Database;
use feed::FeedFetcher;
use matcher::RuleSet;
use models::TorrentStatus;
use qbittorrent::QBittorrentClient;
use traits::{DownloadClient, FeedSource};

const DEFAULT_CLEANUP_PATTERN: &str = "%/t/%";
const PRUNE_SCHEDULE: &str = "0 0 3 * * *";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Command::Version = cli.command {
        println!("curator {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::from_env()?;

    match cli.command {
        Command::Check => {
            let curator = build_curator(&config, None).await?;
            let staged = curator.check_feeds().await?;
            println!("Staged {staged} new torrents");
        }
        Command::List { status } => {
            let status: TorrentStatus = status.parse()?;
            let curator = build_curator(&config, None).await?;
            let torrents = curator.database().list(Some(status)).await?;
            if torrents.is_empty() {
                println!("No {status} torrents");
            } else {
                console::print_torrents(&torrents);
            }
        }
        Command::Approve { ids } => {
            let client = connect_client(&config).await?;
            let curator = build_curator(&config, Some(client)).await?;
            for id in ids {
                match curator.approve(id).await {
                    Ok(t) => println!("Approved {}: {}", id, t.feed_item.title),
                    Err(e) => error!("Error approving torrent {}: {}", id, e),
                }
            }
        }
        Command::Reject { ids } => {
            let curator = build_curator(&config, None).await?;
            for id in ids {
                match curator.reject(id).await {
                    Ok(t) => println!("Rejected {}: {}", id, t.feed_item.title),
                    Err(e) => error!("Error rejecting torrent {}: {}", id, e),
                }
            }
        }
        Command::Review => {
            let client = optional_client(&config).await;
            let curator = build_curator(&config, client).await?;
            console::review(&curator).await?;
        }
        Command::Test => test_setup(&config).await?,
        Command::Pause { ids } => {
            let client = connect_client(&config).await?;
            let curator = build_curator(&config, Some(client)).await?;
            for id in ids {
                match curator.pause(id).await {
                    Ok(t) => println!("Paused {}: {}", id, t.feed_item.title),
                    Err(e) => error!("Error pausing torrent {}: {}", id, e),
                }
            }
        }
        Command::Resume { ids } => {
            let client = connect_client(&config).await?;
            let curator = build_curator(&config, Some(client)).await?;
            for id in ids {
                match curator.resume(id).await {
                    Ok(t) => println!("Resumed {}: {}", id, t.feed_item.title),
                    Err(e) => error!("Error resuming torrent {}: {}", id, e),
                }
            }
        }
        Command::Cleanup { patterns } => {
            let patterns = if patterns.is_empty() {
                vec![DEFAULT_CLEANUP_PATTERN.to_string()]
            } else {
                patterns
            };
            let database = Database::new(&config.database_url()).await?;
            let deleted = database.cleanup_stale_links(&patterns).await?;
            println!("Removed {deleted} pending torrents matching {patterns:?}");
        }
        Command::Prune { days } => {
            let days = days.unwrap_or(config.retention_days);
            let curator = build_curator(&config, None).await?;
            let deleted = curator.prune(days).await?;
            println!("Pruned {deleted} torrents older than {days} days");
        }
        Command::Serve => serve(&config).await?,
        Command::Version => {}
    }

    Ok(())
}

async fn build_curator(
    config: &Config,
    client: Option<Arc<dyn DownloadClient>>,
) -> Result<Curator> {
    let database = Database::new(&config.database_url()).await?;
    let feeds = Arc::new(FeedFetcher::new()?);

    Ok(Curator::new(
        feeds,
        database,
        config.rules.clone(),
        config.feed_urls.clone(),
        client,
    ))
}

async fn connect_client(config: &Config) -> Result<Arc<dyn DownloadClient>> {
    let client = QBittorrentClient::connect(&config.qbittorrent).await?;
    Ok(Arc::new(client))
}

/// Connect when possible; commands that can work without qBittorrent keep going.
async fn optional_client(config: &Config) -> Option<Arc<dyn DownloadClient>> {
    match connect_client(config).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("qBittorrent unavailable, approvals disabled: {:#}", e);
            None
        }
    }
}

async fn test_setup(config: &Config) -> Result<()> {
    println!("Testing qBittorrent at {}...", config.qbittorrent.host);
    match connect_client(config).await {
        Ok(client) => {
            let torrents = client.list_torrents().await?;
            println!("  OK ({} torrents in client)", torrents.len());
        }
        Err(e) => println!("  FAILED: {e:#}"),
    }

    let fetcher = FeedFetcher::new()?;
    for url in &config.feed_urls {
        println!("Testing feed {url}...");
        match fetcher.fetch(url).await {
            Ok(items) => println!("  OK ({} items)", items.len()),
            Err(e) => println!("  FAILED: {e:#}"),
        }
    }

    match &config.rules {
        RuleSet::PerShow(shows) => {
            println!("Watching {} shows:", shows.shows.len());
            for show in &shows.shows {
                println!("  - {}", show.name);
            }
        }
        RuleSet::Legacy(rules) if rules.show_names.is_empty() => {
            println!("Watching all shows (min quality {})", rules.min_quality);
        }
        RuleSet::Legacy(rules) => {
            println!("Watching {} shows:", rules.show_names.len());
            for name in &rules.show_names {
                println!("  - {name}");
            }
        }
    }

    Ok(())
}

async fn serve(config: &Config) -> Result<()> {
    let client = optional_client(config).await;
    let curator = build_curator(config, client).await?;

    info!("Starting RSS curator");

    if let Err(e) = curator.check_feeds().await {
        error!("Error during initial check: {}", e);
    }

    let schedule = poll_schedule(config.poll_interval)?;
    let sched = JobScheduler::new().await?;

    let job_curator = curator.clone();
    sched
        .add(Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let curator = job_curator.clone();
            Box::pin(async move {
                if let Err(e) = curator.check_feeds().await {
                    error!("Error checking feeds: {}", e);
                }
            })
        })?)
        .await?;

    let prune_curator = curator.clone();
    let retention_days = config.retention_days;
    sched
        .add(Job::new_async(PRUNE_SCHEDULE, move |_uuid, _l| {
            let curator = prune_curator.clone();
            Box::pin(async move {
                if let Err(e) = curator.prune(retention_days).await {
                    error!("Error pruning old torrents: {}", e);
                }
            })
        })?)
        .await?;

    info!(
        "Scheduler started - checking every {} minutes",
        config.poll_interval
    );
    sched.start().await?;

    api::serve(curator, config.api_port).await
}

/// Cron expression (with seconds) firing every `minutes` minutes.
///
/// Intervals of an hour or more must be whole hours.
fn poll_schedule(minutes: u32) -> Result<String> {
    match minutes {
        0 => bail!("POLL_INTERVAL must be at least 1 minute"),
        1..=59 => Ok(format!("0 */{minutes} * * * *")),
        m if m % 60 == 0 && m / 60 <= 24 => Ok(format!("0 0 */{} * * *", m / 60)),
        m => bail!("POLL_INTERVAL of {m} minutes cannot be scheduled; use 1-59 or whole hours"),
    }
}
