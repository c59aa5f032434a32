use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::info;

use crate::models::RawFeedItem;
use crate::traits::FeedSource;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// RSS 2.0 feed reader
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rss-curator/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<RawFeedItem>> {
        info!("Fetching feed: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch feed {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch feed {}: {}",
                url,
                response.status()
            ));
        }

        let body = response.bytes().await?;
        let items = parse_feed(&body).with_context(|| format!("failed to parse feed {url}"))?;

        info!("Found {} items in {}", items.len(), url);
        Ok(items)
    }
}

/// Parse an RSS document into raw items.
pub fn parse_feed(body: &[u8]) -> Result<Vec<RawFeedItem>> {
    let channel = rss::Channel::read_from(body)?;

    let items = channel
        .items()
        .iter()
        .map(|item| RawFeedItem {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            guid: item
                .guid()
                .map(|g| g.value().to_string())
                .unwrap_or_default(),
            // Unparseable dates are dropped rather than failing the item
            pub_date: item
                .pub_date()
                .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            description: item.description().unwrap_or_default().to_string(),
        })
        .collect();

    Ok(items)
}
