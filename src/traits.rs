//! Traits for the feed transport and the download client

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ClientTorrent, RawFeedItem};

/// Source of raw feed items
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse every item of the feed at `url`
    ///
    /// # Returns
    /// * `Result<Vec<RawFeedItem>>` - Items in feed order or a transport/parse error
    async fn fetch(&self, url: &str) -> Result<Vec<RawFeedItem>>;
}

/// Torrent client that approved downloads are handed to
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Submit a download link
    ///
    /// # Arguments
    /// * `url` - Torrent file URL or magnet link
    /// * `options` - Per-call overrides of the client defaults (category, savepath, paused, title)
    async fn add_torrent(&self, url: &str, options: &HashMap<String, String>) -> Result<()>;

    /// Torrents currently known to the client
    async fn list_torrents(&self) -> Result<Vec<ClientTorrent>>;

    async fn pause(&self, hash: &str) -> Result<()>;

    async fn resume(&self, hash: &str) -> Result<()>;

    /// Check that the client is reachable and the session is valid
    async fn test_connection(&self) -> Result<()>;

    /// Find a client-side torrent by its exact name
    ///
    /// # Arguments
    /// * `name` - The release title the torrent was staged under
    ///
    /// # Returns
    /// * `Result<Option<ClientTorrent>>` - The first torrent with that name, if any
    async fn find_by_name(&self, name: &str) -> Result<Option<ClientTorrent>> {
        let torrents = self.list_torrents().await?;
        Ok(torrents.into_iter().find(|t| t.name == name))
    }
}
