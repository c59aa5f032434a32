use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::database::Database;
use crate::extractor;
use crate::matcher::RuleSet;
use crate::models::{ActivityAction, ClientTorrent, StagedTorrent, TorrentStatus};
use crate::traits::{DownloadClient, FeedSource};

/// Why a review action on a staged torrent could not be carried out
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("torrent {0} not found")]
    NotFound(i64),
    #[error("torrent {id} already {status}")]
    NotPending { id: i64, status: TorrentStatus },
    #[error("download client unavailable")]
    ClientUnavailable,
    #[error("torrent {0} not found in download client")]
    NotInClient(i64),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Feed polling, staging and review on top of the store and the download client
#[derive(Clone)]
pub struct Curator {
    feeds: Arc<dyn FeedSource>,
    database: Database,
    rules: Arc<RuleSet>,
    feed_urls: Vec<String>,
    client: Option<Arc<dyn DownloadClient>>,
    /// Serializes approve/reject so a torrent is only sent to the client once
    review_lock: Arc<Mutex<()>>,
}

impl Curator {
    pub fn new(
        feeds: Arc<dyn FeedSource>,
        database: Database,
        rules: RuleSet,
        feed_urls: Vec<String>,
        client: Option<Arc<dyn DownloadClient>>,
    ) -> Self {
        Self {
            feeds,
            database,
            rules: Arc::new(rules),
            feed_urls,
            client,
            review_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&Arc<dyn DownloadClient>, ReviewError> {
        self.client.as_ref().ok_or(ReviewError::ClientUnavailable)
    }

    /// Fetch every feed, match its items and stage the new matches.
    ///
    /// A feed that fails to fetch is logged and skipped. Returns the number
    /// of newly staged torrents.
    pub async fn check_feeds(&self) -> Result<usize> {
        let mut new_torrents = 0;

        for url in &self.feed_urls {
            let raw_items = match self.feeds.fetch(url).await {
                Ok(items) => items,
                Err(e) => {
                    error!("Error fetching feed {}: {:#}", url, e);
                    continue;
                }
            };

            let items = raw_items.into_iter().map(extractor::enrich).collect();
            let matches = self.rules.evaluate_all(items);
            info!("Matched {} items from {}", matches.len(), url);

            for (item, decision) in matches {
                let title = item.title.clone();
                let staged = StagedTorrent::pending(item, decision.reason);

                match self.database.insert_if_absent(&staged).await {
                    Ok(Some(id)) => {
                        info!("Staged torrent {}: {} ({})", id, title, staged.match_reason);
                        new_torrents += 1;
                    }
                    Ok(None) => {}
                    Err(e) => error!("Error staging torrent {}: {:#}", title, e),
                }
            }
        }

        if new_torrents > 0 {
            info!("Staged {} new torrents", new_torrents);
        } else {
            info!("No new matches found");
        }

        Ok(new_torrents)
    }

    async fn pending_torrent(&self, id: i64) -> Result<StagedTorrent, ReviewError> {
        let torrent = self
            .database
            .get(id)
            .await?
            .ok_or(ReviewError::NotFound(id))?;

        if torrent.status.is_terminal() {
            return Err(ReviewError::NotPending {
                id,
                status: torrent.status,
            });
        }

        Ok(torrent)
    }

    /// Move a pending torrent to `status`, failing if it was reviewed meanwhile.
    async fn transition(&self, id: i64, status: TorrentStatus) -> Result<(), ReviewError> {
        if self.database.update_status(id, status).await? {
            return Ok(());
        }

        match self.database.get(id).await? {
            Some(current) => Err(ReviewError::NotPending {
                id,
                status: current.status,
            }),
            None => Err(ReviewError::NotFound(id)),
        }
    }

    /// Send a pending torrent to the download client and mark it approved.
    pub async fn approve(&self, id: i64) -> Result<StagedTorrent, ReviewError> {
        let client = self.client()?;
        let _review = self.review_lock.lock().await;
        let mut torrent = self.pending_torrent(id).await?;

        let options = HashMap::from([("title".to_string(), torrent.feed_item.title.clone())]);
        client
            .add_torrent(&torrent.feed_item.link, &options)
            .await?;

        if let Err(e) = self.transition(id, TorrentStatus::Approved).await {
            error!(
                "Torrent {} was added to the client but could not be marked approved: {}",
                id, e
            );
            return Err(e);
        }
        self.record(&torrent, ActivityAction::Approve).await;

        info!("Approved torrent {}: {}", id, torrent.feed_item.title);
        torrent.status = TorrentStatus::Approved;
        Ok(torrent)
    }

    /// Mark a pending torrent rejected.
    pub async fn reject(&self, id: i64) -> Result<StagedTorrent, ReviewError> {
        let _review = self.review_lock.lock().await;
        let mut torrent = self.pending_torrent(id).await?;

        self.transition(id, TorrentStatus::Rejected).await?;
        self.record(&torrent, ActivityAction::Reject).await;

        info!("Rejected torrent {}: {}", id, torrent.feed_item.title);
        torrent.status = TorrentStatus::Rejected;
        Ok(torrent)
    }

    /// The activity log is an audit trail; failing to write it does not undo the review.
    async fn record(&self, torrent: &StagedTorrent, action: ActivityAction) {
        if let Err(e) = self
            .database
            .log_activity(
                torrent.id,
                &torrent.feed_item.title,
                action,
                &torrent.match_reason,
            )
            .await
        {
            warn!("Failed to log {} for torrent {}: {:#}", action, torrent.id, e);
        }
    }

    /// Locate the client-side torrent for a staged entry by its title.
    async fn client_torrent(&self, id: i64) -> Result<(StagedTorrent, ClientTorrent), ReviewError> {
        let client = self.client()?;
        let torrent = self
            .database
            .get(id)
            .await?
            .ok_or(ReviewError::NotFound(id))?;

        let found = client
            .find_by_name(&torrent.feed_item.title)
            .await?
            .ok_or(ReviewError::NotInClient(id))?;

        Ok((torrent, found))
    }

    pub async fn pause(&self, id: i64) -> Result<StagedTorrent, ReviewError> {
        let (torrent, found) = self.client_torrent(id).await?;
        self.client()?.pause(&found.hash).await?;

        info!("Paused torrent {}: {}", id, torrent.feed_item.title);
        Ok(torrent)
    }

    pub async fn resume(&self, id: i64) -> Result<StagedTorrent, ReviewError> {
        let (torrent, found) = self.client_torrent(id).await?;
        self.client()?.resume(&found.hash).await?;

        info!("Resumed torrent {}: {}", id, torrent.feed_item.title);
        Ok(torrent)
    }

    /// Delete approved/rejected entries staged more than `days` ago.
    pub async fn prune(&self, days: u32) -> Result<u64> {
        let deleted = self
            .database
            .delete_older_than(Duration::days(i64::from(days)))
            .await?;

        info!("Pruned {} reviewed torrents older than {} days", deleted, days);
        Ok(deleted)
    }
}
