//! Data models for feed items, staged torrents and the activity log

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An item as read from an RSS feed, before any metadata extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub description: String,
}

/// A feed item enriched with the metadata parsed from its title and description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub size: u64,
    pub description: String,

    pub show_name: String,
    pub season: u32,
    pub episode: u32,
    pub quality: String,
    pub codec: String,
    pub source: String,
    pub release_group: String,
}

/// Outcome of evaluating a feed item against the configured rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDecision {
    pub accepted: bool,
    pub reason: String,
}

impl MatchDecision {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            accepted: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

/// Review state of a staged torrent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorrentStatus {
    Pending,
    Approved,
    Rejected,
}

impl TorrentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Approved and rejected torrents never change state again
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TorrentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(anyhow!("unknown torrent status: {other}")),
        }
    }
}

/// A matched feed item waiting for (or past) human review
#[derive(Debug, Clone)]
pub struct StagedTorrent {
    pub id: i64,
    pub feed_item: FeedItem,
    pub match_reason: String,
    pub staged_at: DateTime<Utc>,
    pub status: TorrentStatus,
    pub approved_at: Option<DateTime<Utc>>,
}

impl StagedTorrent {
    /// A fresh pending entry; the id is assigned by the database on insert
    pub fn pending(feed_item: FeedItem, match_reason: String) -> Self {
        Self {
            id: 0,
            feed_item,
            match_reason,
            staged_at: Utc::now(),
            status: TorrentStatus::Pending,
            approved_at: None,
        }
    }

    /// Size in GiB, as shown in listings
    #[allow(clippy::cast_precision_loss)]
    pub fn size_gb(&self) -> f64 {
        self.feed_item.size as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// Operator decision recorded in the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Approve,
    Reject,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(anyhow!("unknown activity action: {other}")),
        }
    }
}

/// One entry of the approve/reject audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub torrent_id: i64,
    pub torrent_title: String,
    pub action: ActivityAction,
    pub action_at: DateTime<Utc>,
    pub match_reason: String,
}

/// A torrent as reported by the download client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientTorrent {
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            TorrentStatus::Pending,
            TorrentStatus::Approved,
            TorrentStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<TorrentStatus>().unwrap(), status);
        }
        assert_eq!("Approved".parse::<TorrentStatus>().unwrap(), TorrentStatus::Approved);
    }

    #[test]
    fn status_rejects_unknown_text() {
        assert!("downloading".parse::<TorrentStatus>().is_err());
        assert!("".parse::<TorrentStatus>().is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!TorrentStatus::Pending.is_terminal());
        assert!(TorrentStatus::Approved.is_terminal());
        assert!(TorrentStatus::Rejected.is_terminal());
    }

    #[test]
    fn size_is_reported_in_gib() {
        let item = FeedItem {
            size: 3 * 1024 * 1024 * 1024 / 2,
            ..FeedItem::default()
        };
        let staged = StagedTorrent::pending(item, String::new());
        assert!((staged.size_gb() - 1.5).abs() < f64::EPSILON);
        assert_eq!(staged.status, TorrentStatus::Pending);
        assert!(staged.approved_at.is_none());
    }
}
