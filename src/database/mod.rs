use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::{debug, info};

use crate::models::{Activity, ActivityAction, StagedTorrent, TorrentStatus};

const TORRENT_COLUMNS: &str = "id, feed_item, match_reason, staged_at, status, approved_at";

/// SQLite-backed store for staged torrents and the activity log
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database file at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePool::connect(db_url).await?;
        Self::with_pool(pool).await
    }

    /// Run migrations on an existing pool
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// Stage a torrent unless one with the same link exists.
    ///
    /// Returns the new row id, or `None` for a duplicate link.
    pub async fn insert_if_absent(&self, torrent: &StagedTorrent) -> Result<Option<i64>> {
        let feed_item = serde_json::to_string(&torrent.feed_item)
            .context("failed to serialize feed item")?;

        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO staged_torrents (link, feed_item, match_reason, staged_at, status)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&torrent.feed_item.link)
        .bind(feed_item)
        .bind(&torrent.match_reason)
        .bind(torrent.staged_at)
        .bind(torrent.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Skipping already staged link: {}", torrent.feed_item.link);
            return Ok(None);
        }

        Ok(Some(result.last_insert_rowid()))
    }

    /// Staged torrents, newest first; `None` lists every status.
    pub async fn list(&self, status: Option<TorrentStatus>) -> Result<Vec<StagedTorrent>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {TORRENT_COLUMNS} FROM staged_torrents WHERE status = ? ORDER BY staged_at DESC, id DESC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {TORRENT_COLUMNS} FROM staged_torrents ORDER BY staged_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_torrent).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<StagedTorrent>> {
        let row = sqlx::query(&format!(
            "SELECT {TORRENT_COLUMNS} FROM staged_torrents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_torrent).transpose()
    }

    /// Move a pending torrent to `status`, stamping `approved_at` on approval.
    ///
    /// Only pending rows change. Returns `false` when no pending torrent has
    /// that id, so a torrent is reviewed at most once even across processes.
    pub async fn update_status(&self, id: i64, status: TorrentStatus) -> Result<bool> {
        let approved_at = (status == TorrentStatus::Approved).then(Utc::now);

        let result = sqlx::query(
            r"
            UPDATE staged_torrents
            SET status = ?, approved_at = ?
            WHERE id = ? AND status = ?
            ",
        )
        .bind(status.as_str())
        .bind(approved_at)
        .bind(id)
        .bind(TorrentStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove approved/rejected torrents staged longer ago than `older_than`.
    pub async fn delete_older_than(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - older_than;

        let result = sqlx::query(
            r"
            DELETE FROM staged_torrents
            WHERE staged_at < ? AND status IN (?, ?)
            ",
        )
        .bind(cutoff)
        .bind(TorrentStatus::Approved.as_str())
        .bind(TorrentStatus::Rejected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Remove pending torrents whose link matches any SQL `LIKE` pattern.
    pub async fn cleanup_stale_links(&self, patterns: &[String]) -> Result<u64> {
        let mut deleted = 0;

        for pattern in patterns {
            let result = sqlx::query(
                "DELETE FROM staged_torrents WHERE status = ? AND link LIKE ?",
            )
            .bind(TorrentStatus::Pending.as_str())
            .bind(pattern)
            .execute(&self.pool)
            .await?;

            debug!("Pattern {} removed {} entries", pattern, result.rows_affected());
            deleted += result.rows_affected();
        }

        Ok(deleted)
    }

    pub async fn log_activity(
        &self,
        torrent_id: i64,
        title: &str,
        action: ActivityAction,
        match_reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO activity_log (torrent_id, torrent_title, action, action_at, match_reason)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(torrent_id)
        .bind(title)
        .bind(action.as_str())
        .bind(Utc::now())
        .bind(match_reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Activity entries, newest first, optionally restricted to one action.
    pub async fn list_activity(
        &self,
        action: Option<ActivityAction>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Activity>> {
        let mut query = String::from(
            "SELECT id, torrent_id, torrent_title, action, action_at, match_reason FROM activity_log",
        );
        if action.is_some() {
            query.push_str(" WHERE action = ?");
        }
        query.push_str(" ORDER BY action_at DESC, id DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query(&query);
        if let Some(action) = action {
            q = q.bind(action.as_str());
        }
        let rows = q.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<Activity> {
                Ok(Activity {
                    id: row.try_get("id")?,
                    torrent_id: row.try_get("torrent_id")?,
                    torrent_title: row.try_get("torrent_title")?,
                    action: row.try_get::<String, _>("action")?.parse()?,
                    action_at: row.try_get("action_at")?,
                    match_reason: row.try_get("match_reason")?,
                })
            })
            .collect()
    }

    pub async fn count_activity(&self, action: Option<ActivityAction>) -> Result<i64> {
        let count: i64 = match action {
            Some(action) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM activity_log WHERE action = ?")
                    .bind(action.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM activity_log")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count)
    }

    /// Fresh migrated in-memory database
    #[cfg(test)]
    pub(crate) async fn in_memory() -> Result<Self> {
        // A single long-lived connection keeps the in-memory database alive.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    /// Cheap connectivity probe for health reporting
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

fn row_to_torrent(row: &SqliteRow) -> Result<StagedTorrent> {
    let feed_item: String = row.try_get("feed_item")?;
    let approved_at: Option<DateTime<Utc>> = row.try_get("approved_at")?;

    Ok(StagedTorrent {
        id: row.try_get("id")?,
        feed_item: serde_json::from_str(&feed_item).context("failed to parse stored feed item")?,
        match_reason: row.try_get("match_reason")?,
        staged_at: row.try_get("staged_at")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        approved_at,
    })
}
