//! HTTP control API
//!
//! - `GET /api/health`
//! - `GET /api/torrents?status=pending`
//! - `POST /api/torrents/{id}/approve`
//! - `POST /api/torrents/{id}/reject`
//! - `GET /api/activity?action=approve&limit=50&offset=0`

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::curator::{Curator, ReviewError};
use crate::models::{Activity, ActivityAction, TorrentStatus};

const DEFAULT_ACTIVITY_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub download_client: bool,
}

#[derive(Debug, Serialize)]
pub struct TorrentResponse {
    pub id: i64,
    pub title: String,
    pub size: u64,
    pub match_reason: String,
    pub status: TorrentStatus,
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub torrents: Vec<TorrentResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub status: TorrentStatus,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub activities: Vec<Activity>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub action: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// JSON error with an HTTP status
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        let status = match &e {
            ReviewError::NotFound(_) | ReviewError::NotInClient(_) => StatusCode::NOT_FOUND,
            ReviewError::NotPending { .. } => StatusCode::BAD_REQUEST,
            ReviewError::ClientUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ReviewError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

pub fn router(curator: Curator) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/torrents", get(list_torrents))
        .route("/api/torrents/{id}/approve", post(approve_torrent))
        .route("/api/torrents/{id}/reject", post(reject_torrent))
        .route("/api/activity", get(list_activity))
        .with_state(curator)
}

/// Serve the API until the process is stopped
pub async fn serve(curator: Curator, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(curator)).await?;
    Ok(())
}

async fn health(State(curator): State<Curator>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        database: curator.database().ping().await,
        download_client: curator.has_client(),
    })
}

async fn list_torrents(
    State(curator): State<Curator>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let status: TorrentStatus = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("pending")
        .parse()
        .map_err(|e: anyhow::Error| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?;

    let torrents = curator.database().list(Some(status)).await.map_err(|e| {
        error!("Failed to list {} torrents: {:#}", status, e);
        ApiError::from(e)
    })?;

    info!("Listed {} {} torrents", torrents.len(), status);

    let torrents: Vec<TorrentResponse> = torrents
        .into_iter()
        .map(|t| TorrentResponse {
            id: t.id,
            title: t.feed_item.title,
            size: t.feed_item.size,
            match_reason: t.match_reason,
            status: t.status,
            link: t.feed_item.link,
        })
        .collect();

    Ok(Json(ListResponse {
        count: torrents.len(),
        torrents,
    }))
}

async fn approve_torrent(
    State(curator): State<Curator>,
    Path(id): Path<i64>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let torrent = curator.approve(id).await.map_err(|e| {
        warn!("Cannot approve torrent {}: {:#}", id, e);
        ApiError::from(e)
    })?;

    Ok(Json(ReviewResponse {
        id,
        status: torrent.status,
        title: torrent.feed_item.title,
    }))
}

async fn reject_torrent(
    State(curator): State<Curator>,
    Path(id): Path<i64>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let torrent = curator.reject(id).await.map_err(|e| {
        warn!("Cannot reject torrent {}: {:#}", id, e);
        ApiError::from(e)
    })?;

    Ok(Json(ReviewResponse {
        id,
        status: torrent.status,
        title: torrent.feed_item.title,
    }))
}

async fn list_activity(
    State(curator): State<Curator>,
    Query(params): Query<ActivityParams>,
) -> Result<Json<ActivityResponse>, ApiError> {
    let action: Option<ActivityAction> = params
        .action
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .transpose()
        .map_err(|e: anyhow::Error| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?;

    let limit = params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);

    let database = curator.database();
    let activities = database.list_activity(action, limit, offset).await?;
    let total = database.count_activity(action).await?;

    Ok(Json(ActivityResponse { activities, total }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::database::Database;
    use crate::matcher::{LegacyRules, RuleSet};
    use crate::models::{FeedItem, RawFeedItem, StagedTorrent};
    use crate::traits::FeedSource;

    struct NoFeed;

    #[async_trait]
    impl FeedSource for NoFeed {
        async fn fetch(&self, _url: &str) -> Result<Vec<RawFeedItem>> {
            Ok(Vec::new())
        }
    }

    async fn app_with_pending() -> (Router, i64) {
        let database = Database::in_memory().await.unwrap();
        let item = FeedItem {
            title: "Andor.S02E01.2160p".to_string(),
            link: "https://t/andor".to_string(),
            size: 42,
            ..FeedItem::default()
        };
        let id = database
            .insert_if_absent(&StagedTorrent::pending(item, "matches show: Andor".to_string()))
            .await
            .unwrap()
            .unwrap();

        let curator = Curator::new(
            Arc::new(NoFeed),
            database,
            RuleSet::Legacy(LegacyRules::default()),
            Vec::new(),
            None,
        );
        (router(curator), id)
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with_pending().await;
        let (status, body) = call(app, "GET", "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], true);
        assert_eq!(body["download_client"], false);
    }

    #[tokio::test]
    async fn test_list_defaults_to_pending() {
        let (app, id) = app_with_pending().await;
        let (status, body) = call(app, "GET", "/api/torrents").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["torrents"][0]["id"], id);
        assert_eq!(body["torrents"][0]["status"], "pending");
        assert_eq!(body["torrents"][0]["size"], 42);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_status() {
        let (app, _) = app_with_pending().await;
        let (status, body) = call(app, "GET", "/api/torrents?status=seeding").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("seeding"));
    }

    #[tokio::test]
    async fn test_approve_without_client_is_unavailable() {
        let (app, id) = app_with_pending().await;
        let (status, _) = call(app, "POST", &format!("/api/torrents/{id}/approve")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_reject_then_reject_again() {
        let (app, id) = app_with_pending().await;

        let (status, body) = call(app.clone(), "POST", &format!("/api/torrents/{id}/reject")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["title"], "Andor.S02E01.2160p");

        let (status, _) = call(app.clone(), "POST", &format!("/api/torrents/{id}/reject")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(app, "GET", "/api/activity?action=reject").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["activities"][0]["action"], "reject");
    }

    #[tokio::test]
    async fn test_reject_missing_torrent() {
        let (app, _) = app_with_pending().await;
        let (status, body) = call(app, "POST", "/api/torrents/9999/reject").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "torrent 9999 not found");
    }
}
