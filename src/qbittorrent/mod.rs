//! # qBittorrent WebUI client
//!
//! Talks to the qBittorrent Web API (v2) to hand over approved releases and
//! to pause or resume them later.
//!
//! ## Session
//!
//! The WebUI authenticates with a `SID` cookie returned by `auth/login`. The
//! underlying `reqwest::Client` keeps a cookie store, so logging in once per
//! client is enough. Instances without credentials (WebUI configured to
//! bypass authentication for the local network) skip the login call.
//!
//! ## Timeouts
//!
//! - Connection test: 5 seconds
//! - Listing, pausing, resuming: 10 seconds
//! - Adding a torrent: 30 seconds

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, error, info};

use crate::config::QBittorrentConfig;
use crate::models::ClientTorrent;
use crate::traits::DownloadClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ADD_TIMEOUT: Duration = Duration::from_secs(30);

/// Option key used only to build download URLs, never sent to the client
const TITLE_OPTION: &str = "title";

/// Logged-in qBittorrent WebUI session plus the defaults for new torrents
#[derive(Clone)]
pub struct QBittorrentClient {
    client: Client,
    host: String,
    category: String,
    save_path: String,
    add_paused: bool,
}

impl QBittorrentClient {
    /// Log in (when credentials are configured) and verify the connection.
    pub async fn connect(config: &QBittorrentConfig) -> Result<Self> {
        info!(
            "Initializing qBittorrent client - host: {}, user: {}",
            config.host, config.username
        );

        let client = Client::builder().cookie_store(true).build()?;
        let qb = Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            category: config.category.clone(),
            save_path: config.save_path.clone(),
            add_paused: config.add_paused,
        };

        if !config.username.is_empty() {
            qb.login(&config.username, &config.password).await?;
        }

        qb.test_connection()
            .await
            .with_context(|| format!("failed to connect to qBittorrent at {}", config.host))?;

        info!("Connection successful to {}", config.host);
        Ok(qb)
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("auth/login"))
            .header(header::REFERER, self.host.as_str())
            .form(&[("username", username), ("password", password)])
            .timeout(CONNECT_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() || body.trim() != "Ok." {
            bail!("qBittorrent login failed ({status}): {}", body.trim());
        }

        debug!("Logged in to qBittorrent as {}", username);
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.host, path)
    }

    /// Client defaults overridden by per-call options, minus the title hint.
    fn build_options(&self, options: &HashMap<String, String>) -> HashMap<String, String> {
        let mut opts = HashMap::new();
        opts.insert("category".to_string(), self.category.clone());
        if !self.save_path.is_empty() {
            opts.insert("savepath".to_string(), self.save_path.clone());
        }
        opts.insert("paused".to_string(), self.add_paused.to_string());

        for (key, value) in options {
            if key != TITLE_OPTION {
                opts.insert(key.clone(), value.clone());
            }
        }

        opts
    }

    /// POST a `hashes` form, falling back to the v5 endpoint name on 404.
    async fn post_hashes(&self, action: &str, fallback: &str, hash: &str) -> Result<()> {
        for path in [action, fallback] {
            let response = self
                .client
                .post(self.endpoint(&format!("torrents/{path}")))
                .form(&[("hashes", hash)])
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;

            match response.status() {
                StatusCode::NOT_FOUND => continue,
                status if status.is_success() => return Ok(()),
                status => bail!("qBittorrent {path} failed for {hash}: {status}"),
            }
        }

        Err(anyhow!("qBittorrent does not support {action} or {fallback}"))
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    async fn add_torrent(&self, url: &str, options: &HashMap<String, String>) -> Result<()> {
        if url.is_empty() {
            bail!("torrent URL cannot be empty");
        }

        let title = options.get(TITLE_OPTION).map_or("", String::as_str);
        let download_url = transform_torrent_url(url, title);
        if download_url != url {
            info!("Transformed URL {} -> {}", url, download_url);
        }

        let mut form = self.build_options(options);
        debug!("Adding torrent {} with options {:?}", download_url, form);
        form.insert("urls".to_string(), download_url.clone());

        let response = self
            .client
            .post(self.endpoint("torrents/add"))
            .form(&form)
            .timeout(ADD_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() || body.trim() == "Fails." {
            error!("Failed to add torrent {}: {} {}", download_url, status, body.trim());
            bail!("failed to add torrent: {status} {}", body.trim());
        }

        info!("Added torrent from URL: {}", download_url);
        Ok(())
    }

    async fn list_torrents(&self) -> Result<Vec<ClientTorrent>> {
        let response = self
            .client
            .get(self.endpoint("torrents/info"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("failed to get torrents: {}", response.status());
        }

        Ok(response.json().await?)
    }

    async fn pause(&self, hash: &str) -> Result<()> {
        self.post_hashes("pause", "stop", hash).await
    }

    async fn resume(&self, hash: &str) -> Result<()> {
        self.post_hashes("resume", "start", hash).await
    }

    async fn test_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(self.endpoint("torrents/info"))
            .query(&[("limit", "1")])
            .timeout(CONNECT_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("qBittorrent responded with {}", response.status());
        }

        Ok(())
    }
}

/// Rewrite tracker info-page links into direct `.torrent` download links.
///
/// `https://iptorrents.com/t/7228493` becomes
/// `https://iptorrents.com/download.php/7228493/{title}.torrent`. Other URLs
/// are returned unchanged.
pub fn transform_torrent_url(url: &str, title: &str) -> String {
    let Some((_, rest)) = url.split_once("iptorrents.com/t/") else {
        return url.to_string();
    };

    let id = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    if id.is_empty() {
        return url.to_string();
    }

    let title = title.trim();
    let filename = if title.is_empty() {
        "torrent.torrent".to_string()
    } else {
        format!("{}.torrent", urlencoding::encode(title))
    };

    format!("https://iptorrents.com/download.php/{id}/{filename}")
}
