//! Environment-driven configuration.
//!
//! Values come from the process environment (a `.env` file is loaded in
//! `main`). Per-show rules are read from `shows.json` in the working directory
//! or `~/.curator-shows.json` and take precedence over the legacy variables.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::matcher::{LegacyRules, RuleSet, ShowsConfig};

const SHOWS_FILE: &str = "shows.json";
const HOME_SHOWS_FILE: &str = ".curator-shows.json";

/// Connection settings for the qBittorrent WebUI
#[derive(Debug, Clone)]
pub struct QBittorrentConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Category assigned to every added torrent
    pub category: String,
    pub save_path: String,
    pub add_paused: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_urls: Vec<String>,
    /// Minutes between scheduled feed checks
    pub poll_interval: u32,
    pub qbittorrent: QBittorrentConfig,
    pub rules: RuleSet,
    pub storage_path: PathBuf,
    pub api_port: u16,
    /// Days after which approved/rejected entries are pruned by `serve`
    pub retention_days: u32,
}

impl Config {
    /// Load configuration from the environment and the optional shows file.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let mut config = Self::from_vars(&vars)?;

        if let Some(shows) = load_shows_config()? {
            config.rules = RuleSet::PerShow(shows);
        }

        config.log_summary();
        Ok(config)
    }

    fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or(default).to_string();

        let feed_urls = split_list(get("RSS_FEED_URL").unwrap_or_default());
        if feed_urls.is_empty() {
            bail!("RSS_FEED_URL environment variable is required");
        }

        let storage_path = match get("STORAGE_PATH") {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir().unwrap_or_default().join(".curator.db"),
        };

        Ok(Self {
            feed_urls,
            poll_interval: parse_number(get("POLL_INTERVAL"), 30, "POLL_INTERVAL")?,
            qbittorrent: QBittorrentConfig {
                host: get_or("QBITTORRENT_HOST", "http://localhost:8080"),
                username: get_or("QBITTORRENT_USER", ""),
                password: get_or("QBITTORRENT_PASS", ""),
                category: get_or("QBITTORRENT_CATEGORY", "curator"),
                save_path: get_or("QBITTORRENT_SAVEPATH", ""),
                add_paused: get_or("QBITTORRENT_ADD_PAUSED", "true").eq_ignore_ascii_case("true"),
            },
            rules: RuleSet::Legacy(LegacyRules {
                show_names: split_list(get("SHOW_NAMES").unwrap_or_default()),
                min_quality: get_or("MIN_QUALITY", "1080p"),
                preferred_codec: get_or("PREFERRED_CODEC", "x265"),
                exclude_groups: split_list(get("EXCLUDE_GROUPS").unwrap_or_default()),
                preferred_groups: split_list(get("PREFERRED_GROUPS").unwrap_or_default()),
            }),
            storage_path,
            api_port: parse_number(get("CURATOR_API_PORT"), 8081, "CURATOR_API_PORT")?,
            retention_days: parse_number(get("RETENTION_DAYS"), 30, "RETENTION_DAYS")?,
        })
    }

    /// SQLite connection string for the storage path
    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.storage_path.display())
    }

    fn log_summary(&self) {
        info!("Feeds: {:?}", self.feed_urls);
        info!("Poll interval: {} minutes", self.poll_interval);
        info!(
            "qBittorrent: host={} user={} category={} save_path={} add_paused={}",
            self.qbittorrent.host,
            self.qbittorrent.username,
            self.qbittorrent.category,
            self.qbittorrent.save_path,
            self.qbittorrent.add_paused
        );
        match &self.rules {
            RuleSet::PerShow(shows) => {
                info!("Using shows config ({} shows configured)", shows.shows.len());
            }
            RuleSet::Legacy(rules) => info!(
                "Using environment rules: shows={:?} min_quality={} codec={} exclude={:?} prefer={:?}",
                rules.show_names,
                rules.min_quality,
                rules.preferred_codec,
                rules.exclude_groups,
                rules.preferred_groups
            ),
        }
        info!("Storage: {}", self.storage_path.display());
    }
}

/// Split a comma-separated variable, dropping blank entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>, default: T, key: &str) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

/// Read the first shows file that exists; `None` when there is none.
fn load_shows_config() -> Result<Option<ShowsConfig>> {
    let mut candidates = vec![PathBuf::from(SHOWS_FILE)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(HOME_SHOWS_FILE));
    }

    for path in candidates {
        if path.is_file() {
            return read_shows_config(&path).map(Some);
        }
    }

    Ok(None)
}

fn read_shows_config(path: &Path) -> Result<ShowsConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_shows_config(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_shows_config(content: &str) -> Result<ShowsConfig> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(split_list("a, b,,c ,"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_feed_url_is_required() {
        assert!(Config::from_vars(&vars(&[])).is_err());
        assert!(Config::from_vars(&vars(&[("RSS_FEED_URL", "  ")])).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&vars(&[
            ("RSS_FEED_URL", "https://a.example/rss,https://b.example/rss"),
            ("STORAGE_PATH", "/tmp/curator.db"),
        ]))
        .unwrap();

        assert_eq!(config.feed_urls.len(), 2);
        assert_eq!(config.poll_interval, 30);
        assert_eq!(config.api_port, 8081);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.qbittorrent.host, "http://localhost:8080");
        assert_eq!(config.qbittorrent.category, "curator");
        assert!(config.qbittorrent.add_paused);
        assert_eq!(config.database_url(), "sqlite:/tmp/curator.db");

        let RuleSet::Legacy(rules) = config.rules else {
            panic!("expected legacy rules");
        };
        assert!(rules.show_names.is_empty());
        assert!(rules.exclude_groups.is_empty());
        assert_eq!(rules.min_quality, "1080p");
        assert_eq!(rules.preferred_codec, "x265");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("RSS_FEED_URL", "https://a.example/rss"),
            ("QBITTORRENT_ADD_PAUSED", "false"),
            ("SHOW_NAMES", "Severance,Andor"),
            ("CURATOR_API_PORT", "9000"),
            ("POLL_INTERVAL", "15"),
        ]))
        .unwrap();

        assert!(!config.qbittorrent.add_paused);
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.poll_interval, 15);
        let RuleSet::Legacy(rules) = config.rules else {
            panic!("expected legacy rules");
        };
        assert_eq!(rules.show_names, vec!["Severance", "Andor"]);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let result = Config::from_vars(&vars(&[
            ("RSS_FEED_URL", "https://a.example/rss"),
            ("CURATOR_API_PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_shows_config() {
        let config = parse_shows_config(
            r#"{
                "shows": [
                    {"name": "Severance", "min_quality": "2160p"},
                    {"name": "Andor", "exclude_groups": ["YIFY"]}
                ],
                "defaults": {
                    "min_quality": "1080p",
                    "preferred_codec": "x265",
                    "preferred_groups": ["FLUX"],
                    "exclude_groups": []
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.shows.len(), 2);
        assert_eq!(config.shows[0].min_quality, "2160p");
        assert!(config.shows[0].preferred_codec.is_empty());
        assert_eq!(config.shows[1].exclude_groups, vec!["YIFY"]);
        assert_eq!(config.defaults.preferred_groups, vec!["FLUX"]);
    }

    #[test]
    fn test_invalid_shows_config() {
        assert!(parse_shows_config("{\"shows\": 3}").is_err());
    }
}
