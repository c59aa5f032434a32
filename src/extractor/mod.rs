//! Release metadata extraction from feed item titles and descriptions.
//!
//! Every field is parsed independently and falls back to an empty string or
//! zero when the title does not carry it, so extraction never fails.
//!
//! Word boundaries, digits and whitespace are ASCII-only: a CJK character
//! glued to `1080p` still leaves a boundary, and non-ASCII digits are never
//! taken as a size.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{FeedItem, RawFeedItem};

/// Canonical spellings of the release sources we recognize
const SOURCES: [&str; 11] = [
    "WEB-DL", "BluRay", "HDTV", "WEBRip", "BDRip", "DVDRip", "AMZN", "NF", "DSNP", "HMAX", "ATVP",
];

static RE_QUALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?-u:\b)(2160p|1080p|720p|4K)(?-u:\b)").unwrap());

static RE_CODEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?-u:\b)(x264|x265|H\.?264|H\.?265|HEVC)(?-u:\b)").unwrap());

static RE_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?-u:\b)(WEB-DL|BluRay|HDTV|WEBRip|BDRip|DVDRip|AMZN|NF|DSNP|HMAX|ATVP)(?-u:\b)",
    )
    .unwrap()
});

/// "-GROUP" at the very end, optionally followed by a "[tag]".
static RE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([A-Za-z0-9]+)(?:\[.*\])?$").unwrap());

/// "Show.Name.S01E02", "Show Name S01", lazy prefix so the first marker wins.
static RE_SEASON_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)[\t\n\f\r .]+[Ss]([0-9]+)(?:[Ee]([0-9]+))?").unwrap());

/// "1080p..." and everything after it, stripped from titles without a season marker.
static RE_QUALITY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{4}p.*").unwrap());

/// "1.44 GB", "500 MB", "21GB".
static RE_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)[\t\n\f\r ]*((?i:GB|MB|KB))").unwrap());

/// Metadata derived from a single title/description pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub show_name: String,
    pub season: u32,
    pub episode: u32,
    pub quality: String,
    pub codec: String,
    pub source: String,
    pub release_group: String,
    pub size: u64,
}

/// Parse every metadata field out of a title and its description.
pub fn extract(title: &str, description: &str) -> Metadata {
    let (show_name, season, episode) = parse_show(title);

    Metadata {
        show_name,
        season,
        episode,
        quality: parse_quality(title),
        codec: parse_codec(title),
        source: parse_source(title),
        release_group: parse_release_group(title),
        size: parse_size(description),
    }
}

/// Attach extracted metadata to a raw feed item.
pub fn enrich(raw: RawFeedItem) -> FeedItem {
    let meta = extract(&raw.title, &raw.description);

    FeedItem {
        title: raw.title,
        link: raw.link,
        guid: raw.guid,
        pub_date: raw.pub_date,
        size: meta.size,
        description: raw.description,
        show_name: meta.show_name,
        season: meta.season,
        episode: meta.episode,
        quality: meta.quality,
        codec: meta.codec,
        source: meta.source,
        release_group: meta.release_group,
    }
}

fn parse_quality(title: &str) -> String {
    RE_QUALITY
        .captures(title)
        .map(|caps| caps[1].to_uppercase())
        .unwrap_or_default()
}

fn parse_codec(title: &str) -> String {
    let Some(caps) = RE_CODEC.captures(title) else {
        return String::new();
    };

    let codec = caps[1].to_uppercase();
    if codec.contains("265") || codec == "HEVC" {
        "x265".to_string()
    } else if codec.contains("264") {
        "x264".to_string()
    } else {
        codec
    }
}

fn parse_source(title: &str) -> String {
    RE_SOURCE
        .captures(title)
        .and_then(|caps| {
            SOURCES
                .iter()
                .find(|source| source.eq_ignore_ascii_case(&caps[1]))
        })
        .map(|source| (*source).to_string())
        .unwrap_or_default()
}

fn parse_release_group(title: &str) -> String {
    RE_GROUP
        .captures(title)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

fn parse_show(title: &str) -> (String, u32, u32) {
    if let Some(caps) = RE_SEASON_EPISODE.captures(title) {
        let show_name = clean_show_name(&caps[1]);
        let season = caps[2].parse().unwrap_or(0);
        let episode = caps
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        return (show_name, season, episode);
    }

    let stripped = RE_QUALITY_SUFFIX.replace(title, "");
    (clean_show_name(&stripped), 0, 0)
}

fn clean_show_name(raw: &str) -> String {
    raw.replace('.', " ").trim().to_string()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn parse_size(description: &str) -> u64 {
    let Some(caps) = RE_SIZE.captures(description) else {
        return 0;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return 0;
    };

    let multiplier: u64 = match caps[2].to_uppercase().as_str() {
        "GB" => 1024 * 1024 * 1024,
        "MB" => 1024 * 1024,
        "KB" => 1024,
        _ => return 0,
    };

    (value * multiplier as f64) as u64
}
