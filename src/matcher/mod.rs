//! Rule evaluation for enriched feed items.
//!
//! Two rule sources are supported: per-show rules with a defaults layer
//! (`shows.json`) and the flat legacy rules built from environment variables.

use serde::{Deserialize, Serialize};

use crate::models::{FeedItem, MatchDecision};

/// Rules for one watched show; unset fields fall back to [`DefaultRules`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_quality: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preferred_codec: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRules {
    #[serde(default)]
    pub min_quality: String,
    #[serde(default)]
    pub preferred_codec: String,
    #[serde(default)]
    pub preferred_groups: Vec<String>,
    #[serde(default)]
    pub exclude_groups: Vec<String>,
}

/// Contents of `shows.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowsConfig {
    #[serde(default)]
    pub shows: Vec<ShowRule>,
    #[serde(default)]
    pub defaults: DefaultRules,
}

/// Flat rules applied to every show in the watch list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyRules {
    /// Empty means every show is watched
    pub show_names: Vec<String>,
    pub min_quality: String,
    pub preferred_codec: String,
    pub exclude_groups: Vec<String>,
    pub preferred_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSet {
    PerShow(ShowsConfig),
    Legacy(LegacyRules),
}

/// Rules after the show-specific/default resolution step
struct EffectiveRules<'a> {
    min_quality: &'a str,
    preferred_codec: &'a str,
    preferred_groups: &'a [String],
    exclude_groups: &'a [String],
}

impl RuleSet {
    /// Decide whether an item should be staged, with a human-readable reason.
    pub fn evaluate(&self, item: &FeedItem) -> MatchDecision {
        match self {
            Self::PerShow(config) => evaluate_per_show(item, config),
            Self::Legacy(rules) => evaluate_legacy(item, rules),
        }
    }

    /// Evaluate a batch, keeping only the accepted items.
    pub fn evaluate_all(&self, items: Vec<FeedItem>) -> Vec<(FeedItem, MatchDecision)> {
        items
            .into_iter()
            .filter_map(|item| {
                let decision = self.evaluate(&item);
                decision.accepted.then_some((item, decision))
            })
            .collect()
    }
}

fn evaluate_per_show(item: &FeedItem, config: &ShowsConfig) -> MatchDecision {
    let show_name = item.show_name.to_lowercase();
    let Some(rule) = config
        .shows
        .iter()
        .find(|rule| show_name.contains(&rule.name.to_lowercase()))
    else {
        return MatchDecision::reject("show not in watch list");
    };

    let defaults = &config.defaults;
    let rules = EffectiveRules {
        min_quality: non_empty_or(&rule.min_quality, &defaults.min_quality),
        preferred_codec: non_empty_or(&rule.preferred_codec, &defaults.preferred_codec),
        preferred_groups: non_empty_slice_or(&rule.preferred_groups, &defaults.preferred_groups),
        exclude_groups: non_empty_slice_or(&rule.exclude_groups, &defaults.exclude_groups),
    };

    apply_rules(item, &rule.name, &rules)
}

fn evaluate_legacy(item: &FeedItem, rules: &LegacyRules) -> MatchDecision {
    if !matches_show_name(&item.show_name, &rules.show_names) {
        return MatchDecision::reject("show name not in watch list");
    }

    let rules = EffectiveRules {
        min_quality: &rules.min_quality,
        preferred_codec: &rules.preferred_codec,
        preferred_groups: &rules.preferred_groups,
        exclude_groups: &rules.exclude_groups,
    };

    apply_rules(item, &item.show_name, &rules)
}

/// Quality, exclusion and preference checks shared by both rule sources.
fn apply_rules(item: &FeedItem, matched_show: &str, rules: &EffectiveRules<'_>) -> MatchDecision {
    if !meets_quality(&item.quality, rules.min_quality) {
        return MatchDecision::reject(format!(
            "quality {} below minimum {}",
            item.quality, rules.min_quality
        ));
    }

    if contains_group(&item.release_group, rules.exclude_groups) {
        return MatchDecision::reject(format!(
            "release group {} is excluded",
            item.release_group
        ));
    }

    let mut reasons = vec![
        format!("matches show: {matched_show}"),
        format!("quality: {}", item.quality),
    ];

    if !rules.preferred_codec.is_empty() && item.codec.eq_ignore_ascii_case(rules.preferred_codec)
    {
        reasons.push(format!("preferred codec: {}", item.codec));
    }

    if contains_group(&item.release_group, rules.preferred_groups) {
        reasons.push(format!("preferred group: {}", item.release_group));
    }

    MatchDecision::accept(reasons.join(", "))
}

fn matches_show_name(show_name: &str, show_names: &[String]) -> bool {
    let wanted: Vec<&String> = show_names.iter().filter(|n| !n.trim().is_empty()).collect();
    if wanted.is_empty() {
        return true;
    }

    let show_name = show_name.to_lowercase();
    wanted
        .iter()
        .any(|name| show_name.contains(&name.trim().to_lowercase()))
}

fn quality_rank(quality: &str) -> Option<u8> {
    match quality.to_uppercase().as_str() {
        "720P" => Some(1),
        "1080P" => Some(2),
        "2160P" | "4K" => Some(3),
        _ => None,
    }
}

/// Unranked qualities (including an empty one) always pass.
fn meets_quality(quality: &str, min_quality: &str) -> bool {
    if min_quality.is_empty() {
        return true;
    }

    match (quality_rank(quality), quality_rank(min_quality)) {
        (Some(item_rank), Some(min_rank)) => item_rank >= min_rank,
        _ => true,
    }
}

/// Exact, case-insensitive group membership; blank entries never match.
fn contains_group(group: &str, groups: &[String]) -> bool {
    !group.is_empty() && groups.iter().any(|g| g.trim().eq_ignore_ascii_case(group))
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

fn non_empty_slice_or<'a>(value: &'a [String], fallback: &'a [String]) -> &'a [String] {
    if value.is_empty() { fallback } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(show_name: &str, quality: &str, codec: &str, group: &str) -> FeedItem {
        FeedItem {
            title: format!("{show_name} {quality} {codec}-{group}"),
            show_name: show_name.to_string(),
            quality: quality.to_string(),
            codec: codec.to_string(),
            release_group: group.to_string(),
            ..FeedItem::default()
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn shows(shows: Vec<ShowRule>, defaults: DefaultRules) -> RuleSet {
        RuleSet::PerShow(ShowsConfig { shows, defaults })
    }

    fn show(name: &str) -> ShowRule {
        ShowRule {
            name: name.to_string(),
            ..ShowRule::default()
        }
    }

    #[test]
    fn test_unknown_show_is_rejected() {
        let rules = shows(vec![show("Severance")], DefaultRules::default());
        let decision = rules.evaluate(&item("The Bear", "1080P", "x265", "GRP"));
        assert!(!decision.accepted);
        assert_eq!(decision.reason, "show not in watch list");
    }

    #[test]
    fn test_first_matching_show_wins() {
        let mut strict = show("the office");
        strict.min_quality = "2160p".to_string();
        let rules = shows(vec![show("Office"), strict], DefaultRules::default());

        let decision = rules.evaluate(&item("The Office US", "720P", "", ""));
        assert!(decision.accepted);
        assert!(decision.reason.starts_with("matches show: Office"));
    }

    #[test]
    fn test_quality_below_minimum() {
        let mut rule = show("Show");
        rule.min_quality = "1080p".to_string();
        let rules = shows(vec![rule], DefaultRules::default());

        let decision = rules.evaluate(&item("Show Name", "720P", "", ""));
        assert!(!decision.accepted);
        assert_eq!(decision.reason, "quality 720P below minimum 1080p");

        assert!(rules.evaluate(&item("Show Name", "2160P", "", "")).accepted);
        assert!(rules.evaluate(&item("Show Name", "4K", "", "")).accepted);
    }

    #[test]
    fn test_unranked_quality_passes() {
        let mut rule = show("Show");
        rule.min_quality = "1080p".to_string();
        let rules = shows(vec![rule], DefaultRules::default());

        assert!(rules.evaluate(&item("Show Name", "", "", "")).accepted);

        let mut odd = show("Show");
        odd.min_quality = "480p".to_string();
        let rules = shows(vec![odd], DefaultRules::default());
        assert!(rules.evaluate(&item("Show Name", "720P", "", "")).accepted);
    }

    #[test]
    fn test_excluded_group_is_exact_and_case_insensitive() {
        let mut rule = show("Show");
        rule.exclude_groups = strings(&["group"]);
        let rules = shows(vec![rule], DefaultRules::default());

        let decision = rules.evaluate(&item("Show", "1080P", "", "GROUP"));
        assert!(!decision.accepted);
        assert_eq!(decision.reason, "release group GROUP is excluded");

        assert!(rules.evaluate(&item("Show", "1080P", "", "GROUPS")).accepted);
    }

    #[test]
    fn test_missing_group_is_never_excluded() {
        let rules = RuleSet::Legacy(LegacyRules {
            exclude_groups: strings(&["", " "]),
            ..LegacyRules::default()
        });
        assert!(rules.evaluate(&item("Show", "1080P", "", "")).accepted);
    }

    #[test]
    fn test_full_reason_trace() {
        let mut rule = show("Show");
        rule.preferred_codec = "X265".to_string();
        rule.preferred_groups = strings(&["ntb"]);
        let rules = shows(vec![rule], DefaultRules::default());

        let decision = rules.evaluate(&item("Show Name", "1080P", "x265", "NTb"));
        assert!(decision.accepted);
        assert_eq!(
            decision.reason,
            "matches show: Show, quality: 1080P, preferred codec: x265, preferred group: NTb"
        );
    }

    #[test]
    fn test_non_preferred_codec_is_left_out_of_trace() {
        let mut rule = show("Show");
        rule.preferred_codec = "x265".to_string();
        let rules = shows(vec![rule], DefaultRules::default());

        let decision = rules.evaluate(&item("Show", "1080P", "x264", "GRP"));
        assert!(decision.accepted);
        assert_eq!(decision.reason, "matches show: Show, quality: 1080P");
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let defaults = DefaultRules {
            min_quality: "1080p".to_string(),
            preferred_codec: "x265".to_string(),
            preferred_groups: strings(&["FLUX"]),
            exclude_groups: strings(&["YIFY"]),
        };
        let rules = shows(vec![show("Show")], defaults.clone());

        assert!(!rules.evaluate(&item("Show", "720P", "", "")).accepted);
        assert!(!rules.evaluate(&item("Show", "1080P", "", "yify")).accepted);
        assert_eq!(
            rules.evaluate(&item("Show", "1080P", "x265", "FLUX")).reason,
            "matches show: Show, quality: 1080P, preferred codec: x265, preferred group: FLUX"
        );

        let relaxed = shows(
            vec![show("Show")],
            DefaultRules {
                min_quality: "720p".to_string(),
                ..defaults
            },
        );
        assert!(relaxed.evaluate(&item("Show", "720P", "", "")).accepted);
    }

    #[test]
    fn test_show_values_override_defaults() {
        let defaults = DefaultRules {
            min_quality: "2160p".to_string(),
            exclude_groups: strings(&["GRP"]),
            ..DefaultRules::default()
        };
        let mut rule = show("Show");
        rule.min_quality = "720p".to_string();
        rule.exclude_groups = strings(&["OTHER"]);
        let rules = shows(vec![rule], defaults);

        assert!(rules.evaluate(&item("Show", "720P", "", "GRP")).accepted);
        assert!(!rules.evaluate(&item("Show", "720P", "", "other")).accepted);
    }

    #[test]
    fn test_legacy_wildcard_accepts_any_show() {
        let rules = RuleSet::Legacy(LegacyRules {
            show_names: Vec::new(),
            min_quality: "1080p".to_string(),
            ..LegacyRules::default()
        });
        let decision = rules.evaluate(&item("Anything At All", "1080P", "", ""));
        assert!(decision.accepted);
        assert_eq!(
            decision.reason,
            "matches show: Anything At All, quality: 1080P"
        );
    }

    #[test]
    fn test_legacy_blank_names_act_as_wildcard() {
        let rules = RuleSet::Legacy(LegacyRules {
            show_names: strings(&[""]),
            ..LegacyRules::default()
        });
        assert!(rules.evaluate(&item("Whatever", "", "", "")).accepted);
    }

    #[test]
    fn test_legacy_watch_list() {
        let rules = RuleSet::Legacy(LegacyRules {
            show_names: strings(&["severance", "andor"]),
            exclude_groups: strings(&["BAD"]),
            preferred_groups: strings(&["good"]),
            preferred_codec: "x265".to_string(),
            ..LegacyRules::default()
        });

        let decision = rules.evaluate(&item("The Bear", "1080P", "", ""));
        assert!(!decision.accepted);
        assert_eq!(decision.reason, "show name not in watch list");

        assert!(!rules.evaluate(&item("Andor", "1080P", "", "bad")).accepted);

        let decision = rules.evaluate(&item("Severance", "2160P", "x265", "GOOD"));
        assert!(decision.accepted);
        assert_eq!(
            decision.reason,
            "matches show: Severance, quality: 2160P, preferred codec: x265, preferred group: GOOD"
        );
    }

    #[test]
    fn test_evaluate_all_keeps_accepted_in_order() {
        let rules = shows(vec![show("Show")], DefaultRules::default());
        let items = vec![
            item("Show A", "1080P", "", ""),
            item("Other", "1080P", "", ""),
            item("Show B", "720P", "", ""),
        ];

        let accepted = rules.evaluate_all(items);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].0.show_name, "Show A");
        assert_eq!(accepted[1].0.show_name, "Show B");
        assert!(accepted.iter().all(|(_, d)| d.accepted));
    }
}
