// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `false`, so fields
/// that default to enabled need a named function.
fn default_true() -> bool {
    true
}

fn default_ignore_same_flair_seconds() -> u64 {
    60
}

fn default_max_age_for_comment() -> i64 {
    175
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration must be a JSON array")]
    NotAnArray,
    #[error("first element must carry the GeneralConfiguration record")]
    MissingGeneral,
    #[error("flair rule at index {0} has an empty templateId")]
    EmptyTemplateId(usize),
    #[error("duplicate flair rule for template {0}")]
    DuplicateTemplateId(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ── General configuration ─────────────────────────────────────────────────────

/// Community-wide settings, wire key `GeneralConfiguration`, always the first
/// element of the configuration sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfiguration {
    #[serde(default)]
    pub notes: String,
    /// Removal-message preamble; placeholders expand here.
    #[serde(default)]
    pub header: String,
    /// Removal-message closing text; placeholders expand here.
    #[serde(default)]
    pub footer: String,
    #[serde(default)]
    pub usernote_type_name: String,
    /// One of `public`, `private`, `private_exposed`, `public_as_subreddit`.
    /// Blank or unrecognized values fall back to `public_as_subreddit`.
    #[serde(default)]
    pub removal_comment_type: String,
    /// When false, a blank line separates header, body and footer.
    #[serde(default)]
    pub skip_add_newlines: bool,
    /// Restrict wiki edits to editors holding the `config` permission.
    #[serde(default)]
    pub require_config_to_edit: bool,
    /// Dedupe window for repeat assignments of the same flair to the same
    /// submission.
    #[serde(default = "default_ignore_same_flair_seconds")]
    pub ignore_same_flair_seconds: u64,
    /// Per-community webhook endpoint for `sendToWebhook` rules.
    #[serde(default)]
    pub webhook: String,
    #[serde(default)]
    pub wh_content: String,
    #[serde(default)]
    pub wh_ping_over_score: Option<i64>,
    #[serde(default)]
    pub wh_ping_over_ping: String,
    #[serde(default)]
    pub wh_exclude_mod: bool,
    #[serde(default)]
    pub wh_exclude_reports: bool,
    #[serde(default)]
    pub wh_exclude_image: bool,
    #[serde(default)]
    pub wh_include_nsfw_images: bool,
    /// Hour offset applied to the time placeholders.
    #[serde(default)]
    pub utc_offset: i64,
    /// strftime-style format for the `*_custom` time placeholders.
    #[serde(default)]
    pub custom_time_format: String,
    /// Posts older than this many days skip the comment action.
    #[serde(default = "default_max_age_for_comment", rename = "maxAgeForComment")]
    pub max_age_for_comment: i64,
    #[serde(default, rename = "maxAgeForBan")]
    pub max_age_for_ban: Option<i64>,
}

impl Default for GeneralConfiguration {
    fn default() -> Self {
        Self {
            notes: String::new(),
            header: String::new(),
            footer: String::new(),
            usernote_type_name: String::new(),
            removal_comment_type: String::new(),
            skip_add_newlines: false,
            require_config_to_edit: false,
            ignore_same_flair_seconds: default_ignore_same_flair_seconds(),
            webhook: String::new(),
            wh_content: String::new(),
            wh_ping_over_score: None,
            wh_ping_over_ping: String::new(),
            wh_exclude_mod: false,
            wh_exclude_reports: false,
            wh_exclude_image: false,
            wh_include_nsfw_images: false,
            utc_offset: 0,
            custom_time_format: String::new(),
            max_age_for_comment: default_max_age_for_comment(),
            max_age_for_ban: None,
        }
    }
}

// ── Per-flair rule ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentRule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub body: String,
    #[serde(default, rename = "lockComment")]
    pub lock_comment: bool,
    #[serde(default, rename = "stickyComment")]
    pub sticky_comment: bool,
    #[serde(default = "default_true")]
    pub distinguish: bool,
    #[serde(default = "default_true", rename = "headerFooter")]
    pub header_footer: bool,
}

impl Default for CommentRule {
    fn default() -> Self {
        Self {
            enabled: false,
            body: String::new(),
            lock_comment: false,
            sticky_comment: false,
            distinguish: true,
            header_footer: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsernoteRule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContributorAction {
    #[default]
    Add,
    Remove,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContributorRule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub action: ContributorAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserFlairRule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "cssClass")]
    pub css_class: String,
    /// Takes precedence over text/css when non-empty. Both historical key
    /// spellings are accepted on read; canonical writes emit `templateId`.
    #[serde(default, rename = "templateId", alias = "templateID")]
    pub template_id: String,
}

/// Ban duration, three wire shapes: empty string / `true` (permanent), a
/// positive integer (days), or a comma-separated integer list (escalating,
/// `0` meaning permanent as the terminal step). Anything else is carried
/// through verbatim as `Invalid` so canonicalization stays a fixpoint, and
/// the processor skips the ban with an operator-facing message.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BanDuration {
    #[default]
    Permanent,
    Days(u32),
    Escalating(Vec<u32>),
    Invalid(serde_json::Value),
}

impl BanDuration {
    fn from_value(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Bool(true) => BanDuration::Permanent,
            serde_json::Value::String(s) if s.is_empty() => BanDuration::Permanent,
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(d) if d > 0 && d <= u32::MAX as u64 => BanDuration::Days(d as u32),
                _ => BanDuration::Invalid(v.clone()),
            },
            serde_json::Value::String(s) => {
                let parts: Result<Vec<u32>, _> =
                    s.split(',').map(|p| p.trim().parse::<u32>()).collect();
                match parts {
                    Ok(steps) if s.contains(',') && !steps.is_empty() => {
                        BanDuration::Escalating(steps)
                    }
                    Ok(steps) if steps.len() == 1 && steps[0] > 0 => BanDuration::Days(steps[0]),
                    _ => BanDuration::Invalid(v.clone()),
                }
            }
            _ => BanDuration::Invalid(v.clone()),
        }
    }

    fn to_value(&self) -> serde_json::Value {
        match self {
            BanDuration::Permanent => serde_json::Value::String(String::new()),
            BanDuration::Days(d) => serde_json::Value::from(*d),
            BanDuration::Escalating(steps) => serde_json::Value::String(
                steps
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            BanDuration::Invalid(v) => v.clone(),
        }
    }
}

impl Serialize for BanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = serde_json::Value::deserialize(deserializer)?;
        Ok(BanDuration::from_value(&v))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BanRule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub duration: BanDuration,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "modNote")]
    pub mod_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NukeRule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true", rename = "banFromAllListed")]
    pub ban_from_all_listed: bool,
    #[serde(default = "default_true", rename = "removeAllComments")]
    pub remove_all_comments: bool,
    #[serde(default = "default_true", rename = "removeAllSubmissions")]
    pub remove_all_submissions: bool,
    #[serde(default, rename = "targetSubreddits")]
    pub target_subreddits: Vec<String>,
}

impl Default for NukeRule {
    fn default() -> Self {
        Self {
            enabled: false,
            ban_from_all_listed: true,
            remove_all_comments: true,
            remove_all_submissions: true,
            target_subreddits: Vec::new(),
        }
    }
}

/// One configured reaction bundle, matched by the assigned flair template id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlairRule {
    #[serde(rename = "templateId")]
    pub template_id: String,
    /// Free-text description; also the default removal body in legacy configs.
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub approve: bool,
    #[serde(default)]
    pub remove: bool,
    #[serde(default)]
    pub lock: bool,
    #[serde(default)]
    pub spoiler: bool,
    #[serde(default, rename = "clearPostFlair")]
    pub clear_post_flair: bool,
    /// Mod-log note text; doubles as the removal mod-note (first 100 chars)
    /// when `remove` is enabled.
    #[serde(default, rename = "modlogReason")]
    pub modlog_reason: String,
    #[serde(default)]
    pub comment: CommentRule,
    #[serde(default, rename = "nukeUserComments")]
    pub nuke_user_comments: bool,
    #[serde(default)]
    pub usernote: UsernoteRule,
    #[serde(default)]
    pub contributor: ContributorRule,
    #[serde(default, rename = "userFlair")]
    pub user_flair: UserFlairRule,
    #[serde(default)]
    pub ban: BanRule,
    #[serde(default)]
    pub unban: bool,
    #[serde(default, rename = "sendToWebhook")]
    pub send_to_webhook: bool,
    #[serde(default)]
    pub nuke: NukeRule,
}

// ── Whole-community configuration ─────────────────────────────────────────────

/// A community's active configuration: the general record plus one rule per
/// recognized flair template.
///
/// The wire form is a JSON array whose first element is
/// `{"GeneralConfiguration": {…}}` and whose remaining elements are flair
/// rules. [`SubredditConfig::from_json`] validates the sequence shape,
/// non-empty template ids and uniqueness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubredditConfig {
    pub general: GeneralConfiguration,
    pub flairs: Vec<FlairRule>,
}

#[derive(Serialize, Deserialize)]
struct GeneralEnvelope {
    #[serde(rename = "GeneralConfiguration")]
    general: GeneralConfiguration,
}

impl SubredditConfig {
    /// Parse and validate the wire JSON array.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let items: Vec<serde_json::Value> = serde_json::from_str(text)?;
        Self::from_values(items)
    }

    /// Build from already-parsed array elements (used after legacy conversion).
    pub fn from_values(items: Vec<serde_json::Value>) -> Result<Self, ConfigError> {
        let mut iter = items.into_iter();
        let head = iter.next().ok_or(ConfigError::MissingGeneral)?;
        if head.get("GeneralConfiguration").is_none() {
            return Err(ConfigError::MissingGeneral);
        }
        let envelope: GeneralEnvelope = serde_json::from_value(head)?;

        let mut flairs = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (i, item) in iter.enumerate() {
            let rule: FlairRule = serde_json::from_value(item)?;
            if rule.template_id.is_empty() {
                return Err(ConfigError::EmptyTemplateId(i + 1));
            }
            if !seen.insert(rule.template_id.clone()) {
                return Err(ConfigError::DuplicateTemplateId(rule.template_id));
            }
            flairs.push(rule);
        }
        Ok(Self {
            general: envelope.general,
            flairs,
        })
    }

    /// Unique rule lookup by flair template id.
    pub fn find_rule(&self, template_id: &str) -> Option<&FlairRule> {
        self.flairs.iter().find(|f| f.template_id == template_id)
    }

    fn to_values(&self) -> Vec<serde_json::Value> {
        let mut items = Vec::with_capacity(self.flairs.len() + 1);
        items.push(
            serde_json::to_value(GeneralEnvelope {
                general: self.general.clone(),
            })
            .expect("general configuration serializes"),
        );
        for rule in &self.flairs {
            items.push(serde_json::to_value(rule).expect("flair rule serializes"));
        }
        items
    }

    /// Canonical serialization: stable key order, compact. Two configs are
    /// equal exactly when their canonical strings are equal, so the ingest
    /// diff detects real changes rather than representation churn.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.to_values()).expect("config serializes")
    }

    /// Pretty canonical form, written back to the community wiki page.
    pub fn pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_values()).expect("config serializes")
    }
}

impl Serialize for SubredditConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_values().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SubredditConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<serde_json::Value>::deserialize(deserializer)?;
        SubredditConfig::from_values(items).map_err(D::Error::custom)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"GeneralConfiguration": {"header": "Hi u/{{author}}", "removal_comment_type": "public_as_subreddit"}},
        {"templateId": "g1", "remove": true, "comment": {"enabled": true, "body": "Rule: no X"}}
    ]"#;

    #[test]
    fn parses_wire_form() {
        let cfg = SubredditConfig::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.general.header, "Hi u/{{author}}");
        assert_eq!(cfg.flairs.len(), 1);
        let rule = cfg.find_rule("g1").unwrap();
        assert!(rule.remove);
        assert!(rule.comment.enabled);
        assert!(rule.comment.distinguish, "distinguish defaults on");
    }

    #[test]
    fn rejects_missing_general() {
        let err = SubredditConfig::from_json(r#"[{"templateId": "g1"}]"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingGeneral));
    }

    #[test]
    fn rejects_empty_template_id() {
        let err = SubredditConfig::from_json(
            r#"[{"GeneralConfiguration": {}}, {"templateId": ""}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTemplateId(1)));
    }

    #[test]
    fn rejects_duplicate_template_id() {
        let err = SubredditConfig::from_json(
            r#"[{"GeneralConfiguration": {}}, {"templateId": "a"}, {"templateId": "a"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTemplateId(ref t) if t == "a"));
    }

    #[test]
    fn canonical_json_is_fixpoint() {
        let cfg = SubredditConfig::from_json(SAMPLE).unwrap();
        let canonical = cfg.canonical_json();
        let reparsed = SubredditConfig::from_json(&canonical).unwrap();
        assert_eq!(reparsed.canonical_json(), canonical);
        assert_eq!(reparsed, cfg);
    }

    #[test]
    fn ban_duration_wire_shapes() {
        let parse = |raw: &str| -> BanDuration {
            serde_json::from_str::<BanDuration>(raw).unwrap()
        };
        assert_eq!(parse("\"\""), BanDuration::Permanent);
        assert_eq!(parse("true"), BanDuration::Permanent);
        assert_eq!(parse("7"), BanDuration::Days(7));
        assert_eq!(parse("\"7\""), BanDuration::Days(7));
        assert_eq!(
            parse("\"1,3,7,14,0\""),
            BanDuration::Escalating(vec![1, 3, 7, 14, 0])
        );
        assert!(matches!(parse("0"), BanDuration::Invalid(_)));
        assert!(matches!(parse("\"soon\""), BanDuration::Invalid(_)));
    }

    #[test]
    fn ban_duration_round_trips() {
        for raw in ["\"\"", "7", "\"1,3,7,14,0\"", "0", "\"soon\""] {
            let d: BanDuration = serde_json::from_str(raw).unwrap();
            let back = serde_json::to_string(&d).unwrap();
            let d2: BanDuration = serde_json::from_str(&back).unwrap();
            assert_eq!(d, d2, "round-trip for {raw}");
        }
    }

    #[test]
    fn user_flair_accepts_both_template_key_spellings() {
        let a: UserFlairRule =
            serde_json::from_str(r#"{"enabled": true, "templateId": "x"}"#).unwrap();
        let b: UserFlairRule =
            serde_json::from_str(r#"{"enabled": true, "templateID": "x"}"#).unwrap();
        assert_eq!(a.template_id, "x");
        assert_eq!(b.template_id, "x");
        // Canonical writes use templateId.
        let out = serde_json::to_string(&b).unwrap();
        assert!(out.contains("templateId"));
        assert!(!out.contains("templateID"));
    }
}
