// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Deterministic conversion of the legacy YAML configuration layout into the
//! canonical JSON sequence.
//!
//! The legacy form keys most options by flair GUID in per-option maps
//! (`remove: {guid: true}`, `bans: {guid: duration}`, …) with the removal
//! body text under `flairs: {guid: text}`. The converter projects those maps
//! into one [`FlairRule`]-shaped object per GUID; the engine never consumes
//! the YAML form directly.

use serde_json::{json, Value};

use crate::sanitize::{sanitize_ban_note, sanitize_modlog_reason};
use crate::schema::ConfigError;

/// `true` when the GUID appears in the named legacy map (or list).
fn contains(doc: &Value, key: &str, guid: &str) -> bool {
    match doc.get(key) {
        Some(Value::Object(map)) => map.contains_key(guid),
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(guid)),
        _ => false,
    }
}

fn lookup<'a>(doc: &'a Value, key: &str, guid: &str) -> Option<&'a Value> {
    doc.get(key).and_then(|m| m.get(guid))
}

fn lookup_str(doc: &Value, key: &str, guid: &str) -> String {
    lookup(doc, key, guid)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn lookup_bool(doc: &Value, key: &str, guid: &str) -> bool {
    lookup(doc, key, guid)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn top_level(doc: &Value, key: &str, default: Value) -> Value {
    doc.get(key).cloned().unwrap_or(default)
}

/// Convert a legacy YAML document into the canonical JSON array elements.
///
/// The mapping is lossless for every field the engine consumes; text destined
/// for mod-notes passes through the sanitizers here so the cached config is
/// already within platform limits.
pub fn convert_yaml_config(text: &str) -> Result<Vec<Value>, ConfigError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    let doc: Value = serde_json::to_value(&yaml)?;

    let general = json!({
        "GeneralConfiguration": {
            "notes": top_level(&doc, "notes", json!("")),
            "header": top_level(&doc, "header", json!("")),
            "footer": top_level(&doc, "footer", json!("")),
            "usernote_type_name": top_level(&doc, "usernote_type_name", json!("")),
            "removal_comment_type": top_level(&doc, "removal_comment_type", json!("")),
            "skip_add_newlines": top_level(&doc, "skip_add_newlines", json!(false)),
            "require_config_to_edit": top_level(&doc, "require_config_to_edit", json!(false)),
            "ignore_same_flair_seconds": top_level(&doc, "ignore_same_flair_seconds", json!(60)),
            "webhook": top_level(&doc, "webhook", json!("")),
            "wh_content": top_level(&doc, "wh_content", json!("")),
            "wh_ping_over_score": top_level(&doc, "wh_ping_over_score", Value::Null),
            "wh_ping_over_ping": top_level(&doc, "wh_ping_over_ping", json!("")),
            "wh_exclude_mod": top_level(&doc, "wh_exclude_mod", json!(false)),
            "wh_exclude_reports": top_level(&doc, "wh_exclude_reports", json!(false)),
            "wh_exclude_image": top_level(&doc, "wh_exclude_image", json!(false)),
            "wh_include_nsfw_images": top_level(&doc, "wh_include_nsfw_images", json!(false)),
            "utc_offset": top_level(&doc, "utc_offset", json!(0)),
            "custom_time_format": top_level(&doc, "custom_time_format", json!("")),
            "maxAgeForComment": top_level(&doc, "max_age_for_comment", json!(175)),
            "maxAgeForBan": top_level(&doc, "max_age_for_ban", Value::Null),
        }
    });

    let mut items = vec![general];

    let flairs = match doc.get("flairs") {
        Some(Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };

    for (guid, body) in &flairs {
        let removal_text = body.as_str().unwrap_or_default().to_string();

        // Legacy `ban:` holds the mod-log reason text; `ban_note:` the ban
        // mod-note; `bans:` the duration.
        let modlog_reason = sanitize_modlog_reason(&lookup_str(&doc, "ban", guid));
        let ban_note = sanitize_ban_note(&lookup_str(&doc, "ban_note", guid));

        let ban_duration = match lookup(&doc, "bans", guid) {
            Some(Value::Bool(true)) => json!(""),
            Some(v) => v.clone(),
            None => json!(0),
        };

        let in_add = contains(&doc, "add_contributor", guid);
        let in_remove = contains(&doc, "remove_contributor", guid);

        let rule = json!({
            "templateId": guid,
            "notes": removal_text,
            "approve": contains(&doc, "approve", guid),
            "remove": contains(&doc, "remove", guid),
            "lock": contains(&doc, "lock_post", guid),
            "spoiler": contains(&doc, "spoiler_post", guid),
            "clearPostFlair": contains(&doc, "remove_link_flair", guid),
            "modlogReason": modlog_reason,
            "comment": {
                "enabled": contains(&doc, "comment", guid),
                "body": removal_text,
                "lockComment": lookup_bool(&doc, "comment_locked", guid),
                "stickyComment": lookup_bool(&doc, "comment_stickied", guid),
                "distinguish": true,
                "headerFooter": true,
            },
            "nukeUserComments": contains(&doc, "nukeUserComments", guid),
            "usernote": {
                "enabled": contains(&doc, "usernote", guid),
                "note": lookup_str(&doc, "usernote", guid),
            },
            "contributor": {
                "enabled": in_add || in_remove,
                "action": if in_remove && !in_add { "remove" } else { "add" },
            },
            "userFlair": {
                "enabled": contains(&doc, "set_author_flair_text", guid)
                    || contains(&doc, "set_author_flair_css_class", guid)
                    || contains(&doc, "set_author_flair_template_id", guid),
                "text": lookup_str(&doc, "set_author_flair_text", guid),
                "cssClass": lookup_str(&doc, "set_author_flair_css_class", guid),
                "templateId": lookup_str(&doc, "set_author_flair_template_id", guid),
            },
            "ban": {
                "enabled": contains(&doc, "bans", guid),
                "duration": ban_duration,
                "message": lookup_str(&doc, "ban_message", guid),
                "modNote": ban_note,
            },
            "unban": contains(&doc, "unbans", guid),
            "sendToWebhook": contains(&doc, "send_to_webhook", guid),
        });
        items.push(rule);
    }

    Ok(items)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BanDuration, SubredditConfig};

    const LEGACY: &str = r#"
header: "Hi u/{{author}},"
footer: "— the mods"
usernote_type_name: spamwatch
removal_comment_type: public
ignore_same_flair_seconds: 30
flairs:
  g1: "Your post violates rule 1."
  g2: "Low-effort content."
remove:
  g1: true
comment:
  g1: true
comment_stickied:
  g1: true
lock_post:
  g2: true
bans:
  g2: 7
ban_message:
  g2: "You are banned."
ban_note:
  g2: "rule #2 <evasion>"
ban:
  g1: "Removed: rule 1\nsee  wiki"
usernote:
  g1: "rule 1 removal"
add_contributor:
  g1: true
remove_contributor:
  g2: true
unbans:
  g1: true
send_to_webhook:
  - g2
"#;

    #[test]
    fn converts_representative_document() {
        let items = convert_yaml_config(LEGACY).unwrap();
        let cfg = SubredditConfig::from_values(items).unwrap();

        assert_eq!(cfg.general.header, "Hi u/{{author}},");
        assert_eq!(cfg.general.usernote_type_name, "spamwatch");
        assert_eq!(cfg.general.ignore_same_flair_seconds, 30);
        assert_eq!(cfg.general.max_age_for_comment, 175);

        let g1 = cfg.find_rule("g1").unwrap();
        assert!(g1.remove);
        assert!(g1.comment.enabled);
        assert!(g1.comment.sticky_comment);
        assert_eq!(g1.comment.body, "Your post violates rule 1.");
        assert_eq!(g1.notes, "Your post violates rule 1.");
        // Newlines collapsed, double space collapsed.
        assert_eq!(g1.modlog_reason, "Removed rule 1 see wiki");
        assert!(g1.usernote.enabled);
        assert_eq!(g1.usernote.note, "rule 1 removal");
        assert!(g1.contributor.enabled);
        assert_eq!(
            g1.contributor.action,
            crate::schema::ContributorAction::Add
        );
        assert!(g1.unban);
        assert!(!g1.ban.enabled);

        let g2 = cfg.find_rule("g2").unwrap();
        assert!(g2.lock);
        assert!(g2.ban.enabled);
        assert_eq!(g2.ban.duration, BanDuration::Days(7));
        assert_eq!(g2.ban.message, "You are banned.");
        // Charset filter dropped '#', '<' and '>'.
        assert_eq!(g2.ban.mod_note, "rule 2 evasion");
        assert!(g2.send_to_webhook);
        assert_eq!(
            g2.contributor.action,
            crate::schema::ContributorAction::Remove
        );
    }

    #[test]
    fn boolean_true_duration_becomes_permanent() {
        let items =
            convert_yaml_config("flairs:\n  g: text\nbans:\n  g: true\n").unwrap();
        let cfg = SubredditConfig::from_values(items).unwrap();
        assert_eq!(cfg.find_rule("g").unwrap().ban.duration, BanDuration::Permanent);
    }

    #[test]
    fn conversion_is_canonicalization_fixpoint() {
        let items = convert_yaml_config(LEGACY).unwrap();
        let cfg = SubredditConfig::from_values(items).unwrap();
        let reparsed = SubredditConfig::from_json(&cfg.canonical_json()).unwrap();
        assert_eq!(reparsed, cfg);
    }

    #[test]
    fn empty_document_yields_general_only() {
        let items = convert_yaml_config("{}").unwrap();
        assert_eq!(items.len(), 1);
        let cfg = SubredditConfig::from_values(items).unwrap();
        assert!(cfg.flairs.is_empty());
    }
}
