// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-community webhook embed for the `sendToWebhook` action.

use chrono::DateTime;
use serde_json::{json, Value};
use tracing::{debug, warn};

use flairmod_platform::Submission;
use flairmod_rules::GeneralConfiguration;

const EMBED_COLOR: u32 = 242424;

/// Build the webhook payload announcing a flaired post.
///
/// Field selection follows the community's `wh_*` toggles: the actioning mod
/// and reports can be excluded, the preview image can be excluded, and NSFW
/// images are withheld unless explicitly included. A configured content line
/// is attached, upgraded to a ping when the score passes the threshold.
pub fn build_post_embed(
    general: &GeneralConfiguration,
    post: &Submission,
    user_flair_text: &str,
    mod_name: &str,
) -> Value {
    let author = post.author.as_deref().unwrap_or("[deleted]");
    let created = DateTime::from_timestamp(post.created_utc, 0)
        .map(|t| t.format("%b %d %Y %H:%M:%S UTC").to_string())
        .unwrap_or_default();

    let mut fields = vec![
        json!({"name": "Author", "value": author, "inline": true}),
        json!({"name": "Score", "value": post.score.to_string(), "inline": true}),
        json!({"name": "Created", "value": created, "inline": true}),
        json!({"name": "User Flair", "value": user_flair_text, "inline": true}),
        json!({"name": "Subreddit", "value": format!("/r/{}", post.subreddit), "inline": true}),
    ];

    if !general.wh_exclude_mod {
        fields.push(json!({"name": "Actioned By", "value": mod_name, "inline": false}));
    }

    if !general.wh_exclude_reports {
        let user_reports: Vec<String> = post
            .user_reports
            .iter()
            .map(|(reason, count)| format!("{reason} ({count})"))
            .collect();
        if !user_reports.is_empty() {
            fields.push(json!({
                "name": "User Reports",
                "value": user_reports.join(", "),
                "inline": false
            }));
        }
        let mod_reports: Vec<String> = post
            .mod_reports
            .iter()
            .map(|(moderator, reason)| format!("{reason} ({moderator})"))
            .collect();
        if !mod_reports.is_empty() {
            fields.push(json!({
                "name": "Mod Reports",
                "value": mod_reports.join(", "),
                "inline": false
            }));
        }
    }

    let mut embed = json!({
        "title": post.title,
        "url": format!("https://www.reddit.com{}", post.permalink),
        "description": format!(
            "Post Flaired: {}",
            post.link_flair_text.as_deref().unwrap_or_default()
        ),
        "color": EMBED_COLOR,
        "fields": fields,
    });

    let include_image = if post.over_18 {
        general.wh_include_nsfw_images
    } else {
        !general.wh_exclude_image
    };
    if include_image {
        embed["image"] = json!({"url": post.url});
    }

    let mut payload = json!({"embeds": [embed]});

    let mut content = general.wh_content.clone();
    if let Some(threshold) = general.wh_ping_over_score {
        if post.score >= threshold && !general.wh_ping_over_ping.is_empty() {
            content = match general.wh_ping_over_ping.as_str() {
                "everyone" => "@everyone".to_string(),
                "here" => "@here".to_string(),
                role => format!("<@&{role}>"),
            };
        }
    }
    if !content.is_empty() {
        payload["content"] = json!(content);
    }

    payload
}

/// Deliver the embed to the community's webhook. Failures are logged; the
/// action is considered done either way, matching every other notification.
pub async fn post_flair_webhook(url: &str, payload: &Value) {
    let client = reqwest::Client::new();
    match client.post(url).json(payload).send().await {
        Ok(resp) if resp.status().is_success() => {
            debug!("flair webhook delivered");
        }
        Ok(resp) => {
            warn!(status = %resp.status(), "flair webhook rejected");
        }
        Err(err) => {
            warn!(%err, "flair webhook failed");
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Submission {
        Submission {
            id: "p1".into(),
            title: "A post".into(),
            author: Some("alice".into()),
            permalink: "/r/pics/comments/p1/a_post/".into(),
            url: "https://i.example/x.png".into(),
            subreddit: "pics".into(),
            score: 12,
            created_utc: 1_700_000_000,
            link_flair_text: Some("Rule 1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn embed_carries_core_fields() {
        let payload = build_post_embed(&GeneralConfiguration::default(), &post(), "regular", "m1");
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "A post");
        assert_eq!(embed["description"], "Post Flaired: Rule 1");
        assert!(embed["url"].as_str().unwrap().ends_with("/r/pics/comments/p1/a_post/"));
        let fields = embed["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["name"] == "Actioned By" && f["value"] == "m1"));
        assert_eq!(embed["image"]["url"], "https://i.example/x.png");
    }

    #[test]
    fn mod_exclusion_hides_actioned_by() {
        let general = GeneralConfiguration {
            wh_exclude_mod: true,
            ..Default::default()
        };
        let payload = build_post_embed(&general, &post(), "", "m1");
        let fields = payload["embeds"][0]["fields"].as_array().unwrap().clone();
        assert!(!fields.iter().any(|f| f["name"] == "Actioned By"));
    }

    #[test]
    fn nsfw_image_withheld_by_default() {
        let mut p = post();
        p.over_18 = true;
        let payload = build_post_embed(&GeneralConfiguration::default(), &p, "", "m1");
        assert!(payload["embeds"][0].get("image").is_none());

        let general = GeneralConfiguration {
            wh_include_nsfw_images: true,
            ..Default::default()
        };
        let payload = build_post_embed(&general, &p, "", "m1");
        assert!(payload["embeds"][0].get("image").is_some());
    }

    #[test]
    fn score_threshold_swaps_content_for_ping() {
        let general = GeneralConfiguration {
            wh_content: "new flair event".into(),
            wh_ping_over_score: Some(10),
            wh_ping_over_ping: "here".into(),
            ..Default::default()
        };
        let payload = build_post_embed(&general, &post(), "", "m1");
        assert_eq!(payload["content"], "@here");

        let general = GeneralConfiguration {
            wh_content: "new flair event".into(),
            wh_ping_over_score: Some(100),
            wh_ping_over_ping: "here".into(),
            ..Default::default()
        };
        let payload = build_post_embed(&general, &post(), "", "m1");
        assert_eq!(payload["content"], "new flair event");
    }

    #[test]
    fn role_ping_is_mention_syntax() {
        let general = GeneralConfiguration {
            wh_ping_over_score: Some(1),
            wh_ping_over_ping: "123456".into(),
            ..Default::default()
        };
        let payload = build_post_embed(&general, &post(), "", "m1");
        assert_eq!(payload["content"], "<@&123456>");
    }

    #[test]
    fn reports_listed_unless_excluded() {
        let mut p = post();
        p.user_reports = vec![("spam".into(), 2)];
        p.mod_reports = vec![("m2".into(), "bad".into())];
        let payload = build_post_embed(&GeneralConfiguration::default(), &p, "", "m1");
        let fields = payload["embeds"][0]["fields"].as_array().unwrap().clone();
        assert!(fields.iter().any(|f| f["name"] == "User Reports" && f["value"] == "spam (2)"));
        assert!(fields.iter().any(|f| f["name"] == "Mod Reports" && f["value"] == "bad (m2)"));

        let general = GeneralConfiguration {
            wh_exclude_reports: true,
            ..Default::default()
        };
        let payload = build_post_embed(&general, &p, "", "m1");
        let fields = payload["embeds"][0]["fields"].as_array().unwrap().clone();
        assert!(!fields.iter().any(|f| f["name"] == "User Reports"));
    }
}
