// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Production [`Platform`] client over the forum's OAuth REST API.
//!
//! Deliberately thin: the operator supplies a ready bearer token (acquisition
//! and refresh live outside this repository) and per-call retry is owned by
//! the callers through [`crate::RetryPolicy`]. The client maps HTTP status
//! and API error bodies onto [`PlatformError`] kinds and decodes only the
//! fields the engine consumes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use crate::{
    client::{ModLogStream, Platform},
    error::PlatformError,
    types::{
        AuthoredItem, CommentInfo, FlairTemplate, InboxMessage, ModLogEntry, ModeratorInfo,
        RemovalCommentKind, Submission, UserFlairInfo,
    },
};

const DEFAULT_BASE_URL: &str = "https://oauth.reddit.com";
/// Pause between mod-log polls once the feed is drained.
const MOD_LOG_POLL_INTERVAL: Duration = Duration::from_secs(2);

struct Inner {
    http: reqwest::Client,
    base_url: String,
    token: String,
    username: String,
}

/// HTTP-backed platform client.
#[derive(Clone)]
pub struct HttpPlatform {
    inner: Arc<Inner>,
}

impl HttpPlatform {
    /// Build a client for an already-known account name.
    pub fn new(
        base_url: Option<&str>,
        token: &str,
        user_agent: &str,
        username: &str,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
                token: token.to_string(),
                username: username.to_string(),
            }),
        })
    }

    /// Build a client and resolve the account name from the API.
    pub async fn connect(
        base_url: Option<&str>,
        token: &str,
        user_agent: &str,
    ) -> Result<Self, PlatformError> {
        let probe = Self::new(base_url, token, user_agent, "")?;
        let me = probe.get_json("/api/v1/me", &[]).await?;
        let username = me
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::Decode("missing account name".into()))?
            .to_string();
        debug!(username, "authenticated to platform");
        Ok(Self {
            inner: Arc::new(Inner {
                http: probe.inner.http.clone(),
                base_url: probe.inner.base_url.clone(),
                token: probe.inner.token.clone(),
                username,
            }),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, PlatformError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let resp = self
            .inner
            .http
            .get(&url)
            .bearer_auth(&self.inner.token)
            .query(&[("raw_json", "1")])
            .query(query)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<Value, PlatformError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let resp = self
            .inner
            .http
            .post(&url)
            .bearer_auth(&self.inner.token)
            .query(&[("raw_json", "1")])
            .form(form)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn decode(resp: reqwest::Response) -> Result<Value, PlatformError> {
        let status = resp.status();
        match status.as_u16() {
            404 => return Err(PlatformError::NotFound),
            403 => return Err(PlatformError::Forbidden),
            429 => {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(Duration::from_secs(60));
                return Err(PlatformError::RateLimited { retry_after });
            }
            s if s >= 500 => return Err(PlatformError::Server { status: s }),
            _ => {}
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;

        // API-level errors arrive with HTTP 200 in `json.errors`.
        if let Some(errors) = body.pointer("/json/errors").and_then(Value::as_array) {
            if let Some(first) = errors.first().and_then(Value::as_array) {
                let code = first.first().and_then(Value::as_str).unwrap_or("UNKNOWN");
                let message = first.get(1).and_then(Value::as_str).unwrap_or_default();
                if code == "RATELIMIT" {
                    return Err(PlatformError::rate_limited_from_message(message));
                }
                return Err(PlatformError::Api {
                    code: code.to_string(),
                    message: message.to_string(),
                });
            }
        }
        Ok(body)
    }

    fn listing_children(body: &Value) -> Vec<&Value> {
        body.pointer("/data/children")
            .and_then(Value::as_array)
            .map(|c| c.iter().filter_map(|child| child.get("data")).collect())
            .unwrap_or_default()
    }

    fn str_field(data: &Value, key: &str) -> String {
        data.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
    }

    fn opt_str_field(data: &Value, key: &str) -> Option<String> {
        data.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn bool_field(data: &Value, key: &str) -> bool {
        data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    fn decode_submission(data: &Value) -> Submission {
        let author = Self::opt_str_field(data, "author").filter(|a| a != "[deleted]");
        Submission {
            id: Self::str_field(data, "id"),
            title: Self::str_field(data, "title"),
            author,
            author_id: Self::opt_str_field(data, "author_fullname")
                .map(|f| f.trim_start_matches("t2_").to_string()),
            author_is_suspended: Self::bool_field(data, "author_is_suspended"),
            selftext: Self::str_field(data, "selftext"),
            permalink: Self::str_field(data, "permalink"),
            url: Self::str_field(data, "url"),
            domain: Self::str_field(data, "domain"),
            subreddit: Self::str_field(data, "subreddit"),
            subreddit_id: Self::str_field(data, "subreddit_id")
                .trim_start_matches("t5_")
                .to_string(),
            score: data.get("score").and_then(Value::as_i64).unwrap_or(0),
            over_18: Self::bool_field(data, "over_18"),
            created_utc: data
                .get("created_utc")
                .and_then(Value::as_f64)
                .unwrap_or(0.0) as i64,
            removed: Self::bool_field(data, "removed")
                || Self::opt_str_field(data, "removed_by_category").is_some(),
            locked: Self::bool_field(data, "locked"),
            spoiler: Self::bool_field(data, "spoiler"),
            link_flair_text: Self::opt_str_field(data, "link_flair_text"),
            link_flair_css_class: Self::opt_str_field(data, "link_flair_css_class"),
            link_flair_template_id: Self::opt_str_field(data, "link_flair_template_id"),
            author_flair_text: Self::opt_str_field(data, "author_flair_text"),
            author_flair_css_class: Self::opt_str_field(data, "author_flair_css_class"),
            author_flair_template_id: Self::opt_str_field(data, "author_flair_template_id"),
            user_reports: decode_reports(data.get("user_reports")),
            mod_reports: decode_mod_reports(data.get("mod_reports")),
        }
    }

    fn decode_mod_log_entry(data: &Value) -> ModLogEntry {
        ModLogEntry {
            action: Self::str_field(data, "action"),
            mod_name: Self::str_field(data, "mod"),
            subreddit: Self::str_field(data, "subreddit"),
            target_fullname: Self::opt_str_field(data, "target_fullname"),
            details: Self::opt_str_field(data, "details"),
        }
    }

    async fn fetch_mod_log(
        &self,
        before: Option<&str>,
    ) -> Result<Vec<(String, ModLogEntry)>, PlatformError> {
        let mut query: Vec<(&str, &str)> = vec![("limit", "100")];
        if let Some(anchor) = before {
            query.push(("before", anchor));
        }
        let body = self.get_json("/r/mod/about/log", &query).await?;
        let mut entries = Vec::new();
        for data in Self::listing_children(&body) {
            let fullname = Self::str_field(data, "id");
            entries.push((fullname, Self::decode_mod_log_entry(data)));
        }
        Ok(entries)
    }

    fn authored_items(body: &Value) -> Vec<AuthoredItem> {
        Self::listing_children(body)
            .into_iter()
            .map(|data| AuthoredItem {
                id: Self::str_field(data, "id"),
                subreddit: Self::str_field(data, "subreddit"),
                removed: Self::bool_field(data, "removed")
                    || Self::opt_str_field(data, "removed_by_category").is_some()
                    || Self::opt_str_field(data, "banned_by").is_some(),
            })
            .collect()
    }
}

fn decode_reports(v: Option<&Value>) -> Vec<(String, i64)> {
    v.and_then(Value::as_array)
        .map(|reports| {
            reports
                .iter()
                .filter_map(|r| {
                    let pair = r.as_array()?;
                    Some((
                        pair.first()?.as_str()?.to_string(),
                        pair.get(1).and_then(Value::as_i64).unwrap_or(1),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn decode_mod_reports(v: Option<&Value>) -> Vec<(String, String)> {
    v.and_then(Value::as_array)
        .map(|reports| {
            reports
                .iter()
                .filter_map(|r| {
                    let pair = r.as_array()?;
                    Some((
                        pair.get(1).and_then(Value::as_str).unwrap_or_default().to_string(),
                        pair.first()?.as_str().unwrap_or_default().to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Platform for HttpPlatform {
    fn bot_username(&self) -> &str {
        &self.inner.username
    }

    async fn moderated_subreddits(&self) -> Result<Vec<String>, PlatformError> {
        let mut names = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = vec![("limit", "100")];
            if let Some(a) = &after {
                query.push(("after", a));
            }
            let body = self
                .get_json("/subreddits/mine/moderator", &query)
                .await?;
            for data in Self::listing_children(&body) {
                names.push(Self::str_field(data, "display_name"));
            }
            after = body
                .pointer("/data/after")
                .and_then(Value::as_str)
                .map(str::to_string);
            if after.is_none() {
                break;
            }
        }
        Ok(names)
    }

    async fn mod_log_stream(&self) -> Result<ModLogStream, PlatformError> {
        // Anchor on the newest existing entry so the stream starts with
        // entries created after this call.
        let newest = self.fetch_mod_log(None).await?;
        let anchor = newest.first().map(|(fullname, _)| fullname.clone());
        let client = self.clone();

        let stream = futures::stream::unfold(
            (client, anchor, VecDeque::<ModLogEntry>::new()),
            |(client, mut anchor, mut buffer)| async move {
                loop {
                    if let Some(entry) = buffer.pop_front() {
                        return Some((Ok(entry), (client, anchor, buffer)));
                    }
                    match client.fetch_mod_log(anchor.as_deref()).await {
                        Ok(entries) => {
                            if let Some((fullname, _)) = entries.first() {
                                anchor = Some(fullname.clone());
                            }
                            // Listing is newest-first; emit oldest-first.
                            for (_, entry) in entries.into_iter().rev() {
                                buffer.push_back(entry);
                            }
                            if buffer.is_empty() {
                                tokio::time::sleep(MOD_LOG_POLL_INTERVAL).await;
                            }
                        }
                        Err(err) => return Some((Err(err), (client, anchor, buffer))),
                    }
                }
            },
        );
        Ok(stream.boxed())
    }

    async fn submission(&self, id: &str) -> Result<Submission, PlatformError> {
        let fullname = format!("t3_{id}");
        let body = self.get_json("/api/info", &[("id", &fullname)]).await?;
        let children = Self::listing_children(&body);
        let data = children.first().ok_or(PlatformError::NotFound)?;
        Ok(Self::decode_submission(data))
    }

    async fn submission_comments(&self, id: &str) -> Result<Vec<CommentInfo>, PlatformError> {
        let body = self
            .get_json(&format!("/comments/{id}"), &[("limit", "500")])
            .await?;
        // Response is [submission-listing, comment-listing].
        let comments = body
            .get(1)
            .map(Self::listing_children)
            .unwrap_or_default()
            .into_iter()
            .filter(|data| data.get("id").is_some())
            .map(|data| CommentInfo {
                id: Self::str_field(data, "id"),
                removed: Self::bool_field(data, "removed")
                    || Self::opt_str_field(data, "banned_by").is_some(),
                distinguished: Self::opt_str_field(data, "distinguished"),
            })
            .collect();
        Ok(comments)
    }

    async fn approve_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form("/api/approve", &[("id", &format!("t3_{id}"))])
            .await
            .map(drop)
    }

    async fn remove_submission(
        &self,
        id: &str,
        spam: bool,
        mod_note: &str,
    ) -> Result<(), PlatformError> {
        self.post_form(
            "/api/remove",
            &[
                ("id", &format!("t3_{id}")),
                ("spam", if spam { "true" } else { "false" }),
                ("mod_note", mod_note),
            ],
        )
        .await
        .map(drop)
    }

    async fn lock_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form("/api/lock", &[("id", &format!("t3_{id}"))])
            .await
            .map(drop)
    }

    async fn unlock_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form("/api/unlock", &[("id", &format!("t3_{id}"))])
            .await
            .map(drop)
    }

    async fn spoiler_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form("/api/spoiler", &[("id", &format!("t3_{id}"))])
            .await
            .map(drop)
    }

    async fn unspoiler_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form("/api/unspoiler", &[("id", &format!("t3_{id}"))])
            .await
            .map(drop)
    }

    async fn set_post_flair(
        &self,
        id: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), PlatformError> {
        let submission = self.submission(id).await?;
        self.post_form(
            &format!("/r/{}/api/flair", submission.subreddit),
            &[
                ("link", &format!("t3_{id}")),
                ("text", text),
                ("css_class", css_class),
            ],
        )
        .await
        .map(drop)
    }

    async fn create_mod_note(&self, id: &str, note: &str) -> Result<(), PlatformError> {
        let submission = self.submission(id).await?;
        let user = submission.author.as_deref().unwrap_or("[deleted]");
        self.post_form(
            "/api/mod/notes",
            &[
                ("subreddit", submission.subreddit.as_str()),
                ("user", user),
                ("reddit_id", &format!("t3_{id}")),
                ("note", note),
            ],
        )
        .await
        .map(drop)
    }

    async fn send_removal_message(
        &self,
        id: &str,
        message: &str,
        kind: RemovalCommentKind,
    ) -> Result<(), PlatformError> {
        self.post_form(
            "/api/v1/modactions/removal_link_message",
            &[
                ("item_id", &format!("t3_{id}")),
                ("message", message),
                ("title", "ignored"),
                ("type", kind.as_str()),
            ],
        )
        .await
        .map(drop)
    }

    async fn reply_to_submission(&self, id: &str, body: &str) -> Result<String, PlatformError> {
        let resp = self
            .post_form(
                "/api/comment",
                &[
                    ("thing_id", &format!("t3_{id}")),
                    ("text", body),
                    ("api_type", "json"),
                ],
            )
            .await?;
        resp.pointer("/json/data/things/0/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PlatformError::Decode("missing comment id in reply".into()))
    }

    async fn distinguish_comment(&self, id: &str, sticky: bool) -> Result<(), PlatformError> {
        self.post_form(
            "/api/distinguish",
            &[
                ("id", &format!("t1_{id}")),
                ("how", "yes"),
                ("sticky", if sticky { "true" } else { "false" }),
                ("api_type", "json"),
            ],
        )
        .await
        .map(drop)
    }

    async fn lock_comment(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form("/api/lock", &[("id", &format!("t1_{id}"))])
            .await
            .map(drop)
    }

    async fn remove_comment(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form(
            "/api/remove",
            &[("id", &format!("t1_{id}")), ("spam", "false")],
        )
        .await
        .map(drop)
    }

    async fn ban_user(
        &self,
        subreddit: &str,
        user: &str,
        message: &str,
        reason: &str,
        duration_days: Option<u32>,
    ) -> Result<(), PlatformError> {
        let duration;
        let mut form: Vec<(&str, &str)> = vec![
            ("name", user),
            ("type", "banned"),
            ("ban_message", message),
            ("ban_reason", reason),
            ("api_type", "json"),
        ];
        if let Some(days) = duration_days {
            duration = days.to_string();
            form.push(("duration", &duration));
        }
        self.post_form(&format!("/r/{subreddit}/api/friend"), &form)
            .await
            .map(drop)
    }

    async fn unban_user(&self, subreddit: &str, user: &str) -> Result<(), PlatformError> {
        self.post_form(
            &format!("/r/{subreddit}/api/unfriend"),
            &[("name", user), ("type", "banned"), ("api_type", "json")],
        )
        .await
        .map(drop)
    }

    async fn set_user_flair(
        &self,
        subreddit: &str,
        user: &str,
        text: &str,
        css_class: &str,
    ) -> Result<(), PlatformError> {
        self.post_form(
            &format!("/r/{subreddit}/api/flair"),
            &[("name", user), ("text", text), ("css_class", css_class)],
        )
        .await
        .map(drop)
    }

    async fn set_user_flair_template(
        &self,
        subreddit: &str,
        user: &str,
        template_id: &str,
    ) -> Result<(), PlatformError> {
        self.post_form(
            &format!("/r/{subreddit}/api/selectflair"),
            &[("name", user), ("flair_template_id", template_id)],
        )
        .await
        .map(drop)
    }

    async fn user_flair(
        &self,
        subreddit: &str,
        user: &str,
    ) -> Result<Option<UserFlairInfo>, PlatformError> {
        let body = self
            .get_json(&format!("/r/{subreddit}/api/flairlist"), &[("name", user)])
            .await?;
        let info = body
            .get("users")
            .and_then(Value::as_array)
            .and_then(|users| users.first())
            .map(|u| UserFlairInfo {
                text: Self::str_field(u, "flair_text"),
                css_class: Self::str_field(u, "flair_css_class"),
            })
            .filter(|f| !f.text.is_empty() || !f.css_class.is_empty());
        Ok(info)
    }

    async fn add_contributor(&self, subreddit: &str, user: &str) -> Result<(), PlatformError> {
        self.post_form(
            &format!("/r/{subreddit}/api/friend"),
            &[("name", user), ("type", "contributor"), ("api_type", "json")],
        )
        .await
        .map(drop)
    }

    async fn remove_contributor(
        &self,
        subreddit: &str,
        user: &str,
    ) -> Result<(), PlatformError> {
        self.post_form(
            &format!("/r/{subreddit}/api/unfriend"),
            &[("name", user), ("type", "contributor"), ("api_type", "json")],
        )
        .await
        .map(drop)
    }

    async fn user_comments(&self, user: &str) -> Result<Vec<AuthoredItem>, PlatformError> {
        let body = self
            .get_json(&format!("/user/{user}/comments"), &[("limit", "100")])
            .await?;
        Ok(Self::authored_items(&body))
    }

    async fn user_submissions(&self, user: &str) -> Result<Vec<AuthoredItem>, PlatformError> {
        let body = self
            .get_json(&format!("/user/{user}/submitted"), &[("limit", "100")])
            .await?;
        Ok(Self::authored_items(&body))
    }

    async fn remove_user_submission(&self, id: &str) -> Result<(), PlatformError> {
        self.post_form(
            "/api/remove",
            &[("id", &format!("t3_{id}")), ("spam", "false")],
        )
        .await
        .map(drop)
    }

    async fn moderators(&self, subreddit: &str) -> Result<Vec<ModeratorInfo>, PlatformError> {
        let body = self
            .get_json(&format!("/r/{subreddit}/about/moderators"), &[])
            .await?;
        let mods = body
            .pointer("/data/children")
            .and_then(Value::as_array)
            .map(|children| {
                children
                    .iter()
                    .map(|m| ModeratorInfo {
                        name: Self::str_field(m, "name"),
                        permissions: m
                            .get("mod_permissions")
                            .and_then(Value::as_array)
                            .map(|perms| {
                                perms
                                    .iter()
                                    .filter_map(Value::as_str)
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(mods)
    }

    async fn am_moderator(&self, subreddit: &str) -> Result<bool, PlatformError> {
        let body = self.get_json(&format!("/r/{subreddit}/about"), &[]).await?;
        Ok(body
            .pointer("/data/user_is_moderator")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn link_flair_templates(
        &self,
        subreddit: &str,
    ) -> Result<Vec<FlairTemplate>, PlatformError> {
        let body = self
            .get_json(&format!("/r/{subreddit}/api/link_flair_v2"), &[])
            .await?;
        let templates = body
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|t| FlairTemplate {
                        id: Self::str_field(t, "id"),
                        text: Self::str_field(t, "text"),
                        mod_only: Self::bool_field(t, "mod_only"),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(templates)
    }

    async fn accept_mod_invite(&self, subreddit: &str) -> Result<(), PlatformError> {
        self.post_form(
            &format!("/r/{subreddit}/api/accept_moderator_invite"),
            &[("api_type", "json")],
        )
        .await
        .map(drop)
    }

    async fn wiki_page(&self, subreddit: &str, page: &str) -> Result<String, PlatformError> {
        let body = self
            .get_json(&format!("/r/{subreddit}/wiki/{page}"), &[])
            .await?;
        Ok(body
            .pointer("/data/content_md")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn edit_wiki_page(
        &self,
        subreddit: &str,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.post_form(
            &format!("/r/{subreddit}/api/wiki/edit"),
            &[("page", page), ("content", content), ("reason", reason)],
        )
        .await
        .map(drop)
    }

    async fn wiki_revision_author(
        &self,
        subreddit: &str,
        page: &str,
    ) -> Result<Option<String>, PlatformError> {
        let body = self
            .get_json(
                &format!("/r/{subreddit}/wiki/revisions/{page}"),
                &[("limit", "1")],
            )
            .await?;
        Ok(body
            .pointer("/data/children")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|rev| rev.pointer("/author/data/name").or_else(|| rev.get("author")))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn unread_messages(&self) -> Result<Vec<InboxMessage>, PlatformError> {
        let body = self
            .get_json("/message/unread", &[("limit", "100")])
            .await?;
        let messages = Self::listing_children(&body)
            .into_iter()
            .map(|data| InboxMessage {
                id: Self::str_field(data, "id"),
                author: Self::opt_str_field(data, "author"),
                subject: Self::str_field(data, "subject"),
                body: Self::str_field(data, "body"),
                subreddit: Self::opt_str_field(data, "subreddit"),
                was_comment: Self::bool_field(data, "was_comment"),
            })
            .collect();
        Ok(messages)
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), PlatformError> {
        self.post_form("/api/read_message", &[("id", &format!("t4_{message_id}"))])
            .await
            .map(drop)
    }

    async fn reply_message(&self, message_id: &str, body: &str) -> Result<(), PlatformError> {
        self.post_form(
            "/api/comment",
            &[
                ("thing_id", &format!("t4_{message_id}")),
                ("text", body),
                ("api_type", "json"),
            ],
        )
        .await
        .map(drop)
    }

    async fn send_message_to_user(
        &self,
        user: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError> {
        self.post_form(
            "/api/compose",
            &[
                ("to", user),
                ("subject", subject),
                ("text", body),
                ("api_type", "json"),
            ],
        )
        .await
        .map(drop)
    }

    async fn send_message_to_subreddit(
        &self,
        subreddit: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError> {
        let to = format!("/r/{subreddit}");
        self.post_form(
            "/api/compose",
            &[
                ("to", &to),
                ("subject", subject),
                ("text", body),
                ("api_type", "json"),
            ],
        )
        .await
        .map(drop)
    }
}
