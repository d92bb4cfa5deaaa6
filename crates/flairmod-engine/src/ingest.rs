// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Config ingestion: wiki page → validated, cached [`SubredditConfig`].
//!
//! Runs at startup over every moderated community, again whenever the mod
//! log reports a revision of the config page, and on demand for a single
//! community. The previously cached config stays active through every
//! failure mode — a community can only replace its config with a valid one.

use std::sync::Arc;

use anyhow::Context;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use flairmod_config::Config;
use flairmod_notify::Notifier;
use flairmod_platform::{Platform, PlatformError, RetryPolicy};
use flairmod_rules::{convert_yaml_config, unescape_newlines, SubredditConfig};
use flairmod_store::ConfigStore;

/// Per-community wiki page holding the configuration.
pub const CONFIG_PAGE: &str = "flair_helper";

/// What one ingest pass did for a community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Page missing or blank.
    Skipped,
    /// Parsed fine and matched the cached copy.
    Unchanged,
    /// New config cached (and the wiki page canonicalized).
    Updated,
    /// Parse/validation/authorization failure; prior config retained.
    Rejected(String),
}

pub struct ConfigIngestor {
    platform: Arc<dyn Platform>,
    store: Arc<ConfigStore>,
    notifier: Arc<dyn Notifier>,
    config: Arc<Config>,
    retry: RetryPolicy,
}

impl ConfigIngestor {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<ConfigStore>,
        notifier: Arc<dyn Notifier>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            platform,
            store,
            notifier,
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy (tests use [`RetryPolicy::immediate`]).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ingest every moderated community, a bounded number at a time.
    pub async fn sweep_all(&self) -> anyhow::Result<()> {
        let bot = self.platform.bot_username().to_string();
        let subreddits: Vec<String> = self
            .platform
            .moderated_subreddits()
            .await
            .context("listing moderated communities")?
            .into_iter()
            // The account's own profile "community" carries no config.
            .filter(|s| *s != format!("u_{bot}"))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.processor.ingest_concurrency));
        let mut tasks = FuturesUnordered::new();
        for subreddit in subreddits {
            let semaphore = Arc::clone(&semaphore);
            tasks.push(async move {
                let _permit = semaphore.acquire().await.expect("ingest semaphore");
                let outcome = self.refresh(&subreddit).await;
                (subreddit, outcome)
            });
        }
        while let Some((subreddit, outcome)) = tasks.next().await {
            if let Err(err) = outcome {
                warn!(subreddit, %err, "config ingest failed");
            }
        }
        info!("config sweep finished");
        Ok(())
    }

    /// Ingest one community, retrying transient upstream failures.
    pub async fn refresh(&self, subreddit: &str) -> anyhow::Result<IngestOutcome> {
        let outcome = self
            .retry
            .run(|| async { self.ingest_once(subreddit).await })
            .await
            .with_context(|| format!("ingesting config for {subreddit}"))?;
        match &outcome {
            IngestOutcome::Skipped => debug!(subreddit, "config page blank or missing, skipped"),
            IngestOutcome::Unchanged => debug!(subreddit, "config unchanged"),
            IngestOutcome::Updated => info!(subreddit, "config updated"),
            IngestOutcome::Rejected(reason) => {
                warn!(subreddit, reason, "config rejected, prior config stays active")
            }
        }
        Ok(outcome)
    }

    async fn ingest_once(&self, subreddit: &str) -> Result<IngestOutcome, PlatformError> {
        // 1. Fetch; a missing or blank page means "not configured".
        let content = match self.platform.wiki_page(subreddit, CONFIG_PAGE).await {
            Ok(content) => content,
            Err(PlatformError::NotFound) => return Ok(IngestOutcome::Skipped),
            Err(err) => return Err(err),
        };
        let content = content.trim().to_string();
        if content.is_empty() {
            return Ok(IngestOutcome::Skipped);
        }

        // 2. Parse. A leading '[' marks the JSON form; anything else is the
        //    legacy YAML layout and gets converted (then rewritten below).
        let parsed = if content.starts_with('[') {
            serde_json::from_str::<Vec<serde_json::Value>>(&content)
                .map_err(|e| e.to_string())
        } else {
            info!(subreddit, "legacy YAML config detected, converting");
            convert_yaml_config(&content).map_err(|e| e.to_string())
        };

        let mut items = match parsed {
            Ok(items) => items,
            Err(reason) => {
                // 3. Parse failure: message the editor, keep prior config.
                self.reject_to_editor(subreddit, &reason).await;
                return Ok(IngestOutcome::Rejected(reason));
            }
        };

        // 4. Canonicalize string fields.
        for item in &mut items {
            unescape_newlines(item);
        }
        let config = match SubredditConfig::from_values(items) {
            Ok(config) => config,
            Err(err) => {
                let reason = err.to_string();
                self.reject_to_editor(subreddit, &reason).await;
                return Ok(IngestOutcome::Rejected(reason));
            }
        };

        // 5. Authorize the editor when the community gates config edits.
        if config.general.require_config_to_edit {
            if let Some(reason) = self.editor_rejection(subreddit).await? {
                self.notifier.status(&reason).await;
                return Ok(IngestOutcome::Rejected(reason));
            }
        }

        // 6. Diff under canonical serialization; representation churn is not
        //    a change.
        let canonical = config.canonical_json();
        if self.store.get_canonical(subreddit).ok().flatten().as_deref()
            == Some(canonical.as_str())
        {
            return Ok(IngestOutcome::Unchanged);
        }

        // 7. Swap, then write the canonical pretty form back unless the page
        //    already carries it.
        if let Err(err) = self.store.put(subreddit, &config) {
            warn!(subreddit, %err, "persisting config failed");
            return Ok(IngestOutcome::Rejected(err.to_string()));
        }
        let pretty = config.pretty_json();
        if content != pretty {
            self.platform
                .edit_wiki_page(subreddit, CONFIG_PAGE, &pretty, "canonicalized configuration")
                .await?;
        }

        if self.config.send_pm_on_wiki_config_update {
            let editor = self
                .platform
                .wiki_revision_author(subreddit, CONFIG_PAGE)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| "unknown".to_string());
            let body = format!(
                "Changes made by {editor} to the [configuration]\
                 (https://www.reddit.com/r/{subreddit}/wiki/edit/{CONFIG_PAGE}) \
                 for /r/{subreddit} have been successfully reloaded."
            );
            if let Err(err) = self
                .platform
                .send_message_to_subreddit(subreddit, "Configuration Reloaded", &body)
                .await
            {
                warn!(subreddit, %err, "reload notification failed");
            }
        }

        Ok(IngestOutcome::Updated)
    }

    /// `Some(reason)` when the latest editor may not change the config.
    async fn editor_rejection(&self, subreddit: &str) -> Result<Option<String>, PlatformError> {
        let editor = self
            .platform
            .wiki_revision_author(subreddit, CONFIG_PAGE)
            .await?;
        let Some(editor) = editor else {
            return Ok(None);
        };
        if editor == self.platform.bot_username() {
            return Ok(None);
        }
        let moderators = self.platform.moderators(subreddit).await?;
        let authorized = moderators
            .iter()
            .find(|m| m.name == editor)
            .map(|m| m.has_permission("config"))
            .unwrap_or(false);
        if authorized {
            Ok(None)
        } else {
            Ok(Some(format!(
                "Mod {editor} does not have permission to edit the config wiki in /r/{subreddit}"
            )))
        }
    }

    /// Message the last editor about an unparseable page. Failures to
    /// deliver are logged only — the ingest outcome is already decided.
    async fn reject_to_editor(&self, subreddit: &str, reason: &str) {
        let editor = self
            .platform
            .wiki_revision_author(subreddit, CONFIG_PAGE)
            .await
            .ok()
            .flatten();
        let Some(editor) = editor else {
            warn!(subreddit, "config invalid and no revision author to notify");
            return;
        };
        let subject = format!("Configuration Error in /r/{subreddit}");
        let body = format!(
            "The [configuration](https://www.reddit.com/r/{subreddit}/wiki/edit/{CONFIG_PAGE}) \
             for /r/{subreddit} is in an unsupported or invalid format.\n\n\
             -----\n\nError details: {reason}\n\n-----\n\n\
             The previously cached configuration stays active until the format is fixed.\n\n\
             You may wish to validate the page with a JSON or YAML linter first."
        );
        if let Err(err) = self
            .platform
            .send_message_to_user(&editor, &subject, &body)
            .await
        {
            warn!(subreddit, editor, %err, "could not deliver config error message");
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use flairmod_notify::NullNotifier;
    use flairmod_platform::MockPlatform;

    const VALID_JSON: &str = r#"[
        {"GeneralConfiguration": {"header": "Hi"}},
        {"templateId": "g1", "remove": true}
    ]"#;

    fn ingestor(mock: &MockPlatform, store: Arc<ConfigStore>) -> ConfigIngestor {
        ConfigIngestor::new(
            Arc::new(mock.clone()),
            store,
            Arc::new(NullNotifier),
            Arc::new(Config::default()),
        )
        .with_retry(RetryPolicy::immediate(2))
    }

    #[tokio::test]
    async fn blank_page_is_skipped() {
        let mock = MockPlatform::new("fh-bot");
        mock.set_wiki("pics", CONFIG_PAGE, "   ");
        let store = Arc::new(ConfigStore::in_memory().unwrap());
        let outcome = ingestor(&mock, Arc::clone(&store)).refresh("pics").await.unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped);
        assert!(store.get("pics").unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_page_is_skipped() {
        let mock = MockPlatform::new("fh-bot");
        let store = Arc::new(ConfigStore::in_memory().unwrap());
        let outcome = ingestor(&mock, store).refresh("pics").await.unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped);
    }

    #[tokio::test]
    async fn valid_json_is_cached_and_page_canonicalized() {
        let mock = MockPlatform::new("fh-bot");
        mock.set_wiki("pics", CONFIG_PAGE, VALID_JSON);
        mock.set_wiki_author("pics", CONFIG_PAGE, "m1");
        let store = Arc::new(ConfigStore::in_memory().unwrap());

        let outcome = ingestor(&mock, Arc::clone(&store)).refresh("pics").await.unwrap();
        assert_eq!(outcome, IngestOutcome::Updated);

        let cached = store.get("pics").unwrap().unwrap();
        assert_eq!(cached.general.header, "Hi");
        assert!(cached.find_rule("g1").unwrap().remove);

        // The page now carries the pretty canonical form.
        let page = mock.wiki_content("pics", CONFIG_PAGE).unwrap();
        assert_eq!(page, cached.pretty_json());
        // Community told about the reload.
        assert_eq!(mock.calls_matching("send_message_to_subreddit pics").len(), 1);
    }

    #[tokio::test]
    async fn reingest_of_same_content_is_unchanged() {
        let mock = MockPlatform::new("fh-bot");
        mock.set_wiki("pics", CONFIG_PAGE, VALID_JSON);
        mock.set_wiki_author("pics", CONFIG_PAGE, "m1");
        let store = Arc::new(ConfigStore::in_memory().unwrap());
        let ing = ingestor(&mock, Arc::clone(&store));

        assert_eq!(ing.refresh("pics").await.unwrap(), IngestOutcome::Updated);
        // Second pass sees the canonicalized page and the cached copy.
        assert_eq!(ing.refresh("pics").await.unwrap(), IngestOutcome::Unchanged);
        // No second rewrite happened.
        assert_eq!(mock.calls_matching("edit_wiki_page pics").len(), 1);
    }

    #[tokio::test]
    async fn broken_json_messages_editor_and_keeps_prior_config() {
        let mock = MockPlatform::new("fh-bot");
        mock.set_wiki("pics", CONFIG_PAGE, VALID_JSON);
        mock.set_wiki_author("pics", CONFIG_PAGE, "m1");
        let store = Arc::new(ConfigStore::in_memory().unwrap());
        let ing = ingestor(&mock, Arc::clone(&store));
        ing.refresh("pics").await.unwrap();

        mock.set_wiki("pics", CONFIG_PAGE, "[ this is not json");
        mock.set_wiki_author("pics", CONFIG_PAGE, "m2");
        let outcome = ing.refresh("pics").await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Rejected(_)));

        // Prior config still active.
        assert_eq!(store.get("pics").unwrap().unwrap().general.header, "Hi");
        // The editor got the error message.
        assert_eq!(mock.calls_matching("send_message_to_user m2").len(), 1);
    }

    #[tokio::test]
    async fn legacy_yaml_is_converted_and_rewritten() {
        let mock = MockPlatform::new("fh-bot");
        mock.set_wiki(
            "pics",
            CONFIG_PAGE,
            "header: Hello\nflairs:\n  g1: Rule one\nremove:\n  g1: true\n",
        );
        mock.set_wiki_author("pics", CONFIG_PAGE, "m1");
        let store = Arc::new(ConfigStore::in_memory().unwrap());

        let outcome = ingestor(&mock, Arc::clone(&store)).refresh("pics").await.unwrap();
        assert_eq!(outcome, IngestOutcome::Updated);

        let cached = store.get("pics").unwrap().unwrap();
        assert_eq!(cached.general.header, "Hello");
        assert!(cached.find_rule("g1").unwrap().remove);
        // The page was rewritten in the JSON form.
        assert!(mock.wiki_content("pics", CONFIG_PAGE).unwrap().trim_start().starts_with('['));
    }

    #[tokio::test]
    async fn gated_edit_by_unprivileged_mod_is_rejected() {
        let mock = MockPlatform::new("fh-bot");
        let gated = r#"[
            {"GeneralConfiguration": {"require_config_to_edit": true, "header": "v2"}},
            {"templateId": "g1", "remove": true}
        ]"#;
        mock.set_wiki("pics", CONFIG_PAGE, gated);
        mock.set_wiki_author("pics", CONFIG_PAGE, "m2");
        mock.add_moderator("pics", "m2", &["posts"]);
        let store = Arc::new(ConfigStore::in_memory().unwrap());

        let outcome = ingestor(&mock, Arc::clone(&store)).refresh("pics").await.unwrap();
        match outcome {
            IngestOutcome::Rejected(reason) => {
                assert!(reason.contains("m2"));
                assert!(reason.contains("pics"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(store.get("pics").unwrap().is_none());
    }

    #[tokio::test]
    async fn gated_edit_by_config_mod_is_accepted() {
        let mock = MockPlatform::new("fh-bot");
        let gated = r#"[
            {"GeneralConfiguration": {"require_config_to_edit": true}},
            {"templateId": "g1", "remove": true}
        ]"#;
        mock.set_wiki("pics", CONFIG_PAGE, gated);
        mock.set_wiki_author("pics", CONFIG_PAGE, "m1");
        mock.add_moderator("pics", "m1", &["config"]);
        let store = Arc::new(ConfigStore::in_memory().unwrap());
        let outcome = ingestor(&mock, Arc::clone(&store)).refresh("pics").await.unwrap();
        assert_eq!(outcome, IngestOutcome::Updated);
        assert!(store.get("pics").unwrap().is_some());
    }

    #[tokio::test]
    async fn gated_edit_by_bot_itself_is_accepted() {
        let mock = MockPlatform::new("fh-bot");
        let gated = r#"[
            {"GeneralConfiguration": {"require_config_to_edit": true}},
            {"templateId": "g1", "remove": true}
        ]"#;
        mock.set_wiki("pics", CONFIG_PAGE, gated);
        mock.set_wiki_author("pics", CONFIG_PAGE, "fh-bot");
        let store = Arc::new(ConfigStore::in_memory().unwrap());
        let outcome = ingestor(&mock, Arc::clone(&store)).refresh("pics").await.unwrap();
        assert_eq!(outcome, IngestOutcome::Updated);
    }

    #[tokio::test]
    async fn sweep_covers_all_moderated_communities() {
        let mock = MockPlatform::new("fh-bot");
        mock.moderate("pics");
        mock.moderate("funny");
        mock.moderate("u_fh-bot");
        mock.set_wiki("pics", CONFIG_PAGE, VALID_JSON);
        mock.set_wiki("funny", CONFIG_PAGE, VALID_JSON);
        mock.set_wiki_author("pics", CONFIG_PAGE, "m1");
        mock.set_wiki_author("funny", CONFIG_PAGE, "m1");
        let store = Arc::new(ConfigStore::in_memory().unwrap());

        ingestor(&mock, Arc::clone(&store)).sweep_all().await.unwrap();
        assert_eq!(
            store.list_communities().unwrap(),
            vec!["funny".to_string(), "pics".to_string()]
        );
    }
}
