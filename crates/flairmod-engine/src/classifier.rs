// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Mod-log classifier: turns flair assignments into queued action rows.
//!
//! Consumes the unified mod-log stream for every moderated community. Config
//! page revisions re-trigger ingestion; submission flair edits expand
//! through the community's active config into action rows. Everything else
//! is ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use flairmod_config::Config;
use flairmod_notify::Notifier;
use flairmod_platform::{ModLogEntry, Platform};
use flairmod_rules::actions_for_rule;
use flairmod_store::{ActionStore, ConfigStore};

use crate::ingest::ConfigIngestor;

pub struct EventClassifier {
    platform: Arc<dyn Platform>,
    config_store: Arc<ConfigStore>,
    action_store: Arc<ActionStore>,
    ingestor: Arc<ConfigIngestor>,
    notifier: Arc<dyn Notifier>,
    config: Arc<Config>,
    /// Advisory dedupe window: `(submission, flair) → last enqueue`.
    /// In-memory only; a restart simply allows one extra enqueue, which the
    /// idempotent processor absorbs.
    dedupe: Mutex<HashMap<(String, String), Instant>>,
}

impl EventClassifier {
    pub fn new(
        platform: Arc<dyn Platform>,
        config_store: Arc<ConfigStore>,
        action_store: Arc<ActionStore>,
        ingestor: Arc<ConfigIngestor>,
        notifier: Arc<dyn Notifier>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            platform,
            config_store,
            action_store,
            ingestor,
            notifier,
            config,
            dedupe: Mutex::new(HashMap::new()),
        }
    }

    /// Announce startup, then consume the mod-log stream until it ends.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut communities = self
            .platform
            .moderated_subreddits()
            .await
            .context("listing moderated communities")?;
        communities.sort_by_key(|s| s.to_lowercase());
        info!(count = communities.len(), "mod-log watcher starting");
        self.notifier
            .status(&format!(
                "Mod-log watcher started as {}.\nModerating:\n   {}",
                self.platform.bot_username(),
                communities.join("\n   ")
            ))
            .await;

        let mut stream = self
            .platform
            .mod_log_stream()
            .await
            .context("opening mod log stream")?;
        while let Some(entry) = stream.next().await {
            let entry = entry.context("reading mod log stream")?;
            self.handle_entry(&entry).await;
        }
        // The supervisor restarts us; an ended stream is not an error.
        info!("mod log stream ended");
        Ok(())
    }

    /// Classify one entry. Failures are contained per entry — one bad event
    /// must not stall the stream.
    pub async fn handle_entry(&self, entry: &ModLogEntry) {
        match entry.action.as_str() {
            "wikirevise" => {
                let touched_config = entry
                    .details
                    .as_deref()
                    .map(|d| d.contains(crate::ingest::CONFIG_PAGE))
                    .unwrap_or(false);
                if touched_config {
                    info!(
                        subreddit = entry.subreddit,
                        mod_name = entry.mod_name,
                        "config page revised, reloading"
                    );
                    if let Err(err) = self.ingestor.refresh(&entry.subreddit).await {
                        warn!(subreddit = entry.subreddit, %err, "config reload failed");
                    }
                }
            }
            "editflair" => {
                if self.config.ignore_mods.iter().any(|m| *m == entry.mod_name) {
                    debug!(mod_name = entry.mod_name, "ignored moderator, skipping");
                    return;
                }
                let Some(submission_id) = entry.submission_id() else {
                    return;
                };
                if let Err(err) = self.classify_flair_edit(entry, submission_id).await {
                    warn!(
                        subreddit = entry.subreddit,
                        submission_id, %err,
                        "failed to classify flair assignment"
                    );
                }
            }
            _ => {}
        }
    }

    async fn classify_flair_edit(
        &self,
        entry: &ModLogEntry,
        submission_id: &str,
    ) -> anyhow::Result<()> {
        // a. No active config, nothing to do.
        let Some(config) = self.config_store.get(&entry.subreddit)? else {
            debug!(subreddit = entry.subreddit, "no cached config, dropping");
            return Ok(());
        };

        // b. Resolve the currently assigned flair.
        let submission = self.platform.submission(submission_id).await?;
        let Some(flair_guid) = submission.link_flair_template_id.clone() else {
            debug!(submission_id, "no flair template on submission, dropping");
            return Ok(());
        };

        // c. Dedupe window, half-open [t, t+Δ).
        let window = Duration::from_secs(config.general.ignore_same_flair_seconds);
        let key = (submission_id.to_string(), flair_guid.clone());
        {
            let mut dedupe = self.dedupe.lock().await;
            if let Some(last) = dedupe.get(&key) {
                if last.elapsed() < window {
                    debug!(
                        submission_id,
                        flair_guid, "repeat assignment within dedupe window, skipping"
                    );
                    return Ok(());
                }
            }
            dedupe.insert(key, Instant::now());
        }

        // d. Match a rule.
        let Some(rule) = config.find_rule(&flair_guid) else {
            debug!(flair_guid, "no rule for flair, dropping");
            return Ok(());
        };
        if !rule.notes.is_empty() {
            debug!(flair_guid, notes = rule.notes.as_str(), "rule matched");
        }

        // e/f. Expand to action rows and persist.
        let actions = actions_for_rule(rule);
        if actions.is_empty() {
            debug!(flair_guid, "rule enables no actions");
            return Ok(());
        }
        self.action_store
            .insert_batch(submission_id, &actions, &entry.mod_name, &flair_guid)?;
        info!(
            subreddit = entry.subreddit,
            submission_id,
            flair_guid,
            mod_name = entry.mod_name,
            count = actions.len(),
            "actions enqueued"
        );
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
