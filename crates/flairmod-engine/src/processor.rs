// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Action processor: drains the durable queue and drives every action row of
//! a job to completion.
//!
//! Each scheduling pass picks up the pending jobs, skips the ones still
//! inside their retry delay, and processes up to `max_concurrency`
//! submissions in parallel. Within one submission the steps run in a fixed
//! order, each gated on its completion row, so a crash mid-job resumes
//! exactly where it stopped. Failures roll into a per-job attempt counter;
//! a job that keeps failing is reported to the operator and force-completed
//! so the queue never wedges.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use flairmod_config::ProcessorConfig;
use flairmod_notify::{build_post_embed, post_flair_webhook, FailureEvent, Notifier};
use flairmod_platform::{Platform, PlatformError, RemovalCommentKind, Submission};
use flairmod_rules::{
    next_escalation_step, truncate_chars, ActionKind, BanDuration, BanStep, FlairRule,
    GeneralConfiguration, PlaceholderMap,
};
use flairmod_store::{ActionStore, ConfigStore, PendingJob};
use flairmod_toolbox::{ToolboxNotes, BAN_HISTORY_PREFIX};

/// Fallback notes category for escalating-ban history entries.
const BAN_NOTE_CATEGORY: &str = "flair_helper_note";

struct RetryState {
    attempts: u32,
    last_attempt: Instant,
}

pub struct ActionProcessor {
    platform: Arc<dyn Platform>,
    config_store: Arc<ConfigStore>,
    action_store: Arc<ActionStore>,
    notifier: Arc<dyn Notifier>,
    toolbox: Arc<ToolboxNotes>,
    settings: ProcessorConfig,
    semaphore: Arc<Semaphore>,
    trackers: Mutex<HashMap<String, RetryState>>,
}

/// Everything one submission pass needs, resolved once up front.
struct JobContext {
    job: PendingJob,
    submission: Submission,
    general: GeneralConfiguration,
    rule: FlairRule,
    placeholders: PlaceholderMap,
    /// Author exists and is not suspended; author-scoped actions run only
    /// when set.
    author_ok: bool,
    /// Current user flair of the author, for the webhook embed.
    user_flair_text: String,
}

impl JobContext {
    fn id(&self) -> &str {
        &self.job.submission_id
    }

    fn author(&self) -> &str {
        self.submission.author.as_deref().unwrap_or("[deleted]")
    }

    /// The formatted removal reason: expanded body, wrapped in the expanded
    /// community header/footer unless the rule opts out, joined with blank
    /// lines unless the community disables them.
    fn removal_message(&self) -> String {
        let body = self.placeholders.expand(&self.rule.comment.body);
        if !self.rule.comment.header_footer {
            return body;
        }
        let separator = if self.general.skip_add_newlines { "" } else { "\n\n" };
        [
            self.placeholders.expand(&self.general.header),
            body,
            self.placeholders.expand(&self.general.footer),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(separator)
    }
}

impl ActionProcessor {
    pub fn new(
        platform: Arc<dyn Platform>,
        config_store: Arc<ConfigStore>,
        action_store: Arc<ActionStore>,
        notifier: Arc<dyn Notifier>,
        toolbox: Arc<ToolboxNotes>,
        settings: ProcessorConfig,
    ) -> Self {
        let permits = settings.max_concurrency.max(1);
        Self {
            platform,
            config_store,
            action_store,
            notifier,
            toolbox,
            settings,
            semaphore: Arc::new(Semaphore::new(permits)),
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// Poll the queue forever.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("action processor starting");
        loop {
            self.poll_once().await?;
            tokio::time::sleep(Duration::from_secs(self.settings.poll_interval_secs)).await;
        }
    }

    /// One scheduling pass over the pending jobs. Public so tests can drive
    /// the processor deterministically.
    pub async fn poll_once(&self) -> anyhow::Result<()> {
        let jobs = self.action_store.pending_jobs().context("listing pending jobs")?;

        let mut seen = HashSet::new();
        let mut runnable = Vec::new();
        for job in jobs {
            if !seen.insert(job.submission_id.clone()) {
                continue;
            }
            if self.action_store.job_done(&job.submission_id)? {
                self.action_store.gc_completed(&job.submission_id)?;
                continue;
            }
            if self.in_retry_delay(&job.submission_id).await {
                continue;
            }
            runnable.push(job);
        }

        let mut tasks = FuturesUnordered::new();
        for job in runnable {
            let semaphore = Arc::clone(&self.semaphore);
            tasks.push(async move {
                let _permit = semaphore.acquire().await.expect("processor semaphore");
                let result = self.process_submission(&job).await;
                (job, result)
            });
        }
        while let Some((job, result)) = tasks.next().await {
            match result {
                Ok(()) => {
                    self.trackers.lock().await.remove(&job.submission_id);
                    if self.action_store.job_done(&job.submission_id)? {
                        self.action_store.gc_completed(&job.submission_id)?;
                        debug!(submission_id = job.submission_id, "job completed and collected");
                    }
                }
                Err(err) => self.note_failure(&job, err).await?,
            }
        }
        Ok(())
    }

    async fn in_retry_delay(&self, submission_id: &str) -> bool {
        let trackers = self.trackers.lock().await;
        trackers
            .get(submission_id)
            .map(|state| {
                state.last_attempt.elapsed()
                    < Duration::from_secs(self.settings.retry_delay_secs)
            })
            .unwrap_or(false)
    }

    /// Record a failed pass; escalate and force-complete once the attempt
    /// budget is spent.
    async fn note_failure(&self, job: &PendingJob, err: anyhow::Error) -> anyhow::Result<()> {
        let attempts = {
            let mut trackers = self.trackers.lock().await;
            let state = trackers.entry(job.submission_id.clone()).or_insert(RetryState {
                attempts: 0,
                last_attempt: Instant::now(),
            });
            state.attempts += 1;
            state.last_attempt = Instant::now();
            state.attempts
        };
        warn!(
            submission_id = job.submission_id,
            attempts,
            max = self.settings.max_processing_retries,
            error = %err,
            "processing pass failed"
        );

        if attempts < self.settings.max_processing_retries {
            return Ok(());
        }

        let pending = self
            .action_store
            .pending_actions(&job.submission_id)?
            .iter()
            .map(|kind| kind.as_str().to_string())
            .collect();
        let subreddit = self
            .platform
            .submission(&job.submission_id)
            .await
            .map(|s| s.subreddit)
            .unwrap_or_default();
        self.notifier
            .failure(&FailureEvent {
                submission_id: job.submission_id.clone(),
                subreddit,
                error: format!("{err:#}"),
                pending,
            })
            .await;
        // Unblock the queue: whatever could not be done will not be done.
        self.action_store.mark_all_completed(&job.submission_id)?;
        self.action_store.gc_completed(&job.submission_id)?;
        self.trackers.lock().await.remove(&job.submission_id);
        Ok(())
    }

    async fn process_submission(&self, job: &PendingJob) -> anyhow::Result<()> {
        let submission_id = &job.submission_id;

        // 1. Load current state. A vanished or unreadable target completes
        //    the whole job as a no-op.
        let submission = match self.platform.submission(submission_id).await {
            Ok(submission) => submission,
            Err(PlatformError::NotFound) | Err(PlatformError::Forbidden) => {
                info!(submission_id, "target gone, completing job as no-op");
                self.action_store.mark_all_completed(submission_id)?;
                self.action_store.gc_completed(submission_id)?;
                return Ok(());
            }
            Err(err) => return Err(err).context("loading submission"),
        };

        // 2. Reload the live config; a swap may have happened since enqueue.
        let Some(config) = self.config_store.get(&submission.subreddit)? else {
            warn!(
                submission_id,
                subreddit = submission.subreddit,
                "community no longer configured, completing job as no-op"
            );
            self.action_store.mark_all_completed(submission_id)?;
            self.action_store.gc_completed(submission_id)?;
            return Ok(());
        };
        let Some(rule) = config.find_rule(&job.flair_guid).cloned() else {
            warn!(
                submission_id,
                flair_guid = job.flair_guid,
                "rule vanished after config swap, completing job as no-op"
            );
            self.action_store.mark_all_completed(submission_id)?;
            self.action_store.gc_completed(submission_id)?;
            return Ok(());
        };

        let author_ok = submission.author.is_some() && !submission.author_is_suspended;

        // Current author flair, shown in the webhook embed.
        let user_flair_text = if author_ok {
            self.platform
                .user_flair(&submission.subreddit, submission.author.as_deref().unwrap_or(""))
                .await
                .ok()
                .flatten()
                .map(|f| f.text)
                .unwrap_or_default()
        } else {
            String::new()
        };

        // 3. Expand placeholders once per pass.
        let placeholders =
            build_placeholders(&submission, &job.mod_name, &config.general, Utc::now());

        let ctx = JobContext {
            job: job.clone(),
            submission,
            general: config.general.clone(),
            rule,
            placeholders,
            author_ok,
            user_flair_text,
        };

        // 4. The step sequence. Order matters: visible moderation first,
        //    then author-scoped consequences, then the comment sweep.
        self.step_approve(&ctx).await?;
        self.step_remove(&ctx).await?;
        self.step_modlog_reason(&ctx).await?;
        self.step_lock(&ctx).await?;
        self.step_spoiler(&ctx).await?;
        self.step_clear_post_flair(&ctx).await?;
        self.step_send_to_webhook(&ctx).await?;

        if ctx.author_ok {
            self.step_comment(&ctx).await?;
            self.step_ban(&ctx).await?;
            self.step_unban(&ctx).await?;
            self.step_user_flair(&ctx).await?;
            self.step_usernote(&ctx).await?;
            self.step_contributor(&ctx).await?;
            self.step_nuke(&ctx).await?;
        } else {
            // Author deleted or suspended: nothing author-scoped can run.
            for kind in [
                ActionKind::Comment,
                ActionKind::Ban,
                ActionKind::Unban,
                ActionKind::UserFlair,
                ActionKind::Usernote,
                ActionKind::Contributor,
                ActionKind::Nuke,
            ] {
                self.action_store.mark_completed(ctx.id(), kind)?;
            }
        }

        self.step_nuke_user_comments(&ctx).await?;

        // Rows enqueued under a prior rule revision that the live rule no
        // longer enables can never execute; complete them so the job can
        // collect instead of wedging the queue.
        for kind in self.action_store.pending_actions(ctx.id())? {
            if !rule_enables(&ctx.rule, kind) {
                debug!(submission_id = ctx.id(), kind = kind.as_str(), "orphaned row, completing");
                self.action_store.mark_completed(ctx.id(), kind)?;
            }
        }

        // 5. Collect if everything landed.
        if self.action_store.job_done(ctx.id())? {
            self.action_store.gc_completed(ctx.id())?;
        }
        Ok(())
    }

    fn pending(&self, ctx: &JobContext, kind: ActionKind) -> anyhow::Result<bool> {
        Ok(!self.action_store.is_completed(ctx.id(), kind)?)
    }

    fn mark(&self, ctx: &JobContext, kind: ActionKind) -> anyhow::Result<()> {
        self.action_store.mark_completed(ctx.id(), kind)?;
        Ok(())
    }

    // ── Submission-scoped steps ──────────────────────────────────────────────

    /// Approve is a tight group: approve + unlock + unspoiler, each only
    /// when the current state requires it.
    async fn step_approve(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.approve || !self.pending(ctx, ActionKind::Approve)? {
            return Ok(());
        }
        debug!(submission_id = ctx.id(), "approve");
        if ctx.submission.removed {
            self.platform.approve_submission(ctx.id()).await?;
        }
        if ctx.submission.locked {
            self.platform.unlock_submission(ctx.id()).await?;
        }
        if ctx.submission.spoiler {
            self.platform.unspoiler_submission(ctx.id()).await?;
        }
        self.mark(ctx, ActionKind::Approve)
    }

    async fn step_remove(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.remove || !self.pending(ctx, ActionKind::Remove)? {
            return Ok(());
        }
        if ctx.submission.removed {
            debug!(submission_id = ctx.id(), "already removed");
            self.mark(ctx, ActionKind::Remove)?;
            return self.mark(ctx, ActionKind::ModlogReason);
        }
        // The removal mod-note: the rule's mod-log reason, falling back to
        // the usernote text.
        let mod_note = if !ctx.rule.modlog_reason.is_empty() {
            truncate_chars(&ctx.rule.modlog_reason, 100)
        } else if ctx.rule.usernote.enabled {
            truncate_chars(&ctx.rule.usernote.note, 100)
        } else {
            String::new()
        };
        debug!(submission_id = ctx.id(), "remove");
        self.platform
            .remove_submission(ctx.id(), false, &mod_note)
            .await?;
        self.mark(ctx, ActionKind::Remove)?;
        // The removal call carried the reason; a separate note is redundant.
        self.mark(ctx, ActionKind::ModlogReason)
    }

    /// Standalone mod-log note, only when `remove` is not part of the rule.
    async fn step_modlog_reason(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if ctx.rule.remove
            || ctx.rule.modlog_reason.trim().is_empty()
            || !self.pending(ctx, ActionKind::ModlogReason)?
        {
            return Ok(());
        }
        debug!(submission_id = ctx.id(), "modlog note");
        self.platform
            .create_mod_note(ctx.id(), &truncate_chars(&ctx.rule.modlog_reason, 250))
            .await?;
        self.mark(ctx, ActionKind::ModlogReason)
    }

    async fn step_lock(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.lock || !self.pending(ctx, ActionKind::Lock)? {
            return Ok(());
        }
        if !ctx.submission.locked {
            debug!(submission_id = ctx.id(), "lock");
            self.platform.lock_submission(ctx.id()).await?;
        }
        self.mark(ctx, ActionKind::Lock)
    }

    async fn step_spoiler(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.spoiler || !self.pending(ctx, ActionKind::Spoiler)? {
            return Ok(());
        }
        if !ctx.submission.spoiler {
            debug!(submission_id = ctx.id(), "spoiler");
            self.platform.spoiler_submission(ctx.id()).await?;
        }
        self.mark(ctx, ActionKind::Spoiler)
    }

    async fn step_clear_post_flair(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.clear_post_flair || !self.pending(ctx, ActionKind::ClearPostFlair)? {
            return Ok(());
        }
        debug!(submission_id = ctx.id(), "clear post flair");
        self.platform.set_post_flair(ctx.id(), "", "").await?;
        self.mark(ctx, ActionKind::ClearPostFlair)
    }

    async fn step_send_to_webhook(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.send_to_webhook || !self.pending(ctx, ActionKind::SendToWebhook)? {
            return Ok(());
        }
        if ctx.general.webhook.is_empty() {
            debug!(submission_id = ctx.id(), "no webhook configured, skipping");
        } else {
            let payload = build_post_embed(
                &ctx.general,
                &ctx.submission,
                &ctx.user_flair_text,
                &ctx.job.mod_name,
            );
            post_flair_webhook(&ctx.general.webhook, &payload).await;
        }
        self.mark(ctx, ActionKind::SendToWebhook)
    }

    // ── Author-scoped steps ──────────────────────────────────────────────────

    async fn step_comment(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.comment.enabled || !self.pending(ctx, ActionKind::Comment)? {
            return Ok(());
        }
        let created = DateTime::from_timestamp(ctx.submission.created_utc, 0)
            .unwrap_or_else(|| DateTime::UNIX_EPOCH);
        let age_days = (Utc::now() - created).num_days();
        if age_days > ctx.general.max_age_for_comment {
            debug!(submission_id = ctx.id(), age_days, "post too old to comment on");
            return self.mark(ctx, ActionKind::Comment);
        }
        if ctx.placeholders.expand(&ctx.rule.comment.body).trim().is_empty() {
            debug!(submission_id = ctx.id(), "blank comment body, skipping");
            return self.mark(ctx, ActionKind::Comment);
        }

        let message = ctx.removal_message();
        if ctx.rule.remove {
            // Removal + comment: deliver as the platform's removal message.
            let kind = RemovalCommentKind::parse(&ctx.general.removal_comment_type);
            debug!(submission_id = ctx.id(), kind = kind.as_str(), "removal message");
            self.platform
                .send_removal_message(ctx.id(), &message, kind)
                .await?;
        } else {
            debug!(submission_id = ctx.id(), "reply comment");
            let comment_id = self.platform.reply_to_submission(ctx.id(), &message).await?;
            if ctx.rule.comment.sticky_comment {
                self.platform.distinguish_comment(&comment_id, true).await?;
            } else if ctx.rule.comment.distinguish {
                self.platform.distinguish_comment(&comment_id, false).await?;
            }
            if ctx.rule.comment.lock_comment {
                self.platform.lock_comment(&comment_id).await?;
            }
        }
        self.mark(ctx, ActionKind::Comment)
    }

    async fn step_ban(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.ban.enabled || !self.pending(ctx, ActionKind::Ban)? {
            return Ok(());
        }
        let subreddit = &ctx.submission.subreddit;
        let author = ctx.author();

        let step = match &ctx.rule.ban.duration {
            BanDuration::Permanent => Some(BanStep::Permanent),
            BanDuration::Days(days) => Some(BanStep::Days(*days)),
            BanDuration::Escalating(steps) => {
                let history = self
                    .toolbox
                    .read_ban_history(subreddit, author)
                    .await
                    .context("reading ban history")?;
                next_escalation_step(&history, steps)
            }
            BanDuration::Invalid(_) => None,
        };

        let Some(step) = step else {
            // Misconfigured duration: tell the community, skip the ban.
            warn!(
                submission_id = ctx.id(),
                flair_guid = ctx.rule.template_id,
                "invalid ban duration, skipping ban"
            );
            let body = format!(
                "The ban for [this submission](https://redd.it/{id}) in /r/{subreddit} was \
                 not applied to /u/{author} because the configured ban duration for flair \
                 {flair} is invalid.\n\nPlease review your \
                 [configuration](https://www.reddit.com/r/{subreddit}/wiki/edit/{page}); you \
                 may want to ban the user manually.",
                id = ctx.id(),
                flair = ctx.rule.template_id,
                page = crate::ingest::CONFIG_PAGE,
            );
            if let Err(err) = self
                .platform
                .send_message_to_subreddit(subreddit, "Invalid Configuration", &body)
                .await
            {
                warn!(subreddit, %err, "invalid-duration notification failed");
            }
            return self.mark(ctx, ActionKind::Ban);
        };

        // Ban placeholders resolve only after the duration is chosen.
        let mut placeholders = ctx.placeholders.clone();
        placeholders.insert("ban_duration", step.human());
        placeholders.insert("ban_duration_number", step.to_string());
        let message = placeholders.expand(&ctx.rule.ban.message);
        let mod_note = truncate_chars(&placeholders.expand(&ctx.rule.ban.mod_note), 100);
        let duration_days = match step {
            BanStep::Days(days) => Some(days),
            BanStep::Permanent => None,
        };
        info!(submission_id = ctx.id(), subreddit, author, ?duration_days, "ban");
        self.platform
            .ban_user(subreddit, author, &message, &mod_note, duration_days)
            .await?;

        if matches!(ctx.rule.ban.duration, BanDuration::Escalating(_)) {
            // Record the rung so the next escalation reads past this ban.
            let category = if ctx.general.usernote_type_name.is_empty() {
                BAN_NOTE_CATEGORY
            } else {
                ctx.general.usernote_type_name.as_str()
            };
            self.toolbox
                .append(
                    subreddit,
                    author,
                    &format!("{BAN_HISTORY_PREFIX}{}", step.note_suffix()),
                    ctx.id(),
                    &ctx.job.mod_name,
                    Some(category),
                )
                .await
                .context("recording ban history note")?;
        }
        self.mark(ctx, ActionKind::Ban)
    }

    async fn step_unban(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.unban || !self.pending(ctx, ActionKind::Unban)? {
            return Ok(());
        }
        debug!(submission_id = ctx.id(), "unban");
        self.platform
            .unban_user(&ctx.submission.subreddit, ctx.author())
            .await?;
        self.mark(ctx, ActionKind::Unban)
    }

    async fn step_user_flair(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.user_flair.enabled || !self.pending(ctx, ActionKind::UserFlair)? {
            return Ok(());
        }
        let subreddit = &ctx.submission.subreddit;
        let author = ctx.author();
        let flair = &ctx.rule.user_flair;
        if !flair.template_id.is_empty() {
            // Template id wins over text/css.
            debug!(submission_id = ctx.id(), template = flair.template_id, "user flair");
            self.platform
                .set_user_flair_template(subreddit, author, &flair.template_id)
                .await?;
        } else if !flair.text.is_empty() || !flair.css_class.is_empty() {
            let text = ctx.placeholders.expand(&flair.text);
            let css_class = ctx.placeholders.expand(&flair.css_class);
            debug!(submission_id = ctx.id(), text, css_class, "user flair");
            self.platform
                .set_user_flair(subreddit, author, &text, &css_class)
                .await?;
        } else {
            debug!(submission_id = ctx.id(), "user flair rule has nothing to set");
        }
        self.mark(ctx, ActionKind::UserFlair)
    }

    async fn step_usernote(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.usernote.enabled || !self.pending(ctx, ActionKind::Usernote)? {
            return Ok(());
        }
        if ctx.rule.usernote.note.trim().is_empty() {
            debug!(submission_id = ctx.id(), "blank usernote, skipping");
            return self.mark(ctx, ActionKind::Usernote);
        }
        let note = ctx.placeholders.expand(&ctx.rule.usernote.note);
        let category = (!ctx.general.usernote_type_name.is_empty())
            .then_some(ctx.general.usernote_type_name.as_str());
        debug!(submission_id = ctx.id(), "usernote");
        self.toolbox
            .append(
                &ctx.submission.subreddit,
                ctx.author(),
                &note,
                ctx.id(),
                &ctx.job.mod_name,
                category,
            )
            .await
            .context("appending usernote")?;
        self.mark(ctx, ActionKind::Usernote)
    }

    async fn step_contributor(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.contributor.enabled || !self.pending(ctx, ActionKind::Contributor)? {
            return Ok(());
        }
        let subreddit = &ctx.submission.subreddit;
        let author = ctx.author();
        match ctx.rule.contributor.action {
            flairmod_rules::ContributorAction::Add => {
                debug!(submission_id = ctx.id(), "add contributor");
                self.platform.add_contributor(subreddit, author).await?;
            }
            flairmod_rules::ContributorAction::Remove => {
                debug!(submission_id = ctx.id(), "remove contributor");
                self.platform.remove_contributor(subreddit, author).await?;
            }
        }
        self.mark(ctx, ActionKind::Contributor)
    }

    /// Cross-community sweep over the author. Heavyweight by design; a
    /// failure against one target community is logged and the sweep
    /// continues, so one banned-from community cannot wedge the rest.
    async fn step_nuke(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.nuke.enabled || !self.pending(ctx, ActionKind::Nuke)? {
            return Ok(());
        }
        let nuke = &ctx.rule.nuke;
        let author = ctx.author();
        info!(
            submission_id = ctx.id(),
            author,
            targets = nuke.target_subreddits.len(),
            "nuke sweep"
        );

        for target in &nuke.target_subreddits {
            if nuke.ban_from_all_listed {
                if let Err(err) = self
                    .platform
                    .ban_user(target, author, "", "Nuke action performed", None)
                    .await
                {
                    warn!(community = %target, author, %err, "nuke ban failed");
                }
            }
            if nuke.remove_all_comments {
                match self.platform.user_comments(author).await {
                    Ok(comments) => {
                        for comment in comments
                            .iter()
                            .filter(|c| c.subreddit == *target && !c.removed)
                        {
                            if let Err(err) = self.platform.remove_comment(&comment.id).await {
                                warn!(community = %target, comment_id = %comment.id, %err, "nuke comment removal failed");
                            }
                        }
                    }
                    Err(err) => warn!(community = %target, %err, "listing author comments failed"),
                }
            }
            if nuke.remove_all_submissions {
                match self.platform.user_submissions(author).await {
                    Ok(submissions) => {
                        for submission in submissions
                            .iter()
                            .filter(|s| s.subreddit == *target && !s.removed)
                        {
                            let id = &submission.id;
                            if let Err(err) = self.platform.remove_user_submission(id).await {
                                warn!(community = %target, submission_id = id.as_str(), %err, "nuke submission removal failed");
                                continue;
                            }
                            if let Err(err) = self.platform.lock_submission(id).await {
                                warn!(community = %target, submission_id = id.as_str(), %err, "nuke lock failed");
                            }
                            if let Err(err) = self.platform.spoiler_submission(id).await {
                                warn!(community = %target, submission_id = id.as_str(), %err, "nuke spoiler failed");
                            }
                        }
                    }
                    Err(err) => warn!(community = %target, %err, "listing author submissions failed"),
                }
            }
        }
        self.mark(ctx, ActionKind::Nuke)
    }

    /// Remove every non-moderator comment under the submission.
    async fn step_nuke_user_comments(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if !ctx.rule.nuke_user_comments || !self.pending(ctx, ActionKind::NukeUserComments)? {
            return Ok(());
        }
        let comments = self.platform.submission_comments(ctx.id()).await?;
        debug!(submission_id = ctx.id(), count = comments.len(), "nuking comments");
        for comment in comments {
            if comment.removed || comment.distinguished.as_deref() == Some("moderator") {
                continue;
            }
            self.platform.remove_comment(&comment.id).await?;
        }
        self.mark(ctx, ActionKind::NukeUserComments)
    }
}

/// Whether the (live) rule still calls for an action of this kind.
fn rule_enables(rule: &FlairRule, kind: ActionKind) -> bool {
    match kind {
        ActionKind::Approve => rule.approve,
        ActionKind::Remove => rule.remove,
        ActionKind::ModlogReason => !rule.modlog_reason.trim().is_empty(),
        ActionKind::Lock => rule.lock,
        ActionKind::Spoiler => rule.spoiler,
        ActionKind::ClearPostFlair => rule.clear_post_flair,
        ActionKind::SendToWebhook => rule.send_to_webhook,
        ActionKind::Comment => rule.comment.enabled,
        ActionKind::Ban => rule.ban.enabled,
        ActionKind::Unban => rule.unban,
        ActionKind::UserFlair => rule.user_flair.enabled,
        ActionKind::Usernote => rule.usernote.enabled,
        ActionKind::Contributor => rule.contributor.enabled,
        ActionKind::Nuke => rule.nuke.enabled,
        ActionKind::NukeUserComments => rule.nuke_user_comments,
    }
}

/// Resolve the full placeholder map for one processing pass.
fn build_placeholders(
    submission: &Submission,
    mod_name: &str,
    general: &GeneralConfiguration,
    now: DateTime<Utc>,
) -> PlaceholderMap {
    let mut map = PlaceholderMap::new();
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    map.insert("author", submission.author.as_deref().unwrap_or("[deleted]"));
    map.insert("subreddit", submission.subreddit.as_str());
    map.insert("body", submission.selftext.as_str());
    map.insert("title", submission.title.as_str());
    map.insert("id", submission.id.as_str());
    map.insert("permalink", submission.permalink.as_str());
    // Historical quirk kept on purpose: `url` is the permalink, the link
    // target lives under `link`.
    map.insert("url", submission.permalink.as_str());
    map.insert("link", submission.url.as_str());
    map.insert("domain", submission.domain.as_str());
    map.insert("kind", "submission");
    map.insert("mod", mod_name);
    map.insert("author_id", opt(&submission.author_id));
    map.insert("subreddit_id", submission.subreddit_id.as_str());
    map.insert("author_flair_text", opt(&submission.author_flair_text));
    map.insert(
        "author_flair_css_class",
        opt(&submission.author_flair_css_class),
    );
    map.insert(
        "author_flair_template_id",
        opt(&submission.author_flair_template_id),
    );
    map.insert("link_flair_text", opt(&submission.link_flair_text));
    map.insert("link_flair_css_class", opt(&submission.link_flair_css_class));
    map.insert(
        "link_flair_template_id",
        opt(&submission.link_flair_template_id),
    );

    let created = DateTime::from_timestamp(submission.created_utc, 0)
        .unwrap_or_else(|| DateTime::UNIX_EPOCH);
    map.insert_times(now, created, general.utc_offset, &general.custom_time_format);
    map
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn placeholders_cover_post_context() {
        let submission = Submission {
            id: "p1".into(),
            title: "Hello".into(),
            author: Some("alice".into()),
            permalink: "/r/pics/comments/p1/".into(),
            url: "https://example.com/cat.png".into(),
            subreddit: "pics".into(),
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let map = build_placeholders(&submission, "m1", &GeneralConfiguration::default(), now);
        assert_eq!(map.get("author"), Some("alice"));
        assert_eq!(map.get("mod"), Some("m1"));
        assert_eq!(map.get("kind"), Some("submission"));
        assert_eq!(map.get("url"), Some("/r/pics/comments/p1/"));
        assert_eq!(map.get("link"), Some("https://example.com/cat.png"));
    }

    #[test]
    fn deleted_author_renders_as_placeholder_value() {
        let submission = Submission {
            id: "p1".into(),
            ..Default::default()
        };
        let now = Utc::now();
        let map = build_placeholders(&submission, "m1", &GeneralConfiguration::default(), now);
        assert_eq!(map.get("author"), Some("[deleted]"));
    }

    #[test]
    fn removal_message_joins_with_blank_lines() {
        let ctx = JobContext {
            job: PendingJob {
                submission_id: "p1".into(),
                mod_name: "m1".into(),
                flair_guid: "g1".into(),
            },
            submission: Submission::default(),
            general: GeneralConfiguration {
                header: "Hi u/{{author}}".into(),
                footer: "see rules".into(),
                ..Default::default()
            },
            rule: FlairRule {
                template_id: "g1".into(),
                comment: flairmod_rules::CommentRule {
                    enabled: true,
                    body: "Rule: no X".into(),
                    ..Default::default()
                },
                ..Default::default()
            },
            placeholders: {
                let mut m = PlaceholderMap::new();
                m.insert("author", "alice");
                m
            },
            author_ok: true,
            user_flair_text: String::new(),
        };
        assert_eq!(ctx.removal_message(), "Hi u/alice\n\nRule: no X\n\nsee rules");
    }

    #[test]
    fn removal_message_without_header_footer_is_body_only() {
        let ctx = JobContext {
            job: PendingJob {
                submission_id: "p1".into(),
                mod_name: "m1".into(),
                flair_guid: "g1".into(),
            },
            submission: Submission::default(),
            general: GeneralConfiguration {
                header: "H".into(),
                footer: "F".into(),
                ..Default::default()
            },
            rule: FlairRule {
                template_id: "g1".into(),
                comment: flairmod_rules::CommentRule {
                    enabled: true,
                    body: "B".into(),
                    header_footer: false,
                    ..Default::default()
                },
                ..Default::default()
            },
            placeholders: PlaceholderMap::new(),
            author_ok: true,
            user_flair_text: String::new(),
        };
        assert_eq!(ctx.removal_message(), "B");
    }

    #[test]
    fn removal_message_skip_add_newlines_concatenates() {
        let ctx = JobContext {
            job: PendingJob {
                submission_id: "p1".into(),
                mod_name: "m1".into(),
                flair_guid: "g1".into(),
            },
            submission: Submission::default(),
            general: GeneralConfiguration {
                header: "H".into(),
                footer: "F".into(),
                skip_add_newlines: true,
                ..Default::default()
            },
            rule: FlairRule {
                template_id: "g1".into(),
                comment: flairmod_rules::CommentRule {
                    enabled: true,
                    body: "B".into(),
                    ..Default::default()
                },
                ..Default::default()
            },
            placeholders: PlaceholderMap::new(),
            author_ok: true,
            user_flair_text: String::new(),
        };
        assert_eq!(ctx.removal_message(), "HBF");
    }
}
