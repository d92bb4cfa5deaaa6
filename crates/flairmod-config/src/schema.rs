// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should be on unless explicitly disabled
/// need a named function.
fn default_true() -> bool {
    true
}

fn default_logs_dir() -> String {
    "logs/".to_string()
}

fn default_user_agent() -> String {
    format!("flairmod/{}", env!("CARGO_PKG_VERSION"))
}

fn default_access_token_env() -> String {
    "FLAIRMOD_ACCESS_TOKEN".to_string()
}

fn default_max_concurrency() -> usize {
    2
}

fn default_max_processing_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_inbox_interval_secs() -> u64 {
    120
}

fn default_startup_sweep_delay_secs() -> u64 {
    90
}

fn default_ingest_concurrency() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub verbose: bool,
    /// Colorize console output (ignored when stdout is not a terminal).
    #[serde(default = "default_true")]
    pub colored_console_output: bool,
    /// Accept moderator invitations without operator involvement.
    #[serde(default)]
    pub auto_accept_mod_invites: bool,
    /// Message the community after its wiki configuration reloads.
    /// Parse failures are always messaged to the editor regardless.
    #[serde(default = "default_true")]
    pub send_pm_on_wiki_config_update: bool,
    /// Moderator accounts whose flair edits never trigger actions.
    #[serde(default)]
    pub ignore_mods: Vec<String>,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            verbose: false,
            colored_console_output: true,
            auto_accept_mod_invites: false,
            send_pm_on_wiki_config_update: true,
            ignore_mods: Vec::new(),
            logs_dir: default_logs_dir(),
            platform: PlatformConfig::default(),
            notifications: NotificationConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

/// Credentials and identity for the upstream platform API.
///
/// Token acquisition/refresh is out of scope here — the operator provides a
/// ready bearer token through the named environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Environment variable holding the API bearer token (read at runtime).
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    /// Base URL override, useful for test doubles.
    pub base_url: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            access_token_env: default_access_token_env(),
            base_url: None,
        }
    }
}

/// Operator-facing status and failure notifications (chat webhook).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Webhook endpoint for status lines and failure events.
    #[serde(default)]
    pub webhook_url: String,
}

/// Tuning for the action processor and the long-lived streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Submissions processed in parallel per scheduler pass.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Job-level attempts before the failure is escalated and the job is
    /// force-completed.
    #[serde(default = "default_max_processing_retries")]
    pub max_processing_retries: u32,
    /// Minimum spacing between redispatches of a failed job.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Sleep between polls of the pending-action queue.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Sleep between inbox sweeps.
    #[serde(default = "default_inbox_interval_secs")]
    pub inbox_interval_secs: u64,
    /// Delay before the post-startup full config sweep, letting the streams
    /// come up first. Skipped when the config store is empty.
    #[serde(default = "default_startup_sweep_delay_secs")]
    pub startup_sweep_delay_secs: u64,
    /// Communities ingested concurrently during a config sweep.
    #[serde(default = "default_ingest_concurrency")]
    pub ingest_concurrency: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_processing_retries: default_max_processing_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            inbox_interval_secs: default_inbox_interval_secs(),
            startup_sweep_delay_secs: default_startup_sweep_delay_secs(),
            ingest_concurrency: default_ingest_concurrency(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
