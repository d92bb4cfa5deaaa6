// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use flairmod_config::Config;
use flairmod_engine::{
    ActionProcessor, ConfigIngestor, EventClassifier, MessageHandler, Supervisor,
};
use flairmod_notify::{Notifier, NullNotifier, WebhookNotifier};
use flairmod_platform::{HttpPlatform, Platform};
use flairmod_rules::{convert_yaml_config, unescape_newlines, SubredditConfig};
use flairmod_store::{ActionStore, ConfigStore};
use flairmod_toolbox::ToolboxNotes;

const CONFIG_DB: &str = "flairmod_configs.db";
const ACTIONS_DB: &str = "flairmod_actions.db";
/// Cadence of the periodic liveness log line.
const STATUS_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.as_ref() {
        Some(Commands::ShowConfig) => {
            init_logging(cli.verbose, true, None);
            let config = flairmod_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Some(Commands::CheckConfig { file }) => {
            init_logging(cli.verbose, true, None);
            check_config(file)
        }
        Some(Commands::Run) | None => {
            let config = Arc::new(flairmod_config::load(cli.config.as_deref())?);
            // The config file can raise verbosity too; the CLI flag wins.
            let file_verbosity = if config.verbose {
                2
            } else if config.debug {
                1
            } else {
                0
            };
            init_logging(
                cli.verbose.max(file_verbosity),
                config.colored_console_output,
                Some(&config.logs_dir),
            );
            run_bot(config).await
        }
    }
}

/// Parse a community configuration document the way the ingestor would and
/// print the canonical JSON, so moderators can lint before publishing.
fn check_config(path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let content = content.trim();

    let mut items = if content.starts_with('[') {
        serde_json::from_str::<Vec<serde_json::Value>>(content).context("parsing JSON")?
    } else {
        convert_yaml_config(content).context("converting legacy YAML")?
    };
    for item in &mut items {
        unescape_newlines(item);
    }
    let config = SubredditConfig::from_values(items).context("validating configuration")?;

    println!("{}", config.pretty_json());
    eprintln!(
        "OK: general configuration plus {} flair rule(s)",
        config.flairs.len()
    );
    Ok(())
}

async fn run_bot(config: Arc<Config>) -> anyhow::Result<()> {
    let token = std::env::var(&config.platform.access_token_env).with_context(|| {
        format!(
            "platform token missing; set {}",
            config.platform.access_token_env
        )
    })?;

    let platform: Arc<dyn Platform> = Arc::new(
        HttpPlatform::connect(
            config.platform.base_url.as_deref(),
            &token,
            &config.platform.user_agent,
        )
        .await
        .context("authenticating to platform")?,
    );
    info!(bot = platform.bot_username(), "authenticated");

    let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
        Arc::new(WebhookNotifier::new(&config.notifications.webhook_url))
    } else {
        Arc::new(NullNotifier)
    };

    let config_store = Arc::new(ConfigStore::open(CONFIG_DB).context("opening config store")?);
    let action_store = Arc::new(ActionStore::open(ACTIONS_DB).context("opening action store")?);
    let toolbox = Arc::new(ToolboxNotes::new(Arc::clone(&platform)));

    let ingestor = Arc::new(ConfigIngestor::new(
        Arc::clone(&platform),
        Arc::clone(&config_store),
        Arc::clone(&notifier),
        Arc::clone(&config),
    ));

    // First run: nothing cached yet, so sweep before the streams start.
    // Otherwise sweep in the background after a grace period; the cached
    // configs keep the pipelines correct in the meantime.
    if config_store.is_empty()? {
        info!("config store empty, running initial sweep");
        ingestor.sweep_all().await?;
    } else {
        let ingestor = Arc::clone(&ingestor);
        let delay = Duration::from_secs(config.processor.startup_sweep_delay_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = ingestor.sweep_all().await {
                warn!(%err, "startup config sweep failed");
            }
        });
    }

    let classifier = Arc::new(EventClassifier::new(
        Arc::clone(&platform),
        Arc::clone(&config_store),
        Arc::clone(&action_store),
        Arc::clone(&ingestor),
        Arc::clone(&notifier),
        Arc::clone(&config),
    ));
    let processor = Arc::new(ActionProcessor::new(
        Arc::clone(&platform),
        Arc::clone(&config_store),
        Arc::clone(&action_store),
        Arc::clone(&notifier),
        Arc::clone(&toolbox),
        config.processor.clone(),
    ));
    let messages = Arc::new(MessageHandler::new(
        Arc::clone(&platform),
        Arc::clone(&notifier),
        Arc::clone(&config),
    ));

    let supervisor = Supervisor::new(Arc::clone(&notifier));
    {
        let classifier = Arc::clone(&classifier);
        supervisor
            .add_task("mod-log-watcher", move || {
                let classifier = Arc::clone(&classifier);
                async move { classifier.run().await }
            })
            .await;
    }
    {
        let processor = Arc::clone(&processor);
        supervisor
            .add_task("action-processor", move || {
                let processor = Arc::clone(&processor);
                async move { processor.run().await }
            })
            .await;
    }
    {
        let messages = Arc::clone(&messages);
        supervisor
            .add_task("inbox-handler", move || {
                let messages = Arc::clone(&messages);
                async move { messages.run().await }
            })
            .await;
    }

    notifier
        .status(&format!(
            "flairmod started as {}",
            platform.bot_username()
        ))
        .await;

    // Periodic liveness line until shutdown is requested.
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(STATUS_INTERVAL) => {
                let report = supervisor.status(&action_store, &config_store).await;
                info!(%report, "status");
            }
        }
    }

    info!("shutting down");
    notifier.status("flairmod shutting down").await;
    supervisor.shutdown().await;
    Ok(())
}

fn init_logging(verbosity: u8, colored: bool, logs_dir: Option<&str>) {
    // Console output honours RUST_LOG, falling back to -v / -vv.  When a
    // logs directory is configured, warnings and errors additionally land in
    // <logs_dir>/errors.log for long-running deployments.
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = logs_dir.filter(|dir| !dir.is_empty()).and_then(|dir| {
        use std::sync::Mutex;
        std::fs::create_dir_all(dir).ok()?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(Path::new(dir).join("errors.log"))
            .ok()?;
        Some(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(tracing_subscriber::filter::LevelFilter::WARN),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(colored)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .with(filter)
        .try_init();
}
