// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Workspace-level smoke tests: legacy config in, ingested, classified and
/// processed against the mock platform.
use std::sync::Arc;

use flairmod_config::Config;
use flairmod_engine::{
    ActionProcessor, ConfigIngestor, EventClassifier, IngestOutcome, CONFIG_PAGE,
};
use flairmod_notify::NullNotifier;
use flairmod_platform::{MockPlatform, ModLogEntry, Platform, RetryPolicy, Submission};
use flairmod_store::{ActionStore, ConfigStore};
use flairmod_toolbox::ToolboxNotes;

const LEGACY_WIKI: &str = "\
header: \"Hi u/{{author}},\"
footer: \"- the mods of /r/{{subreddit}}\"
flairs:
  g1: \"Rule 1: stay on topic.\"
remove:
  g1: true
comment:
  g1: true
";

#[tokio::test]
async fn legacy_wiki_page_drives_the_full_pipeline() {
    let mock = MockPlatform::new("fh-bot");
    let platform: Arc<dyn Platform> = Arc::new(mock.clone());
    let app_config = Arc::new(Config::default());
    let config_store = Arc::new(ConfigStore::in_memory().unwrap());
    let action_store = Arc::new(ActionStore::in_memory().unwrap());

    mock.moderate("pics");
    mock.set_wiki("pics", CONFIG_PAGE, LEGACY_WIKI);
    mock.set_wiki_author("pics", CONFIG_PAGE, "m1");
    mock.add_submission(Submission {
        id: "p1".into(),
        author: Some("alice".into()),
        subreddit: "pics".into(),
        created_utc: chrono::Utc::now().timestamp(),
        link_flair_template_id: Some("g1".into()),
        ..Default::default()
    });

    // Ingest converts the legacy YAML and caches the canonical form.
    let ingestor = Arc::new(
        ConfigIngestor::new(
            Arc::clone(&platform),
            Arc::clone(&config_store),
            Arc::new(NullNotifier),
            Arc::clone(&app_config),
        )
        .with_retry(RetryPolicy::immediate(1)),
    );
    assert_eq!(ingestor.refresh("pics").await.unwrap(), IngestOutcome::Updated);
    assert!(mock
        .wiki_content("pics", CONFIG_PAGE)
        .unwrap()
        .trim_start()
        .starts_with('['));

    // A flair assignment in the mod log expands into queued actions.
    let classifier = EventClassifier::new(
        Arc::clone(&platform),
        Arc::clone(&config_store),
        Arc::clone(&action_store),
        Arc::clone(&ingestor),
        Arc::new(NullNotifier),
        Arc::clone(&app_config),
    );
    classifier
        .handle_entry(&ModLogEntry {
            action: "editflair".into(),
            mod_name: "m1".into(),
            subreddit: "pics".into(),
            target_fullname: Some("t3_p1".into()),
            details: None,
        })
        .await;
    assert!(action_store.pending_count().unwrap() > 0);

    // The processor drives the job to completion.
    let processor = ActionProcessor::new(
        Arc::clone(&platform),
        Arc::clone(&config_store),
        Arc::clone(&action_store),
        Arc::new(NullNotifier),
        Arc::new(ToolboxNotes::new(Arc::clone(&platform))),
        app_config.processor.clone(),
    );
    processor.poll_once().await.unwrap();

    assert!(mock.submission_state("p1").unwrap().removed);
    let messages = mock.calls_matching("send_removal_message p1");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Hi u/alice,"));
    assert!(messages[0].contains("Rule 1: stay on topic."));
    assert!(messages[0].contains("- the mods of /r/pics"));
    assert_eq!(action_store.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn operational_config_defaults_load() {
    let config = Config::default();
    assert_eq!(config.processor.max_concurrency, 2);
    assert!(!config.auto_accept_mod_invites);
}
