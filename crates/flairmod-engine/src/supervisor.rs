// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Named registry of the long-lived pipeline tasks.
//!
//! Every pipeline runs inside a wrapper loop: a failure is reported to the
//! operator channel, waited out with doubling backoff (capped), and the task
//! is started again. Re-adding a name cancels the prior task first, awaiting
//! its teardown, so there is never more than one incarnation of a pipeline.
//! A minimum spacing between consecutive starts guards against rapid-restart
//! loops when a task dies immediately.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use flairmod_notify::Notifier;
use flairmod_store::{ActionStore, ConfigStore};

const INITIAL_RESTART_DELAY: Duration = Duration::from_secs(10);
const MAX_RESTART_DELAY: Duration = Duration::from_secs(160);
/// Minimum spacing between consecutive starts of the same task.
const MIN_START_SPACING: Duration = Duration::from_secs(10);

/// Liveness view over the supervised system.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub tasks: Vec<String>,
    pub pending_actions: u64,
    pub communities: Vec<String>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "running tasks: {}; pending actions: {}; monitored communities: {}",
            if self.tasks.is_empty() {
                "none".to_string()
            } else {
                self.tasks.join(", ")
            },
            self.pending_actions,
            self.communities.len(),
        )
    }
}

pub struct Supervisor {
    notifier: Arc<dyn Notifier>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    initial_delay: Duration,
    max_delay: Duration,
    start_spacing: Duration,
}

impl Supervisor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            tasks: Mutex::new(HashMap::new()),
            initial_delay: INITIAL_RESTART_DELAY,
            max_delay: MAX_RESTART_DELAY,
            start_spacing: MIN_START_SPACING,
        }
    }

    /// Shrink the delays for tests.
    pub fn with_timing(mut self, initial: Duration, max: Duration, spacing: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self.start_spacing = spacing;
        self
    }

    /// Register (or replace) a named task. A prior task with the same name
    /// is cancelled and awaited before the new one starts.
    pub async fn add_task<F, Fut>(&self, name: &str, factory: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let prior = self.tasks.lock().await.remove(name);
        if let Some(handle) = prior {
            info!(task = name, "cancelling prior task");
            self.notifier
                .status(&format!("[{name}] restarting task"))
                .await;
            handle.abort();
            let _ = handle.await;
        }

        let handle = tokio::spawn(restart_loop(
            name.to_string(),
            factory,
            Arc::clone(&self.notifier),
            self.initial_delay,
            self.max_delay,
            self.start_spacing,
        ));
        self.tasks.lock().await.insert(name.to_string(), handle);
    }

    /// Names of tasks whose wrapper is still alive.
    pub async fn running_tasks(&self) -> Vec<String> {
        let tasks = self.tasks.lock().await;
        let mut names: Vec<String> = tasks
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Compose the liveness view from the stores.
    pub async fn status(
        &self,
        action_store: &ActionStore,
        config_store: &ConfigStore,
    ) -> StatusReport {
        StatusReport {
            tasks: self.running_tasks().await,
            pending_actions: action_store.pending_count().unwrap_or(0),
            communities: config_store.list_communities().unwrap_or_default(),
        }
    }

    /// Cancel every task and await teardown.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for (name, handle) in tasks.drain() {
            info!(task = name.as_str(), "shutting down task");
            handle.abort();
            let _ = handle.await;
        }
    }
}

/// The wrapper every supervised task runs in.
async fn restart_loop<F, Fut>(
    name: String,
    factory: F,
    notifier: Arc<dyn Notifier>,
    initial_delay: Duration,
    max_delay: Duration,
    start_spacing: Duration,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut delay = initial_delay;
    let mut last_start: Option<Instant> = None;

    loop {
        // Rapid-restart guard: enforce spacing between consecutive starts.
        if let Some(started) = last_start {
            let elapsed = started.elapsed();
            if elapsed < start_spacing {
                tokio::time::sleep(start_spacing - elapsed).await;
            }
        }
        last_start = Some(Instant::now());

        info!(task = name.as_str(), "task starting");
        notifier.status(&format!("[{name}] task started")).await;

        match factory().await {
            Ok(()) => {
                // A clean return (a stream ended, a poll loop was asked to
                // stop) restarts with fresh backoff.
                info!(task = name.as_str(), "task returned, restarting");
                delay = initial_delay;
            }
            Err(err) => {
                warn!(task = name.as_str(), error = %format!("{err:#}"), "task failed");
                notifier
                    .status(&format!(
                        "[{name}] task failed: {err:#}\nRestarting in {delay:?}"
                    ))
                    .await;
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use flairmod_notify::NullNotifier;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_supervisor() -> Supervisor {
        Supervisor::new(Arc::new(NullNotifier)).with_timing(
            Duration::from_millis(5),
            Duration::from_millis(20),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn failing_task_is_restarted() {
        let supervisor = fast_supervisor();
        let starts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&starts);
        supervisor
            .add_task("flaky", move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        anyhow::bail!("boom {n}");
                    }
                    // Settle down after two failures.
                    futures::future::pending::<()>().await;
                    Ok(())
                }
            })
            .await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(starts.load(Ordering::SeqCst) >= 3, "task restarted after failures");
        assert_eq!(supervisor.running_tasks().await, vec!["flaky".to_string()]);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn re_adding_a_name_replaces_the_task() {
        let supervisor = fast_supervisor();
        let first_runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&first_runs);
        supervisor
            .add_task("watcher", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    futures::future::pending::<()>().await;
                    Ok(())
                }
            })
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let runs_before = first_runs.load(Ordering::SeqCst);
        assert!(runs_before >= 1);

        supervisor
            .add_task("watcher", move || async move {
                futures::future::pending::<()>().await;
                Ok(())
            })
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The first incarnation is gone; its counter stopped moving.
        assert_eq!(first_runs.load(Ordering::SeqCst), runs_before);
        assert_eq!(supervisor.running_tasks().await.len(), 1);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let supervisor = fast_supervisor();
        supervisor
            .add_task("a", || async {
                futures::future::pending::<()>().await;
                Ok(())
            })
            .await;
        supervisor
            .add_task("b", || async {
                futures::future::pending::<()>().await;
                Ok(())
            })
            .await;
        assert_eq!(supervisor.running_tasks().await.len(), 2);
        supervisor.shutdown().await;
        assert!(supervisor.running_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn status_reports_store_contents() {
        let supervisor = fast_supervisor();
        let actions = ActionStore::in_memory().unwrap();
        let configs = ConfigStore::in_memory().unwrap();
        actions
            .insert_batch("p1", &[flairmod_rules::ActionKind::Remove], "m1", "g1")
            .unwrap();
        configs
            .put("pics", &flairmod_rules::SubredditConfig::default())
            .unwrap();

        let report = supervisor.status(&actions, &configs).await;
        assert_eq!(report.pending_actions, 1);
        assert_eq!(report.communities, vec!["pics".to_string()]);
        assert!(report.to_string().contains("pending actions: 1"));
    }
}
