// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The flair-driven action engine.
//!
//! Four long-lived pipelines cooperate around the two durable stores:
//!
//! ```text
//!   wiki edits ──► ConfigIngestor ──► ConfigStore
//!                                         │ (read)
//!   mod log ────► EventClassifier ────────┤
//!                       │                 │
//!                       ▼                 ▼
//!                  ActionStore ──► ActionProcessor ──► platform API
//!                                         │
//!   inbox ──────► MessageHandler          └──► Notifier on giveup
//! ```
//!
//! The [`Supervisor`] owns every pipeline: it names them, restarts them with
//! capped backoff when they fail, and reports liveness.
mod classifier;
mod ingest;
mod messages;
mod processor;
mod starter;
mod supervisor;

pub use classifier::EventClassifier;
pub use ingest::{ConfigIngestor, IngestOutcome, CONFIG_PAGE};
pub use messages::MessageHandler;
pub use processor::ActionProcessor;
pub use starter::{render_starter_pm, starter_config, MAX_PM_LENGTH};
pub use supervisor::{StatusReport, Supervisor};
