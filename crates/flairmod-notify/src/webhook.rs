// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{FailureEvent, Notifier};

const EMBED_COLOR: u32 = 242424;

#[derive(Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
}

/// Operator-channel sink posting chat-webhook embeds.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    async fn post(&self, title: &str, description: &str) {
        let payload = WebhookPayload {
            embeds: vec![Embed {
                title: title.to_string(),
                description: description.to_string(),
                color: EMBED_COLOR,
            }],
        };
        match self.http.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(title, "webhook notification delivered");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "webhook notification rejected");
            }
            Err(err) => {
                warn!(%err, "webhook notification failed");
            }
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn status(&self, message: &str) {
        self.post("Flairmod Status Notification", message).await;
    }

    async fn failure(&self, event: &FailureEvent) {
        self.post("Flairmod Action Failure", &event.render()).await;
    }
}
