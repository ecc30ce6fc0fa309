use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ReminderError, Result};

/// Body accepted by Discord-style webhooks
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    username: &'a str,
}

/// What a dispatch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// No webhook URL configured, nothing was sent
    NotConfigured,
}

/// Sends reminder messages to the clan's chat webhook, one attempt per call
#[derive(Clone)]
pub struct WebhookDispatcher {
    http_client: reqwest::Client,
    username: String,
}

impl WebhookDispatcher {
    pub fn new(username: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReminderError::Internal {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            username: username.into(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// POST `message` to `webhook_url`. Non-2xx statuses and timeouts are
    /// errors; a missing or blank URL is not.
    pub async fn send(&self, webhook_url: Option<&str>, message: &str) -> Result<DispatchOutcome> {
        let Some(url) = webhook_url.map(str::trim).filter(|u| !u.is_empty()) else {
            debug!("No webhook URL configured, skipping dispatch");
            return Ok(DispatchOutcome::NotConfigured);
        };

        let payload = WebhookPayload {
            content: message.trim(),
            username: &self.username,
        };

        let response = self.http_client.post(url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReminderError::WebhookStatus {
                status: status.as_u16(),
                body,
            });
        }

        info!("Webhook accepted message ({})", status);
        Ok(DispatchOutcome::Sent)
    }
}
