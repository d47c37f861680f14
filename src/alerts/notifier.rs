//! Notification handlers for alerts

use async_trait::async_trait;
use std::collections::HashMap;

use super::action::{Action, ActionError};
use super::config::NotifyTarget;
use crate::search::SearchResult;

/// Lifecycle event being notified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    Alert,
    AlertEnd,
}

impl AlertEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEvent::Alert => "alert",
            AlertEvent::AlertEnd => "alert_end",
        }
    }
}

/// Action that fans out to every configured target
pub struct Notifier {
    client: reqwest::Client,
    targets: Vec<NotifyTarget>,
}

impl Notifier {
    /// Create a notifier for a set of targets
    pub fn new(targets: Vec<NotifyTarget>) -> Self {
        Self {
            client: reqwest::Client::new(),
            targets,
        }
    }

    /// Send to all targets, collecting failures
    async fn notify(
        &self,
        check_id: &str,
        event: AlertEvent,
        message: &str,
        total: Option<u64>,
    ) -> Result<(), ActionError> {
        let mut errors = Vec::new();

        for target in &self.targets {
            if let Err(e) = self.notify_target(check_id, target, event, message, total).await {
                errors.push(e);
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ActionError::Multiple(errors)),
        }
    }

    /// Send notification to a single target
    async fn notify_target(
        &self,
        check_id: &str,
        target: &NotifyTarget,
        event: AlertEvent,
        message: &str,
        total: Option<u64>,
    ) -> Result<(), ActionError> {
        match target {
            NotifyTarget::Log => {
                match event {
                    AlertEvent::Alert => tracing::warn!(
                        check_id = %check_id,
                        "Alert triggered: {}",
                        message
                    ),
                    AlertEvent::AlertEnd => tracing::info!(
                        check_id = %check_id,
                        "Alert ended: {}",
                        message
                    ),
                }
                Ok(())
            }
            NotifyTarget::Webhook { url, headers } => {
                self.send_webhook(check_id, url, headers, event, message, total)
                    .await
            }
        }
    }

    /// Send webhook notification
    async fn send_webhook(
        &self,
        check_id: &str,
        url: &str,
        headers: &HashMap<String, String>,
        event: AlertEvent,
        message: &str,
        total: Option<u64>,
    ) -> Result<(), ActionError> {
        let payload = webhook_payload(check_id, event, message, total);

        let mut request = self.client.post(url).json(&payload);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(ActionError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(
            check_id = %check_id,
            url = %url,
            event = event.as_str(),
            "Webhook notification sent"
        );

        Ok(())
    }
}

fn webhook_payload(
    check_id: &str,
    event: AlertEvent,
    message: &str,
    total: Option<u64>,
) -> serde_json::Value {
    serde_json::json!({
        "check_id": check_id,
        "event": event.as_str(),
        "message": message,
        "total_hits": total,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

#[async_trait]
impl Action for Notifier {
    async fn on_condition_met(
        &self,
        check_id: &str,
        result: &SearchResult,
        message: &str,
    ) -> Result<(), ActionError> {
        self.notify(check_id, AlertEvent::Alert, message, Some(result.total))
            .await
    }

    async fn on_alert_end(&self, check_id: &str) -> Result<(), ActionError> {
        self.notify(check_id, AlertEvent::AlertEnd, "condition cleared", None)
            .await
    }
}
