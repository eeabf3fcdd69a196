//! Terminal-state webhook notifications.

use crate::config::WebhookEvent;
use crate::types::{BatchId, WebhookPayload};
use std::sync::Arc;

use super::BatchCoordinator;

/// Parameters for triggering webhooks
pub struct BatchWebhookParams {
    /// The batch event that occurred
    pub event: WebhookEvent,
    /// The ID of the batch
    pub batch_id: BatchId,
    /// Owner the batch belongs to
    pub owner_id: String,
    /// Total number of files in the batch
    pub total_files: usize,
    /// Files processed successfully
    pub successful_files: usize,
    /// Files that failed
    pub failed_files: usize,
    /// Failure description for failed batches
    pub error: Option<String>,
}

impl BatchCoordinator {
    /// Trigger webhooks for a batch terminal state
    ///
    /// Sends HTTP POST requests to all configured webhooks subscribed to the
    /// given event. Webhooks are executed asynchronously (fire and forget)
    /// so they never block the batch pipeline; failures are logged and
    /// otherwise swallowed.
    pub(crate) fn notify_webhooks(&self, params: BatchWebhookParams) {
        let BatchWebhookParams {
            event,
            batch_id,
            owner_id,
            total_files,
            successful_files,
            failed_files,
            error,
        } = params;

        // Filter to only webhooks that match this event type before cloning
        let matching_webhooks: Vec<_> = self
            .config
            .notifications
            .webhooks
            .iter()
            .filter(|w| w.events.contains(&event))
            .cloned()
            .collect();

        if matching_webhooks.is_empty() {
            return;
        }

        tokio::spawn(async move {
            let event_str: &'static str = match event {
                WebhookEvent::OnCompleted => "completed",
                WebhookEvent::OnFailed => "failed",
            };

            // Build shared payload once - use Arc to share across webhooks
            let payload = Arc::new(WebhookPayload {
                event: event_str.to_string(),
                batch_id,
                owner_id,
                total_files,
                successful_files,
                failed_files,
                error,
                timestamp: chrono::Utc::now().timestamp(),
            });

            for webhook in matching_webhooks {
                if url::Url::parse(&webhook.url).is_err() {
                    tracing::warn!(url = %webhook.url, "skipping webhook with invalid URL");
                    continue;
                }

                let client = reqwest::Client::new();
                let mut request = client
                    .post(&webhook.url)
                    .json(payload.as_ref())
                    .timeout(webhook.timeout);

                if let Some(auth) = &webhook.auth_header {
                    request = request.header("Authorization", auth);
                }

                let url = webhook.url;
                let timeout = webhook.timeout;
                let result = tokio::time::timeout(timeout, request.send()).await;

                match result {
                    Ok(Ok(response)) => {
                        if !response.status().is_success() {
                            tracing::warn!(
                                url = %url,
                                status = %response.status(),
                                "webhook returned non-success status"
                            );
                        } else {
                            tracing::debug!(url = %url, "webhook sent successfully");
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "webhook failed");
                    }
                    Err(_) => {
                        tracing::warn!(url = %url, timeout = ?timeout, "webhook timed out");
                    }
                }
            }
        });
    }
}
