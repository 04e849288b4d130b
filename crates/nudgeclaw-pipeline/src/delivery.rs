//! Default delivery channels: console output for local runs and a JSON
//! webhook for everything else. Transport failures come back as soft
//! `Delivery { delivered: false, .. }` so the backoff rules apply.

use async_trait::async_trait;

use nudgeclaw_core::error::Result;
use nudgeclaw_core::traits::DeliveryChannel;
use nudgeclaw_core::types::{Content, Delivery, ScheduledNotification};

/// Prints reminders to the log. Never fails; useful for dry runs.
pub struct ConsoleChannel;

#[async_trait]
impl DeliveryChannel for ConsoleChannel {
    async fn deliver(
        &self,
        notification: &ScheduledNotification,
        content: &Content,
    ) -> Result<Delivery> {
        tracing::info!(
            "🔔 [{}] {} → {}: {}",
            notification.notification_type,
            notification.user_id,
            content.title,
            content.body
        );
        Ok(Delivery {
            delivered: true,
            error: None,
        })
    }
}

/// Posts the reminder as JSON to a configured webhook URL.
pub struct WebhookChannel {
    url: String,
    headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: &str, headers: Vec<(String, String)>) -> Self {
        Self {
            url: url.to_string(),
            headers,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    async fn deliver(
        &self,
        notification: &ScheduledNotification,
        content: &Content,
    ) -> Result<Delivery> {
        let mut req = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "notification_id": notification.id,
                "user_id": notification.user_id,
                "item_id": notification.item_id,
                "type": notification.notification_type.key(),
                "title": content.title,
                "body": content.body,
                "action_ref": content.action_ref,
                "scheduled_for": notification.scheduled_for.to_rfc3339(),
            }))
            .timeout(std::time::Duration::from_secs(10));

        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(
                    "✅ Webhook delivered {} to {}",
                    notification.id,
                    self.url
                );
                Ok(Delivery {
                    delivered: true,
                    error: None,
                })
            }
            Ok(resp) => Ok(Delivery {
                delivered: false,
                error: Some(format!("webhook returned {}", resp.status())),
            }),
            Err(e) => Ok(Delivery {
                delivered: false,
                error: Some(format!("webhook send failed: {e}")),
            }),
        }
    }
}
