//! Notification channels

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::models::{ChannelConfig, ChannelId, ChannelKind};

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Request failed or the endpoint returned a non-success status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Channel configuration is unusable
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A delivery mechanism for alert text
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Unique channel identifier
    fn id(&self) -> ChannelId;

    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Deliver `text`
    async fn send(&self, text: &str) -> Result<(), NotificationError>;
}

/// Shared HTTP client for channel delivery
pub fn http_client() -> Result<Client, NotificationError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| NotificationError::ConfigError(e.to_string()))
}

/// Instantiate the channel described by `config`
pub fn build_channel(client: &Client, config: ChannelConfig) -> Arc<dyn NotificationChannel> {
    match config.kind {
        ChannelKind::Webhook { url, headers } => Arc::new(WebhookChannel {
            id: config.id,
            name: config.name,
            url,
            headers,
            client: client.clone(),
        }),
        ChannelKind::Slack {
            webhook_url,
            channel,
        } => Arc::new(SlackChannel {
            id: config.id,
            name: config.name,
            webhook_url,
            channel,
            client: client.clone(),
        }),
    }
}

async fn check_status(
    response: reqwest::Response,
    service: &str,
) -> Result<(), NotificationError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(NotificationError::HttpError(format!(
            "{} returned {}: {}",
            service, status, body
        )));
    }
    Ok(())
}

/// Generic JSON webhook
pub struct WebhookChannel {
    id: ChannelId,
    name: String,
    url: String,
    headers: Option<serde_json::Value>,
    client: Client,
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        let payload = WebhookPayload {
            channel_id: self.id,
            channel_name: &self.name,
            message: text,
            sent_at: Utc::now(),
        };

        let mut request = self.client.post(&self.url).json(&payload);

        // Add custom headers if provided
        if let Some(headers_obj) = &self.headers {
            let Some(headers_map) = headers_obj.as_object() else {
                return Err(NotificationError::ConfigError(
                    "webhook headers must be a JSON object".to_string(),
                ));
            };
            for (key, value) in headers_map {
                if let Some(value_str) = value.as_str() {
                    request = request.header(key, value_str);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;
        check_status(response, "Webhook").await?;

        info!(channel_id = self.id, url = %self.url, "Webhook notification sent");
        Ok(())
    }
}

/// Slack incoming webhook
pub struct SlackChannel {
    id: ChannelId,
    name: String,
    webhook_url: String,
    channel: Option<String>,
    client: Client,
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        let payload = SlackPayload {
            channel: self.channel.as_deref(),
            username: "Nodewatch",
            icon_emoji: ":rotating_light:",
            attachments: vec![SlackAttachment {
                color: "#dc3545",
                title: "Nodewatch Alert",
                text,
                footer: "Nodewatch Alerting",
                ts: Utc::now().timestamp(),
            }],
        };

        let body = serde_json::to_vec(&payload)
            .map_err(|e| NotificationError::SerializationError(e.to_string()))?;

        let response = self
            .client
            .post(&self.webhook_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;
        check_status(response, "Slack").await?;

        info!(channel_id = self.id, "Slack notification sent");
        Ok(())
    }
}

// Generic webhook payload
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel_id: ChannelId,
    channel_name: &'a str,
    message: &'a str,
    sent_at: DateTime<Utc>,
}

// Slack payload types
#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    username: &'a str,
    icon_emoji: &'a str,
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    color: &'a str,
    title: &'a str,
    text: &'a str,
    footer: &'a str,
    ts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn webhook_config(url: String) -> ChannelConfig {
        ChannelConfig {
            id: 1,
            name: "ops-hook".to_string(),
            enabled: true,
            kind: ChannelKind::Webhook {
                url,
                headers: Some(serde_json::json!({"X-Token": "secret"})),
            },
        }
    }

    #[tokio::test]
    async fn test_webhook_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(header("X-Token", "secret"))
            .and(body_partial_json(serde_json::json!({
                "channel_id": 1,
                "message": "disk full on web-1",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let channel = build_channel(&client, webhook_config(format!("{}/alerts", server.uri())));

        assert_eq!(channel.id(), 1);
        assert_eq!(channel.name(), "ops-hook");
        channel.send("disk full on web-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let channel = build_channel(&client, webhook_config(server.uri()));

        let err = channel.send("cpu hot").await.unwrap_err();
        assert!(matches!(err, NotificationError::HttpError(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_slack_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "channel": "#ops",
                "attachments": [{"text": "host-3 offline"}],
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let channel = build_channel(
            &client,
            ChannelConfig {
                id: 2,
                name: "slack".to_string(),
                enabled: true,
                kind: ChannelKind::Slack {
                    webhook_url: server.uri(),
                    channel: Some("#ops".to_string()),
                },
            },
        );

        channel.send("host-3 offline").await.unwrap();
    }
}
