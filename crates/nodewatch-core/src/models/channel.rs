//! Notification channel configuration models

use serde::{Deserialize, Serialize};

/// Identifier of a configured notification channel
pub type ChannelId = u64;

/// Persisted configuration of a notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Unique identifier
    pub id: ChannelId,

    /// Human-readable name
    pub name: String,

    /// Whether the channel receives broadcasts
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Delivery mechanism
    pub kind: ChannelKind,
}

fn default_enabled() -> bool {
    true
}

/// Delivery mechanism of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelKind {
    /// Generic JSON webhook
    Webhook {
        /// Target URL
        url: String,
        /// Extra request headers as a JSON object of strings
        #[serde(default)]
        headers: Option<serde_json::Value>,
    },
    /// Slack incoming webhook
    Slack {
        /// Incoming webhook URL
        webhook_url: String,
        /// Channel override
        #[serde(default)]
        channel: Option<String>,
    },
}

impl ChannelKind {
    /// Short type name used in logs
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Webhook { .. } => "webhook",
            Self::Slack { .. } => "slack",
        }
    }
}
