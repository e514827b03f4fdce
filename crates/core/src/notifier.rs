//! Notification router (4.G): dispatches a `NotificationMessage` to a
//! configured channel by `channel.type`. New channel types are added by
//! extending `ChannelType` and registering a notifier here; no other
//! component changes (design note: polymorphism over notifiers).

use crate::mailer::{self, MailerError, SmtpConfig};
use crate::models::{ChannelType, NotificationChannel, NotificationMessage};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),
    #[error("webhook request failed: {0}")]
    WebhookFailed(String),
    #[error("webhook returned status {status}: {body}")]
    WebhookStatus { status: u16, body: String },
    #[error("smtp is not configured")]
    SmtpNotConfigured,
    #[error("smtp send failed: {0}")]
    SmtpFailed(#[from] MailerError),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, config: &Value, message: &NotificationMessage) -> Result<(), NotifierError>;
    fn validate_config(&self, config: &Value) -> Result<(), NotifierError>;
}

pub struct SlackNotifier {
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new() -> Self {
        Self { client: reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build().unwrap() }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn validate_config(&self, config: &Value) -> Result<(), NotifierError> {
        let url = config.get("webhook_url").and_then(Value::as_str).unwrap_or("");
        if url.is_empty() || !url.starts_with("https://hooks.slack.com/") {
            return Err(NotifierError::InvalidConfig(
                "webhook_url must start with https://hooks.slack.com/".to_string(),
            ));
        }
        Ok(())
    }

    async fn send(&self, config: &Value, message: &NotificationMessage) -> Result<(), NotifierError> {
        self.validate_config(config)?;
        let url = config["webhook_url"].as_str().unwrap();

        let mut blocks = vec![
            serde_json::json!({ "type": "header", "text": { "type": "plain_text", "text": message.title } }),
            serde_json::json!({ "type": "section", "text": { "type": "mrkdwn", "text": message.body } }),
        ];
        if !message.attachment_filenames.is_empty() {
            blocks.push(serde_json::json!({
                "type": "context",
                "elements": [{ "type": "mrkdwn", "text": message.attachment_filenames.join(", ") }],
            }));
        }
        let payload = serde_json::json!({ "blocks": blocks });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::WebhookFailed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::WebhookStatus { status: status.as_u16(), body: body.chars().take(500).collect() });
        }
        Ok(())
    }
}

pub struct GoogleChatNotifier {
    client: reqwest::Client,
}

impl GoogleChatNotifier {
    pub fn new() -> Self {
        Self { client: reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build().unwrap() }
    }
}

#[async_trait]
impl Notifier for GoogleChatNotifier {
    fn validate_config(&self, config: &Value) -> Result<(), NotifierError> {
        let url = config.get("webhook_url").and_then(Value::as_str).unwrap_or("");
        if url.is_empty() || !url.starts_with("https://chat.googleapis.com/") {
            return Err(NotifierError::InvalidConfig(
                "webhook_url must start with https://chat.googleapis.com/".to_string(),
            ));
        }
        Ok(())
    }

    async fn send(&self, config: &Value, message: &NotificationMessage) -> Result<(), NotifierError> {
        self.validate_config(config)?;
        let url = config["webhook_url"].as_str().unwrap();

        let payload = serde_json::json!({
            "cardsV2": [{
                "card": {
                    "header": { "title": message.title },
                    "sections": [{ "widgets": [{ "textParagraph": { "text": message.body } }] }],
                }
            }]
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::WebhookFailed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::WebhookStatus { status: status.as_u16(), body: body.chars().take(500).collect() });
        }
        Ok(())
    }
}

pub struct EmailNotifier {
    smtp: Option<SmtpConfig>,
}

impl EmailNotifier {
    pub fn new(smtp: Option<SmtpConfig>) -> Self {
        Self { smtp }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn validate_config(&self, config: &Value) -> Result<(), NotifierError> {
        let to = config.get("to").and_then(Value::as_str).unwrap_or("");
        if !to.contains('@') || !to.contains('.') {
            return Err(NotifierError::InvalidConfig("to must look like an email address".to_string()));
        }
        Ok(())
    }

    async fn send(&self, config: &Value, message: &NotificationMessage) -> Result<(), NotifierError> {
        self.validate_config(config)?;
        let Some(smtp) = &self.smtp else {
            return Err(NotifierError::SmtpNotConfigured);
        };
        let to = config["to"].as_str().unwrap();
        let mut body = message.body.clone();
        if !message.attachment_filenames.is_empty() {
            body.push_str("\n\nAttachments: ");
            body.push_str(&message.attachment_filenames.join(", "));
        }
        mailer::send_email(smtp, to, &message.title, &body).await?;
        Ok(())
    }
}

/// Dispatches by `channel.type`; holds one notifier instance per type.
pub struct NotificationRouter {
    slack: SlackNotifier,
    google_chat: GoogleChatNotifier,
    email: EmailNotifier,
}

impl NotificationRouter {
    pub fn new(smtp: Option<SmtpConfig>) -> Self {
        Self { slack: SlackNotifier::new(), google_chat: GoogleChatNotifier::new(), email: EmailNotifier::new(smtp) }
    }

    fn notifier_for(&self, channel_type: ChannelType) -> &dyn Notifier {
        match channel_type {
            ChannelType::Slack => &self.slack,
            ChannelType::GoogleChat => &self.google_chat,
            ChannelType::Email => &self.email,
        }
    }

    pub async fn send(&self, channel: &NotificationChannel, message: &NotificationMessage) -> Result<(), NotifierError> {
        self.notifier_for(channel.channel_type).send(&channel.config_json, message).await
    }

    pub fn validate_config(&self, channel_type: ChannelType, config: &Value) -> Result<(), NotifierError> {
        self.notifier_for(channel_type).validate_config(config)
    }

    /// Composes a canned test message, sends it, and on success flips
    /// `is_verified = true` on the channel row. Failures never flip the flag.
    pub async fn test_channel(&self, pool: &PgPool, channel: &NotificationChannel) -> Result<(), NotifierError> {
        let message = NotificationMessage {
            title: "Mitsume test notification".to_string(),
            body: format!("This is a test notification for channel \"{}\".", channel.name),
            attachment_filenames: Vec::new(),
        };

        match self.send(channel, &message).await {
            Ok(()) => {
                if let Err(e) = sqlx::query("UPDATE notification_channels SET is_verified = true, updated_at = now() WHERE id = $1")
                    .bind(channel.id)
                    .execute(pool)
                    .await
                {
                    error!("failed to mark channel {} verified: {}", channel.id, e);
                }
                info!("channel {} verified via test notification", channel.id);
                Ok(())
            }
            Err(e) => {
                warn!("test notification failed for channel {}: {}", channel.id, e);
                Err(e)
            }
        }
    }
}
