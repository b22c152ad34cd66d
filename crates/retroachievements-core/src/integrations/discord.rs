//! Discord notifier -- post status updates via webhook.

use reqwest::Client;
use serde_json::json;

use crate::integrations::traits::{NotificationService, NotifyError};
use crate::BoxFuture;

const WEBHOOK_PREFIX: &str = "https://discord.com/api/webhooks/";

pub struct DiscordNotifier {
    webhook_url: String,
    user_name: String,
    client: Client,
}

impl DiscordNotifier {
    /// `user_name` replaces the `{user_name}` placeholder in report headers.
    pub fn new(webhook_url: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            user_name: user_name.into(),
            client: Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    /// Check the webhook URL looks like a Discord webhook.
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.webhook_url.is_empty() {
            return Err("Discord webhook URL not configured.".into());
        }
        if !self.webhook_url.starts_with(WEBHOOK_PREFIX) {
            return Err(
                format!("Invalid Discord webhook URL: must start with {WEBHOOK_PREFIX}").into(),
            );
        }
        Ok(())
    }

    /// Substitute the user name placeholder.
    pub fn render(&self, text: &str) -> String {
        text.replace("{user_name}", &self.user_name)
    }

    async fn post_message(&self, content: &str) -> Result<(), NotifyError> {
        if !self.is_configured() {
            return Err("Discord webhook URL not configured.".into());
        }

        let body = json!({ "content": content });
        let resp = self.client.post(&self.webhook_url).json(&body).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Err(format!("Discord webhook error (HTTP {status}): {text}").into())
        }
    }
}

impl NotificationService for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    fn notify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let content = self.render(text);
            self.post_message(&content).await
        })
    }
}
