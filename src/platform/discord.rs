//! Discord webhook delivery.

use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde_json::json;
use tracing::{debug, info};

use super::{Notification, NotificationSink};
use crate::error::NotifyError;

const USER_AGENT: &str = "trainer-monitor";

pub struct DiscordWebhook {
    client: Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

impl NotificationSink for DiscordWebhook {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = json!({ "content": notification.content });

        let request = self.client.post(&self.url).header("User-Agent", USER_AGENT);
        let request = match &notification.attachment {
            Some(png) => {
                let file = multipart::Part::bytes(png.clone())
                    .file_name("screenshot.png")
                    .mime_str("image/png")?;
                let form = multipart::Form::new()
                    .text("payload_json", payload.to_string())
                    .part("files[0]", file);
                request.multipart(form)
            }
            None => request.json(&payload),
        };

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        debug!("Webhook accepted ({})", status);
        info!("Notification sent: {}", notification.content);
        Ok(())
    }
}

/// Sink used when no webhook is configured: logs the message and succeeds,
/// so milestone state still advances.
pub struct LogOnlySink;

impl NotificationSink for LogOnlySink {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!("[notification] {}", notification.content);
        Ok(())
    }
}
