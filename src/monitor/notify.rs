//! Notification text.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::ocr::NumericKind;
use crate::platform::{Notification, Severity};
use crate::vision::{extract, Region};

pub const STAR_EMOJI: &str = "⭐";
pub const COIN_EMOJI: &str = "🪙";
pub const WARNING_EMOJI: &str = "⚠️";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Discord webhook URL. Empty disables delivery.
    pub webhook_url: String,
    /// Discord user id to mention. Empty means no mention.
    pub user_id: String,
    pub character_name: String,
    pub timeout_ms: u64,
    /// Attach a screenshot to error notifications.
    pub attach_screenshot: bool,
    /// Part of the screenshot to attach. Whole screenshot when `None`.
    pub attachment_region: Option<Region>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            user_id: String::new(),
            character_name: "Character".to_string(),
            timeout_ms: 10_000,
            attach_screenshot: true,
            attachment_region: None,
        }
    }
}

fn mention(config: &NotificationConfig) -> String {
    if config.user_id.trim().is_empty() {
        String::new()
    } else {
        format!("<@{}> ", config.user_id.trim())
    }
}

/// `<@uid> {name}. {message} {emoji}`
pub fn info(config: &NotificationConfig, message: &str, emoji: &str) -> Notification {
    Notification {
        severity: Severity::Info,
        content: format!(
            "{}{}. {} {}",
            mention(config),
            config.character_name,
            message,
            emoji
        ),
        attachment: None,
    }
}

/// `<@uid> Error for {name}. {message} ⚠️`, optionally with a PNG.
pub fn error(config: &NotificationConfig, message: &str, attachment: Option<Vec<u8>>) -> Notification {
    Notification {
        severity: Severity::Error,
        content: format!(
            "{}Error for {}. {} {}",
            mention(config),
            config.character_name,
            message,
            WARNING_EMOJI
        ),
        attachment,
    }
}

/// Info notification for a crossed milestone.
pub fn milestone(config: &NotificationConfig, kind: NumericKind, value: u64) -> Notification {
    match kind {
        NumericKind::Level => info(config, &format!("Reached level {}", value), STAR_EMOJI),
        NumericKind::Zen => info(
            config,
            &format!("Zen reached {}", format_thousands(value)),
            COIN_EMOJI,
        ),
    }
}

/// `1234567` -> `1,234,567`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// PNG bytes for an error attachment, cropped to `region` when it fits.
pub fn attachment_png(screenshot: &RgbaImage, region: Option<&Region>) -> Option<Vec<u8>> {
    let cropped = region.and_then(|r| extract(screenshot, r, None).ok());
    let img = cropped.as_ref().unwrap_or(screenshot);

    let mut bytes = Vec::new();
    match img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png) {
        Ok(()) => Some(bytes),
        Err(e) => {
            tracing::warn!("Failed to encode notification screenshot: {}", e);
            None
        }
    }
}
