use std::path::PathBuf;

use thiserror::Error;

/// Startup failures. Any of these aborts before the loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Failed to parse config {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
    #[error("Missing {kind} asset: {path}")]
    MissingAsset { kind: &'static str, path: PathBuf },
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Region must have a non-zero size (got {width}x{height})")]
    EmptyRegion { width: u32, height: u32 },
    #[error(
        "Region ({x}, {y}) {width}x{height} is outside the {image_width}x{image_height} screenshot"
    )]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },
    #[error("Region is anchored to the game window but no window bounds were supplied")]
    MissingWindow,
}

/// Screenshot acquisition failures. All variants are retryable.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No window title contains \"{0}\"")]
    WindowNotFound(String),
    #[error("Failed to focus game window: {0}")]
    FocusFailed(String),
    #[error("Screen capture failed: {0}")]
    Failed(String),
    #[error("Screen capture timed out after {0}ms")]
    Timeout(u64),
    #[error("Stop requested before capture")]
    Stopped,
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Tesseract not found: {0}")]
    EngineMissing(String),
    #[error("Tesseract failed: {0}")]
    EngineFailed(String),
    #[error("Tesseract did not finish within {0}ms")]
    Timeout(u64),
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode OCR input: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Unknown key name: {0}")]
    UnknownKey(String),
    #[error("Input injection failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification target is not configured")]
    NotConfigured,
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Webhook responded with HTTP {0}")]
    Status(u16),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to open sound {0}: {1}")]
    Open(PathBuf, std::io::Error),
    #[error("No audio output device: {0}")]
    Device(String),
}
