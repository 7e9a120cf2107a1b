//! Screen understanding: regions, template matching and state classification.

pub mod annotate;
pub mod classifier;
pub mod matcher;
pub mod region;

use chrono::{DateTime, Local};
use image::RgbaImage;

pub use classifier::{Classification, GameState, StateClassifier, StateProbe};
pub use matcher::{match_template, MatchResult, Template};
pub use region::{extract, Anchor, PixelRect, Region, WindowRect};

/// One captured frame. Owned by the cycle that captured it.
#[derive(Clone, Debug)]
pub struct Screenshot {
    pub image: RgbaImage,
    pub captured_at: DateTime<Local>,
}

impl Screenshot {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Local::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Capture time as `HH:MM:SS.mmm`, for log lines.
    pub fn timestamp(&self) -> String {
        self.captured_at.format("%H:%M:%S%.3f").to_string()
    }

    /// Loads a fixture screenshot from disk.
    pub fn open(path: &std::path::Path) -> image::ImageResult<Self> {
        Ok(Self::new(image::open(path)?.to_rgba8()))
    }
}
