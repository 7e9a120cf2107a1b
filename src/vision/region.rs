//! Region resolution and cropping.
//!
//! Regions are configured in pixels and resolved against a concrete
//! screenshot (and optionally the game window bounds) right before use.
//! Resolution never clamps: a region that pokes outside the screenshot is
//! an error, because OCR on a partial box silently reads the wrong thing.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// What the region's `x`/`y` are measured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// `x`/`y` is the top-left corner in screenshot pixels.
    #[default]
    Absolute,
    /// `x`/`y` is the top-left corner relative to the game window's top-left.
    Window,
    /// `x`/`y` is the offset of the region's centre from the screenshot centre.
    Center,
}

/// A configured rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub anchor: Anchor,
}

/// Screen-space bounds of the game window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// A region resolved to absolute pixel coordinates inside a screenshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn absolute(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            anchor: Anchor::Absolute,
        }
    }

    pub const fn window(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            anchor: Anchor::Window,
        }
    }

    pub const fn centered(offset_x: i32, offset_y: i32, width: u32, height: u32) -> Self {
        Self {
            x: offset_x,
            y: offset_y,
            width,
            height,
            anchor: Anchor::Center,
        }
    }

    /// Checks the geometry that can be checked without a screenshot.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExtractError::EmptyRegion {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Resolves this region against an image of `image_width` x `image_height`.
    ///
    /// `window` is required for [`Anchor::Window`] and ignored otherwise.
    pub fn resolve(
        &self,
        image_width: u32,
        image_height: u32,
        window: Option<&WindowRect>,
    ) -> Result<PixelRect, ExtractError> {
        self.validate()?;

        let (left, top): (i64, i64) = match self.anchor {
            Anchor::Absolute => (self.x as i64, self.y as i64),
            Anchor::Window => {
                let window = window.ok_or(ExtractError::MissingWindow)?;
                (
                    window.left as i64 + self.x as i64,
                    window.top as i64 + self.y as i64,
                )
            }
            Anchor::Center => {
                let center_x = image_width as i64 / 2 + self.x as i64;
                let center_y = image_height as i64 / 2 + self.y as i64;
                (
                    center_x - self.width as i64 / 2,
                    center_y - self.height as i64 / 2,
                )
            }
        };

        let right = left + self.width as i64;
        let bottom = top + self.height as i64;
        if left < 0 || top < 0 || right > image_width as i64 || bottom > image_height as i64 {
            return Err(ExtractError::OutOfBounds {
                x: left,
                y: top,
                width: self.width,
                height: self.height,
                image_width,
                image_height,
            });
        }

        Ok(PixelRect {
            x: left as u32,
            y: top as u32,
            width: self.width,
            height: self.height,
        })
    }
}

/// Crops `img` to `region`, failing with `OutOfBounds` instead of clamping.
pub fn extract(
    img: &RgbaImage,
    region: &Region,
    window: Option<&WindowRect>,
) -> Result<RgbaImage, ExtractError> {
    let rect = region.resolve(img.width(), img.height(), window)?;
    Ok(crop(img, &rect))
}

/// Crops an already-resolved rectangle.
pub fn crop(img: &RgbaImage, rect: &PixelRect) -> RgbaImage {
    image::imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}
