//! Debug overlays for diagnostic screenshots.
//!
//! Draws the search box and the best match onto a copy of the screenshot
//! so a failed match can be inspected by eye.

use image::{Rgba, RgbaImage};

use crate::vision::matcher::MatchResult;
use crate::vision::region::PixelRect;

pub const COLOR_SEARCH: Rgba<u8> = Rgba([0, 0, 255, 255]); // Blue
pub const COLOR_MATCHED: Rgba<u8> = Rgba([0, 255, 0, 255]); // Green
pub const COLOR_REJECTED: Rgba<u8> = Rgba([255, 0, 0, 255]); // Red
pub const COLOR_OCR: Rgba<u8> = Rgba([255, 255, 0, 255]); // Yellow

/// Returns a copy of `screenshot` with the search area and match drawn on.
///
/// The match box is green when it cleared the threshold and red otherwise.
pub fn annotate_match(
    screenshot: &RgbaImage,
    search: Option<&PixelRect>,
    result: &MatchResult,
) -> RgbaImage {
    let mut img = screenshot.clone();
    if let Some(area) = search {
        draw_rect(&mut img, area, COLOR_SEARCH, 2);
    }

    let color = if result.matched {
        COLOR_MATCHED
    } else {
        COLOR_REJECTED
    };
    let found = PixelRect {
        x: result.location.0,
        y: result.location.1,
        width: result.size.0,
        height: result.size.1,
    };
    draw_rect(&mut img, &found, color, 2);
    let (cx, cy) = result.center();
    draw_crosshair(&mut img, cx, cy, color, 6);
    img
}

/// Outlines an OCR region.
pub fn annotate_region(screenshot: &RgbaImage, rect: &PixelRect) -> RgbaImage {
    let mut img = screenshot.clone();
    draw_rect(&mut img, rect, COLOR_OCR, 2);
    img
}

/// Draws a rectangle border, skipping pixels that fall off the image.
pub fn draw_rect(img: &mut RgbaImage, rect: &PixelRect, color: Rgba<u8>, thickness: u32) {
    let (img_w, img_h) = img.dimensions();
    let mut put = |px: u32, py: u32| {
        if px < img_w && py < img_h {
            img.put_pixel(px, py, color);
        }
    };

    let right = rect.x + rect.width.saturating_sub(1);
    let bottom = rect.y + rect.height.saturating_sub(1);
    for t in 0..thickness.min(rect.width).min(rect.height) {
        for dx in 0..rect.width {
            put(rect.x + dx, rect.y + t);
            put(rect.x + dx, bottom - t);
        }
        for dy in 0..rect.height {
            put(rect.x + t, rect.y + dy);
            put(right - t, rect.y + dy);
        }
    }
}

/// Draws a three-pixel-wide crosshair centred on (`x`, `y`).
pub fn draw_crosshair(img: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>, arm_length: u32) {
    let (img_w, img_h) = img.dimensions();
    let (x, y, arm) = (x as i64, y as i64, arm_length as i64);
    let mut put = |px: i64, py: i64| {
        if px >= 0 && py >= 0 && px < img_w as i64 && py < img_h as i64 {
            img.put_pixel(px as u32, py as u32, color);
        }
    };

    for d in -arm..=arm {
        for w in -1..=1 {
            put(x + d, y + w);
            put(x + w, y + d);
        }
    }
}
