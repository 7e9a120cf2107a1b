//! Template matching by normalized correlation coefficient.
//!
//! Both images are reduced to 8-bit luma, then every placement of the
//! template inside the search area is scored with the zero-mean normalized
//! cross-correlation (the same metric as OpenCV's `TM_CCOEFF_NORMED`).
//! Window sums come from integral images so only the cross term is computed
//! per pixel.

use std::path::Path;

use image::{GrayImage, RgbaImage};

use crate::error::ConfigError;
use crate::vision::region::PixelRect;

/// A named reference image plus the similarity needed to count as a match.
#[derive(Clone, Debug)]
pub struct Template {
    pub name: String,
    pub image: GrayImage,
    pub threshold: f32,
}

/// Outcome of one match attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub template: String,
    /// Top-left of the best placement, in screenshot coordinates.
    pub location: (u32, u32),
    /// Template size, for drawing the match box.
    pub size: (u32, u32),
    pub confidence: f32,
    pub matched: bool,
}

impl MatchResult {
    pub fn center(&self) -> (u32, u32) {
        (
            self.location.0 + self.size.0 / 2,
            self.location.1 + self.size.1 / 2,
        )
    }
}

impl Template {
    pub fn new(name: impl Into<String>, image: GrayImage, threshold: f32) -> Self {
        Self {
            name: name.into(),
            image,
            threshold,
        }
    }

    pub fn from_rgba(name: impl Into<String>, image: &RgbaImage, threshold: f32) -> Self {
        Self::new(name, image::imageops::grayscale(image), threshold)
    }

    /// Loads a template from disk. A missing or unreadable file is fatal.
    pub fn load(name: &str, path: &Path, threshold: f32) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingAsset {
                kind: "template",
                path: path.to_path_buf(),
            });
        }
        let img = image::open(path).map_err(|e| {
            ConfigError::invalid(format!("template {}", name), format!("{}: {}", path.display(), e))
        })?;
        Ok(Self::new(name, img.to_luma8(), threshold))
    }
}

/// Finds the best placement of `template` inside `search` (or the whole
/// screenshot when `search` is `None`).
///
/// Pure and deterministic: ties keep the first placement in row-major order.
pub fn match_template(
    screenshot: &RgbaImage,
    template: &Template,
    search: Option<&PixelRect>,
) -> MatchResult {
    let area = search.copied().unwrap_or(PixelRect {
        x: 0,
        y: 0,
        width: screenshot.width(),
        height: screenshot.height(),
    });
    let cropped =
        image::imageops::crop_imm(screenshot, area.x, area.y, area.width, area.height).to_image();
    let haystack = image::imageops::grayscale(&cropped);

    let (score, (bx, by)) = best_placement(&haystack, &template.image);
    let confidence = score as f32;

    MatchResult {
        template: template.name.clone(),
        location: (area.x + bx, area.y + by),
        size: template.image.dimensions(),
        confidence,
        matched: confidence >= template.threshold,
    }
}

fn best_placement(haystack: &GrayImage, needle: &GrayImage) -> (f64, (u32, u32)) {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return (0.0, (0, 0));
    }

    let n = (nw * nh) as f64;
    let needle_mean = needle.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let centered: Vec<f64> = needle.pixels().map(|p| p[0] as f64 - needle_mean).collect();
    let needle_var: f64 = centered.iter().map(|v| v * v).sum();

    let integral = Integral::new(haystack);
    let raw = haystack.as_raw();
    let stride = hw as usize;

    let mut best = f64::NEG_INFINITY;
    let mut best_at = (0, 0);

    for y in 0..=(hh - nh) {
        for x in 0..=(hw - nw) {
            let (sum, sum_sq) = integral.window(x, y, nw, nh);
            let window_var = sum_sq - sum * sum / n;

            let score = if needle_var <= f64::EPSILON || window_var <= f64::EPSILON {
                // Flat images have no correlation; two flat patches of the same
                // shade are still the same picture.
                if needle_var <= f64::EPSILON
                    && window_var <= f64::EPSILON
                    && (sum / n - needle_mean).abs() < 0.5
                {
                    1.0
                } else {
                    0.0
                }
            } else {
                let mut cross = 0.0;
                for ty in 0..nh as usize {
                    let row = (y as usize + ty) * stride + x as usize;
                    let trow = ty * nw as usize;
                    for tx in 0..nw as usize {
                        cross += centered[trow + tx] * raw[row + tx] as f64;
                    }
                }
                (cross / (needle_var * window_var).sqrt()).clamp(-1.0, 1.0)
            };

            if score > best {
                best = score;
                best_at = (x, y);
            }
        }
    }

    (best, best_at)
}

/// Summed-area tables for pixel values and squared pixel values.
struct Integral {
    width: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Integral {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let width = w + 1;
        let mut sum = vec![0.0; width * (h + 1)];
        let mut sum_sq = vec![0.0; width * (h + 1)];

        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = img.get_pixel(x as u32, y as u32)[0] as f64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * width + x + 1;
                sum[idx] = sum[idx - width] + row_sum;
                sum_sq[idx] = sum_sq[idx - width] + row_sq;
            }
        }

        Self { width, sum, sum_sq }
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |table: &[f64], xx: usize, yy: usize| table[yy * self.width + xx];
        let pick = |table: &[f64]| {
            at(table, x1, y1) - at(table, x0, y1) - at(table, x1, y0) + at(table, x0, y0)
        };
        (pick(&self.sum), pick(&self.sum_sq))
    }
}
