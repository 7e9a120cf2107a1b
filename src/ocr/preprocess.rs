use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbaImage};

/// Prepares a cropped value box for Tesseract.
///
/// Grayscale, upscale by `scale` (Catmull-Rom), then binarise with a global
/// Otsu threshold. The output is always dark text on a white background:
/// whichever class covers fewer pixels is taken to be the glyphs.
pub fn prepare_for_ocr(img: &RgbaImage, scale: u32) -> GrayImage {
    let gray = image::imageops::grayscale(img);
    let scaled = if scale > 1 {
        image::imageops::resize(
            &gray,
            gray.width() * scale,
            gray.height() * scale,
            FilterType::CatmullRom,
        )
    } else {
        gray
    };
    let threshold = otsu_threshold(&scaled);
    binarize(&scaled, threshold)
}

/// Otsu's method: the level that maximises between-class variance.
///
/// Pixels `<= threshold` form the dark class.
pub fn otsu_threshold(img: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for p in img.pixels() {
        histogram[p[0] as usize] += 1;
    }

    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return 127;
    }
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &n)| v as f64 * n as f64)
        .sum();

    let mut best = 0u8;
    let mut best_var = -1.0;
    let mut weight_dark = 0u64;
    let mut sum_dark = 0.0;

    for (level, &count) in histogram.iter().enumerate() {
        weight_dark += count;
        if weight_dark == 0 {
            continue;
        }
        let weight_bright = total - weight_dark;
        if weight_bright == 0 {
            break;
        }
        sum_dark += level as f64 * count as f64;

        let mean_dark = sum_dark / weight_dark as f64;
        let mean_bright = (sum_all - sum_dark) / weight_bright as f64;
        let between =
            weight_dark as f64 * weight_bright as f64 * (mean_dark - mean_bright).powi(2);
        if between > best_var {
            best_var = between;
            best = level as u8;
        }
    }
    best
}

fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    let bright = img.pixels().filter(|p| p[0] > threshold).count();
    let bright_is_text = bright * 2 < (img.width() * img.height()) as usize;

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let is_bright = img.get_pixel(x, y)[0] > threshold;
        if is_bright == bright_is_text {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}
