//! OCR Reader: cropped value box to a normalised number.
//!
//! Unparseable text is an expected outcome (mid-animation frames, font
//! noise) and comes back as an unresolved reading, never an error. Only
//! engine failures such as a Tesseract timeout are errors.

use std::fmt;
use std::sync::LazyLock;

use image::RgbaImage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::OcrEngine;
use super::preprocess::prepare_for_ocr;
use crate::error::OcrError;

static LEVEL_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)level\s*:?\s*(\d+)\s*(?:/|$)").expect("level pattern is valid"));

/// A lone number, optionally followed by `/cap`.
static BARE_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*(?:/.*)?$").expect("bare level pattern is valid"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericKind {
    Level,
    Zen,
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericKind::Level => write!(f, "level"),
            NumericKind::Zen => write!(f, "zen"),
        }
    }
}

/// How a value box is preprocessed, recognised and parsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadFormat {
    /// Upscale factor applied before binarisation.
    pub scale: u32,
    /// Characters Tesseract may emit.
    pub whitelist: String,
    /// Readings above this are treated as misreads.
    pub max_value: u64,
    /// Thousands separator dropped before parsing. Zen only.
    #[serde(default)]
    pub separator: Option<char>,
}

impl ReadFormat {
    pub fn level() -> Self {
        Self {
            scale: 3,
            whitelist: "Level:/0123456789".to_string(),
            max_value: 400,
            separator: None,
        }
    }

    pub fn zen() -> Self {
        Self {
            scale: 2,
            whitelist: "0123456789,".to_string(),
            max_value: 2_000_000_000,
            separator: Some(','),
        }
    }

    pub fn for_kind(kind: NumericKind) -> Self {
        match kind {
            NumericKind::Level => Self::level(),
            NumericKind::Zen => Self::zen(),
        }
    }
}

/// One OCR result. `value` is `None` when the text didn't parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumericReading {
    pub kind: NumericKind,
    pub value: Option<u64>,
    /// What the engine returned, for logs.
    pub raw: String,
}

impl NumericReading {
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Display for NumericReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}={}", self.kind, v),
            None => write!(f, "{}=unresolved ({:?})", self.kind, self.raw),
        }
    }
}

/// Preprocesses `cropped`, runs the engine and parses the text.
pub fn read(
    cropped: &RgbaImage,
    kind: NumericKind,
    format: &ReadFormat,
    engine: &dyn OcrEngine,
) -> Result<NumericReading, OcrError> {
    let prepared = prepare_for_ocr(cropped, format.scale);
    let whitelist = (!format.whitelist.is_empty()).then_some(format.whitelist.as_str());
    let raw = engine.recognize(&prepared, whitelist)?;
    let reading = parse_reading(kind, &raw, format);
    debug!("OCR {}", reading);
    Ok(reading)
}

/// Parses raw engine text for `kind`.
pub fn parse_reading(kind: NumericKind, raw: &str, format: &ReadFormat) -> NumericReading {
    let value = match kind {
        NumericKind::Level => parse_level(raw, format.max_value),
        NumericKind::Zen => parse_zen(raw, format.separator, format.max_value),
    };
    NumericReading {
        kind,
        value,
        raw: raw.trim().to_string(),
    }
}

/// Parses level text such as `Level: 42/400` or a bare `42`.
///
/// The part after `/` is the level cap and is ignored. Text where letters
/// break up the number (`3O5`) is unresolved rather than guessed.
pub fn parse_level(text: &str, max_value: u64) -> Option<u64> {
    let digits = LEVEL_TEXT
        .captures(text)
        .or_else(|| BARE_LEVEL.captures(text))
        .and_then(|c| c.get(1))?;
    parse_bounded(digits.as_str(), max_value)
}

/// Parses a currency amount such as `1,250`.
pub fn parse_zen(text: &str, separator: Option<char>, max_value: u64) -> Option<u64> {
    let without_separator: String = match separator {
        Some(sep) => text.chars().filter(|c| *c != sep).collect(),
        None => text.to_string(),
    };
    parse_bounded(&digits_only(&without_separator), max_value)
}

fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn parse_bounded(digits: &str, max_value: u64) -> Option<u64> {
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok().filter(|v| *v <= max_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Rgba};
    use std::cell::RefCell;

    struct FixedEngine {
        text: String,
        seen_whitelist: RefCell<Option<String>>,
    }

    impl OcrEngine for FixedEngine {
        fn recognize(&self, _img: &GrayImage, whitelist: Option<&str>) -> Result<String, OcrError> {
            *self.seen_whitelist.borrow_mut() = whitelist.map(str::to_string);
            Ok(self.text.clone())
        }
    }

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn recognize(&self, _img: &GrayImage, _whitelist: Option<&str>) -> Result<String, OcrError> {
            Err(OcrError::Timeout(5000))
        }
    }

    fn crop() -> RgbaImage {
        ImageBuffer::from_pixel(20, 8, Rgba([30, 30, 30, 255]))
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("Level: 42/400", 400), Some(42));
        assert_eq!(parse_level("level:7 / 400", 400), Some(7));
        assert_eq!(parse_level("42", 400), Some(42));
        assert_eq!(parse_level(" 42 / 400\n", 400), Some(42));
        assert_eq!(parse_level("Lvl 3O5/400", 400), None);
        assert_eq!(parse_level("Level: 3O5/400", 400), None);
        assert_eq!(parse_level("401/400", 400), None);
        assert_eq!(parse_level("/400", 400), None);
        assert_eq!(parse_level("", 400), None);
    }

    #[test]
    fn test_parse_zen() {
        assert_eq!(parse_zen("1,250", Some(','), 2_000_000_000), Some(1250));
        assert_eq!(parse_zen(" 1,900,000,000\n", Some(','), 2_000_000_000), Some(1_900_000_000));
        assert_eq!(parse_zen("2,000,000,001", Some(','), 2_000_000_000), None);
        assert_eq!(parse_zen("1.250", Some('.'), 2_000_000_000), Some(1250));
        assert_eq!(parse_zen("", Some(','), 2_000_000_000), None);
    }

    #[test]
    fn test_garbage_is_unresolved_not_error() {
        for text in ["", "   ", "abc", ",,,", "Level:", "99999999999999999999999999"] {
            let reading = parse_reading(NumericKind::Zen, text, &ReadFormat::zen());
            assert!(!reading.is_resolved(), "{:?} should be unresolved", text);
            let reading = parse_reading(NumericKind::Level, text, &ReadFormat::level());
            assert!(!reading.is_resolved(), "{:?} should be unresolved", text);
        }
    }

    #[test]
    fn test_read_passes_whitelist_and_parses() {
        let engine = FixedEngine {
            text: "1,250\n".to_string(),
            seen_whitelist: RefCell::new(None),
        };
        let reading = read(&crop(), NumericKind::Zen, &ReadFormat::zen(), &engine).unwrap();

        assert_eq!(reading.value, Some(1250));
        assert_eq!(reading.raw, "1,250");
        assert_eq!(engine.seen_whitelist.borrow().as_deref(), Some("0123456789,"));
    }

    #[test]
    fn test_read_engine_error_propagates() {
        let err = read(&crop(), NumericKind::Level, &ReadFormat::level(), &FailingEngine).unwrap_err();
        assert!(matches!(err, OcrError::Timeout(5000)));
    }

    #[test]
    fn test_display() {
        let r = parse_reading(NumericKind::Level, "Level: 42/400", &ReadFormat::level());
        assert_eq!(r.to_string(), "level=42");
        let r = parse_reading(NumericKind::Zen, "x", &ReadFormat::zen());
        assert_eq!(r.to_string(), "zen=unresolved (\"x\")");
    }
}
