//! Diagnostic modes.
//!
//! Each mode exercises one piece of the pipeline against a fixture
//! screenshot, prints a single result line and writes annotated images to
//! the debug directory. Exit codes: 0 found, 1 setup failure (returned as
//! an error), 2 not found.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use tracing::{info, warn};

use crate::monitor::notify;
use crate::monitor::MonitorConfig;
use crate::ocr::preprocess::prepare_for_ocr;
use crate::ocr::{self, NumericKind, OcrEngine};
use crate::paths;
use crate::platform::NotificationSink;
use crate::vision::annotate::{annotate_match, annotate_region};
use crate::vision::region::crop;
use crate::vision::{match_template, GameState, Screenshot, Template};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Found,
    NotFound,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Found => 0,
            Outcome::NotFound => 2,
        }
    }
}

fn report(line: &str) {
    println!("{}", line);
    info!("{}", line);
}

fn load_screenshot(path: &Path) -> Result<Screenshot> {
    Screenshot::open(path).with_context(|| format!("Failed to open screenshot {}", path.display()))
}

pub struct Diagnostics<'a> {
    config: &'a MonitorConfig,
    debug_dir: PathBuf,
}

impl<'a> Diagnostics<'a> {
    pub fn new(config: &'a MonitorConfig, debug_dir: PathBuf) -> Self {
        Self { config, debug_dir }
    }

    /// The override when given, otherwise the configured fixture.
    fn fixture(&self, configured: &Path, override_path: Option<&Path>) -> Result<Screenshot> {
        let path = match override_path {
            Some(path) => path.to_path_buf(),
            None => self.config.resolve(configured),
        };
        info!("Using screenshot {}", path.display());
        load_screenshot(&path)
    }

    fn save_debug(&self, label: &str, img: &RgbaImage) -> Option<PathBuf> {
        if let Err(e) = std::fs::create_dir_all(&self.debug_dir) {
            warn!("Could not create {}: {}", self.debug_dir.display(), e);
            return None;
        }
        let path = paths::timestamped_png(&self.debug_dir, label);
        match img.save(&path) {
            Ok(()) => {
                info!("Saved {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not save debug image: {}", e);
                None
            }
        }
    }

    /// Sends a test notification, optionally with the fixture image attached.
    pub fn notify(
        &self,
        sink: &dyn NotificationSink,
        with_image: bool,
        image: Option<&Path>,
    ) -> Result<Outcome> {
        let cfg = &self.config.notification;
        let mut notification = notify::info(cfg, "Test notification from trainer-monitor", notify::STAR_EMOJI);
        if with_image {
            let shot = self.fixture(&self.config.fixtures.notification_image, image)?;
            let png = notify::attachment_png(&shot.image, cfg.attachment_region.as_ref())
                .ok_or_else(|| anyhow!("Failed to encode attachment"))?;
            notification.attachment = Some(png);
        }

        sink.send(&notification).context("Notification failed")?;
        report(&format!(
            "Notification sent{}",
            if with_image { " with image" } else { "" }
        ));
        Ok(Outcome::Found)
    }

    /// Crops the configured region from the fixture and runs OCR on it.
    pub fn read_value(
        &self,
        kind: NumericKind,
        engine: &dyn OcrEngine,
        image: Option<&Path>,
    ) -> Result<Outcome> {
        let configured = match kind {
            NumericKind::Level => &self.config.fixtures.level,
            NumericKind::Zen => &self.config.fixtures.zen,
        };
        let shot = self.fixture(configured, image)?;
        let reading_cfg = self.config.reading(kind);
        let format = reading_cfg.format(kind);

        let rect = reading_cfg
            .region
            .resolve(shot.width(), shot.height(), None)
            .with_context(|| format!("{} region does not fit the screenshot", kind))?;
        self.save_debug(&format!("{}_region", kind), &annotate_region(&shot.image, &rect));

        let cropped = crop(&shot.image, &rect);
        self.save_debug(&format!("{}_crop", kind), &cropped);
        let prepared = prepare_for_ocr(&cropped, format.scale);
        let prepared_path = paths::timestamped_png(&self.debug_dir, &format!("{}_preprocessed", kind));
        if let Err(e) = prepared.save(&prepared_path) {
            warn!("Could not save preprocessed image: {}", e);
        }

        let reading = ocr::read(&cropped, kind, &format, engine).context("OCR failed")?;
        report(&format!("{} (raw {:?})", reading, reading.raw.trim()));
        Ok(if reading.is_resolved() {
            Outcome::Found
        } else {
            Outcome::NotFound
        })
    }

    /// Runs one state's template against its fixture.
    pub fn state(&self, state: GameState, image: Option<&Path>) -> Result<Outcome> {
        let classifier = self.config.load_classifier()?;
        let configured = self
            .config
            .fixtures
            .for_state(state)
            .ok_or_else(|| anyhow!("No fixture for {}", state))?;
        let shot = self.fixture(configured, image)?;

        let result = classifier
            .probe(state, &shot, None)
            .ok_or_else(|| anyhow!("No template configured for {}", state))?;
        let search = self
            .config
            .templates
            .get(state)
            .and_then(|t| t.search)
            .and_then(|r| r.resolve(shot.width(), shot.height(), None).ok());
        self.save_debug(
            &format!("state_{}", state),
            &annotate_match(&shot.image, search.as_ref(), &result),
        );

        report(&format!(
            "{}: {} (confidence {:.3}, threshold {:.2})",
            state,
            if result.matched { "FOUND" } else { "not found" },
            result.confidence,
            classifier_threshold(self.config, state)
        ));
        Ok(if result.matched {
            Outcome::Found
        } else {
            Outcome::NotFound
        })
    }

    /// Classifies the fixture, listing every probe that ran.
    pub fn classify(&self, image: Option<&Path>) -> Result<Outcome> {
        let classifier = self.config.load_classifier()?;
        let shot = self.fixture(&self.config.fixtures.classify, image)?;
        let classification = classifier.classify_detailed(&shot, None);

        for result in &classification.matches {
            info!(
                "  {}: confidence {:.3} at {:?}{}",
                result.template,
                result.confidence,
                result.location,
                if result.matched { " (matched)" } else { "" }
            );
        }
        if let Some(last) = classification.matches.last() {
            self.save_debug("classify", &annotate_match(&shot.image, None, last));
        }

        report(&format!("State: {}", classification.state));
        Ok(if classification.state == GameState::Unknown {
            Outcome::NotFound
        } else {
            Outcome::Found
        })
    }

    /// Searches `screenshot` for `needle` anywhere.
    pub fn find(&self, needle: &Path, screenshot: &Path, threshold: f32) -> Result<Outcome> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!("Threshold {} is outside 0.0-1.0", threshold));
        }
        let template = Template::load("needle", needle, threshold)?;
        let shot = load_screenshot(screenshot)?;
        let result = match_template(&shot.image, &template, None);
        self.save_debug("find", &annotate_match(&shot.image, None, &result));

        if result.matched {
            let (x, y) = result.center();
            report(&format!(
                "needle: FOUND at ({}, {}) confidence {:.3}",
                x, y, result.confidence
            ));
            Ok(Outcome::Found)
        } else {
            report(&format!(
                "needle: not found (best {:.3} < {:.2})",
                result.confidence, threshold
            ));
            Ok(Outcome::NotFound)
        }
    }
}

fn classifier_threshold(config: &MonitorConfig, state: GameState) -> f32 {
    config.templates.get(state).map_or(0.0, |t| t.threshold)
}
