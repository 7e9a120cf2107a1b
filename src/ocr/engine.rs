use std::process::{Command, Stdio};
use std::time::Duration;

use image::GrayImage;
use tempfile::NamedTempFile;
use tracing::debug;
use wait_timeout::ChildExt;

use super::setup::TesseractPaths;
use crate::error::OcrError;

/// Turns a preprocessed image into raw text. Parsing lives in the reader.
pub trait OcrEngine {
    fn recognize(&self, img: &GrayImage, whitelist: Option<&str>) -> Result<String, OcrError>;
}

/// Runs the Tesseract CLI in single-line mode.
pub struct TesseractEngine {
    paths: TesseractPaths,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, timeout: Duration) -> Self {
        Self { paths, timeout }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, img: &GrayImage, whitelist: Option<&str>) -> Result<String, OcrError> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        let mut cmd = Command::new(&self.paths.executable);
        cmd.arg(temp_input.path()).arg("stdout");
        if let Some(tessdata) = &self.paths.tessdata {
            cmd.arg("--tessdata-dir").arg(tessdata);
        }
        cmd.args(["-l", "eng", "--psm", "7", "--oem", "3"]);
        if let Some(chars) = whitelist {
            cmd.arg("-c").arg(format!("tessedit_char_whitelist={}", chars));
        }

        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OcrError::EngineMissing(format!("{}: {}", self.paths.executable.display(), e)))?;

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Timeout(self.timeout.as_millis() as u64));
            }
        };

        // One line of digits fits in the pipe buffer, so reading after exit is safe.
        let output = child.wait_with_output()?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineFailed(stderr.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Tesseract raw output: {:?}", text);
        Ok(text)
    }
}
