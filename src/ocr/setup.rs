use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::OcrError;

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

const COMMON_INSTALLS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];

#[derive(Clone, Debug)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets Tesseract use its compiled-in tessdata location.
    pub tessdata: Option<PathBuf>,
}

/// Per-user Tesseract directory: `<local data>/trainer-monitor/tesseract`.
pub fn local_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trainer-monitor")
        .join("tesseract")
}

/// Locates Tesseract.
///
/// Search order: configured override, the per-user directory, `PATH`,
/// then the default Windows install folders.
pub fn locate_tesseract(override_path: Option<&Path>) -> Result<TesseractPaths, OcrError> {
    let executable = find_executable(override_path)?;
    let tessdata = find_tessdata_dir(&executable);
    info!(
        "Tesseract: {} (tessdata: {})",
        executable.display(),
        tessdata
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "default".to_string())
    );
    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

fn find_executable(override_path: Option<&Path>) -> Result<PathBuf, OcrError> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(OcrError::EngineMissing(format!(
            "configured path {} does not exist",
            path.display()
        )));
    }

    let local_exe = local_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for dir in COMMON_INSTALLS {
        let p = Path::new(dir).join("tesseract.exe");
        if p.exists() {
            return Ok(p);
        }
    }

    Err(OcrError::EngineMissing(format!(
        "install Tesseract-OCR, add it to PATH, or copy it to {}",
        local_tesseract_dir().display()
    )))
}

fn find_tessdata_dir(executable: &Path) -> Option<PathBuf> {
    let has_eng = |p: &Path| p.join("eng.traineddata").exists();

    let mut candidates = vec![local_tesseract_dir().join("tessdata")];
    if let Some(parent) = executable.parent() {
        candidates.push(parent.join("tessdata"));
    }
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }
    candidates.extend(COMMON_INSTALLS.iter().map(|d| Path::new(d).join("tessdata")));

    let found = candidates.into_iter().find(|p| has_eng(p));
    if found.is_none() {
        debug!("No eng.traineddata found; relying on Tesseract's default tessdata");
    }
    found
}
