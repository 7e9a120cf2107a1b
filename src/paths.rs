use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Local;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the log file: `<exe_dir>/logs/trainer_monitor.log`
pub fn get_log_file() -> PathBuf {
    get_logs_dir().join("trainer_monitor.log")
}

/// Returns the annotated-image directory: `<exe_dir>/debug/`
pub fn get_debug_dir() -> PathBuf {
    get_exe_dir().join("debug")
}

/// Returns the default config file: `<exe_dir>/config.json`
pub fn get_default_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// `<dir>/<label>_<YYYYmmdd_HHMMSS>.png`
pub fn timestamped_png(dir: &Path, label: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}_{}.png", label, timestamp))
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_debug_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_png_name() {
        let path = timestamped_png(Path::new("debug"), "level");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("level_"));
        assert!(name.ends_with(".png"));
        // level_ + 8 digits + _ + 6 digits + .png
        assert_eq!(name.len(), "level_".len() + 15 + ".png".len());
    }
}
