//! Collaborators the monitor drives but does not implement.
//!
//! The monitoring loop only sees these traits. Win32 and audio backends
//! live under `windows` and are compiled on Windows only; the Discord sink
//! is portable. Tests substitute in-memory fakes.

pub mod discord;
#[cfg(windows)]
pub mod windows;

use std::path::Path;
use std::time::Duration;

use crate::error::{AudioError, CaptureError, InputError, NotifyError};
use crate::vision::{PixelRect, Screenshot, WindowRect};

/// Synthetic mouse and keyboard input.
///
/// Key names are lowercase: letters, digits, `space`, `enter`, `escape`,
/// `tab`, `f1`..`f12`.
pub trait InputInjector {
    /// Moves the cursor to absolute screen coordinates.
    fn move_to(&self, x: i32, y: i32) -> Result<(), InputError>;
    fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError>;
    fn click(&self) -> Result<(), InputError>;
    fn right_click(&self) -> Result<(), InputError>;
    fn key_down(&self, key: &str) -> Result<(), InputError>;
    fn key_up(&self, key: &str) -> Result<(), InputError>;

    /// Press and release.
    fn tap(&self, key: &str) -> Result<(), InputError> {
        self.key_down(key)?;
        self.key_up(key)
    }

    /// Keeps `key` down for `duration`. The key is released even if the
    /// press itself failed halfway.
    fn hold(&self, key: &str, duration: Duration) -> Result<(), InputError> {
        let pressed = self.key_down(key);
        if pressed.is_ok() {
            std::thread::sleep(duration);
        }
        let released = self.key_up(key);
        pressed.and(released)
    }
}

/// Opaque window identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowHandle(pub isize);

pub trait WindowManager {
    /// First visible top-level window whose title contains `title_substring`.
    fn find_window(&self, title_substring: &str) -> Result<WindowHandle, CaptureError>;
    fn focus(&self, handle: WindowHandle) -> Result<(), CaptureError>;
    fn bounds(&self, handle: WindowHandle) -> Result<WindowRect, CaptureError>;
}

pub trait ScreenshotSource {
    /// Captures `region` of the virtual screen, or the whole primary
    /// screen when `None`.
    fn capture(&self, region: Option<&PixelRect>) -> Result<Screenshot, CaptureError>;
}

/// Sound playback. Callers log failures and move on.
pub trait AudioPlayer {
    fn play(&self, path: &Path) -> Result<(), AudioError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A fully rendered outbound message.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub severity: Severity,
    pub content: String,
    /// PNG bytes.
    pub attachment: Option<Vec<u8>>,
}

pub trait NotificationSink {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Stands in for audio on platforms without a backend.
pub struct SilentAudio;

impl AudioPlayer for SilentAudio {
    fn play(&self, path: &Path) -> Result<(), AudioError> {
        tracing::debug!("Audio disabled, skipping {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Keys(RefCell<Vec<String>>);

    impl InputInjector for Keys {
        fn move_to(&self, _x: i32, _y: i32) -> Result<(), InputError> {
            Ok(())
        }
        fn move_by(&self, _dx: i32, _dy: i32) -> Result<(), InputError> {
            Ok(())
        }
        fn click(&self) -> Result<(), InputError> {
            Ok(())
        }
        fn right_click(&self) -> Result<(), InputError> {
            Ok(())
        }
        fn key_down(&self, key: &str) -> Result<(), InputError> {
            if key == "bad" {
                return Err(InputError::UnknownKey(key.to_string()));
            }
            self.0.borrow_mut().push(format!("down {}", key));
            Ok(())
        }
        fn key_up(&self, key: &str) -> Result<(), InputError> {
            self.0.borrow_mut().push(format!("up {}", key));
            Ok(())
        }
    }

    #[test]
    fn test_tap_and_hold() {
        let keys = Keys::default();
        keys.tap("q").unwrap();
        keys.hold("w", Duration::from_millis(1)).unwrap();
        assert_eq!(*keys.0.borrow(), ["down q", "up q", "down w", "up w"]);
    }

    #[test]
    fn test_hold_releases_after_failed_press() {
        let keys = Keys::default();
        assert!(keys.hold("bad", Duration::from_millis(1)).is_err());
        assert_eq!(*keys.0.borrow(), ["up bad"]);
    }

    #[test]
    fn test_silent_audio() {
        assert!(SilentAudio.play(Path::new("sounds/start.mp3")).is_ok());
    }
}
