//! Win32 and rodio implementations of the collaborator traits.

mod audio;
mod capture;
mod hotkey;
mod input;
mod window;

pub use audio::RodioPlayer;
pub use capture::GdiCapture;
pub use hotkey::spawn_stop_hotkey;
pub use input::SendInputInjector;
pub use window::Win32Windows;
