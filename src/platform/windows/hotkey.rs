//! Global Ctrl+Shift+Q hotkey that raises the stop signal.

use std::thread::{self, JoinHandle};

use tracing::{info, warn};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

use crate::monitor::StopSignal;

const HOTKEY_STOP: i32 = 1;

/// Registers the hotkey on its own thread. With no window the `WM_HOTKEY`
/// message lands in that thread's queue.
pub fn spawn_stop_hotkey(stop: StopSignal) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stop-hotkey".to_string())
        .spawn(move || {
            let registered = unsafe {
                RegisterHotKey(
                    HWND::default(),
                    HOTKEY_STOP,
                    MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
                    0x51, // 'Q' key
                )
            };
            if let Err(e) = registered {
                warn!("Failed to register Ctrl+Shift+Q: {}", e);
                return;
            }
            info!("Hotkey: Ctrl+Shift+Q (stop monitoring)");

            let mut msg = MSG::default();
            unsafe {
                while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                    if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_STOP {
                        info!("Stop hotkey pressed");
                        stop.stop();
                        break;
                    }
                }
                let _ = UnregisterHotKey(HWND::default(), HOTKEY_STOP);
            }
        })
}
