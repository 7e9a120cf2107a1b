//! Finding, focusing and measuring the game window.

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use tracing::{debug, info};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowTextLengthW, GetWindowTextW, IsIconic, IsWindowVisible,
    SetForegroundWindow, ShowWindow, SW_RESTORE,
};

use crate::error::CaptureError;
use crate::platform::{WindowHandle, WindowManager};
use crate::vision::WindowRect;

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut core::ffi::c_void)
}

fn window_title(hwnd: HWND) -> String {
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return String::new();
        }
        let mut buf: Vec<u16> = vec![0; (len + 1) as usize];
        let copied = GetWindowTextW(hwnd, &mut buf);
        OsString::from_wide(&buf[..copied.max(0) as usize])
            .to_string_lossy()
            .to_string()
    }
}

/// Top-level windows via Win32.
pub struct Win32Windows;

impl WindowManager for Win32Windows {
    fn find_window(&self, title_substring: &str) -> Result<WindowHandle, CaptureError> {
        struct EnumData {
            needle: String,
            found: Option<(HWND, String)>,
        }

        unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
            unsafe {
                let data = &mut *(lparam.0 as *mut EnumData);
                if !IsWindowVisible(hwnd).as_bool() {
                    return TRUE;
                }
                let title = window_title(hwnd);
                if title.is_empty() || !title.to_lowercase().contains(&data.needle) {
                    return TRUE;
                }
                data.found = Some((hwnd, title));
                BOOL(0)
            }
        }

        let mut data = EnumData {
            needle: title_substring.to_lowercase(),
            found: None,
        };
        unsafe {
            // EnumWindows reports an error when the callback stops early.
            let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
        }

        match data.found {
            Some((hwnd, title)) => {
                debug!("Found window \"{}\" ({:?})", title, hwnd);
                Ok(WindowHandle(hwnd.0 as isize))
            }
            None => Err(CaptureError::WindowNotFound(title_substring.to_string())),
        }
    }

    fn focus(&self, handle: WindowHandle) -> Result<(), CaptureError> {
        let hwnd = hwnd(handle);
        unsafe {
            if IsIconic(hwnd).as_bool() {
                info!("Restoring minimised game window");
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            if !SetForegroundWindow(hwnd).as_bool() {
                return Err(CaptureError::FocusFailed(format!(
                    "SetForegroundWindow refused {:?}",
                    hwnd
                )));
            }
        }
        Ok(())
    }

    /// Client area in screen coordinates.
    fn bounds(&self, handle: WindowHandle) -> Result<WindowRect, CaptureError> {
        let hwnd = hwnd(handle);
        let mut client = RECT::default();
        unsafe { GetClientRect(hwnd, &mut client) }
            .map_err(|e| CaptureError::Failed(format!("GetClientRect: {}", e)))?;

        let mut origin = POINT { x: 0, y: 0 };
        if !unsafe { ClientToScreen(hwnd, &mut origin) }.as_bool() {
            return Err(CaptureError::Failed("ClientToScreen failed".to_string()));
        }

        Ok(WindowRect {
            left: origin.x,
            top: origin.y,
            width: (client.right - client.left).max(0) as u32,
            height: (client.bottom - client.top).max(0) as u32,
        })
    }
}
