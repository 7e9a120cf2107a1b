//! Screen capture through GDI.
//!
//! The blit runs on a worker thread so a wedged desktop (UAC prompt,
//! display mode switch) surfaces as `CaptureError::Timeout` instead of
//! hanging the loop.

use std::sync::mpsc;
use std::time::Duration;

use image::{ImageBuffer, Rgba, RgbaImage};
use tracing::{debug, warn};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use crate::error::CaptureError;
use crate::platform::ScreenshotSource;
use crate::vision::{PixelRect, Screenshot};

pub struct GdiCapture {
    timeout: Duration,
}

impl GdiCapture {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ScreenshotSource for GdiCapture {
    fn capture(&self, region: Option<&PixelRect>) -> Result<Screenshot, CaptureError> {
        let rect = match region {
            Some(rect) => *rect,
            None => primary_screen()?,
        };

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("gdi-capture".to_string())
            .spawn(move || {
                let _ = tx.send(blit(&rect));
            })
            .map_err(|e| CaptureError::Failed(format!("capture thread: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => {
                let img = result?;
                debug!("Captured {}x{} at ({}, {})", rect.width, rect.height, rect.x, rect.y);
                Ok(Screenshot::new(img))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("Capture did not finish within {:?}", self.timeout);
                Err(CaptureError::Timeout(self.timeout.as_millis() as u64))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(CaptureError::Failed("capture thread exited".to_string()))
            }
        }
    }
}

fn primary_screen() -> Result<PixelRect, CaptureError> {
    let width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
    let height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
    if width <= 0 || height <= 0 {
        return Err(CaptureError::Failed("screen size unavailable".to_string()));
    }
    Ok(PixelRect {
        x: 0,
        y: 0,
        width: width as u32,
        height: height as u32,
    })
}

fn blit(rect: &PixelRect) -> Result<RgbaImage, CaptureError> {
    let width = rect.width as i32;
    let height = rect.height as i32;
    let mut pixels = vec![0u8; rect.width as usize * rect.height as usize * 4];

    unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            return Err(CaptureError::Failed("GetDC failed".to_string()));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        let previous = SelectObject(mem_dc, bitmap);

        let copied = BitBlt(
            mem_dc,
            0,
            0,
            width,
            height,
            screen_dc,
            rect.x as i32,
            rect.y as i32,
            SRCCOPY,
        );

        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // Negative height: top-down rows
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let lines = if copied.is_ok() {
            GetDIBits(
                mem_dc,
                bitmap,
                0,
                rect.height,
                Some(pixels.as_mut_ptr() as *mut core::ffi::c_void),
                &mut info,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        SelectObject(mem_dc, previous);
        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        ReleaseDC(HWND::default(), screen_dc);

        copied.map_err(|e| CaptureError::Failed(format!("BitBlt: {}", e)))?;
        if lines != height {
            return Err(CaptureError::Failed(format!(
                "GetDIBits copied {} of {} lines",
                lines, height
            )));
        }
    }

    // BGRA -> RGBA
    let img: RgbaImage = ImageBuffer::from_fn(rect.width, rect.height, |x, y| {
        let offset = (y as usize * rect.width as usize + x as usize) * 4;
        Rgba([pixels[offset + 2], pixels[offset + 1], pixels[offset], 255])
    });
    Ok(img)
}
