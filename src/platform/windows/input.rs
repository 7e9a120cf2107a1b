//! Mouse and keyboard input through SendInput.
//!
//! SendInput simulates hardware-level input, which the game's input layer
//! accepts where posted window messages are ignored. Keys are sent as scan
//! codes for the same reason. The game window must be in the foreground.

use tracing::debug;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE,
    MAPVK_VK_TO_VSC, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS,
    VIRTUAL_KEY, VK_BACK, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_F1, VK_HOME,
    VK_LEFT, VK_MENU, VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SPACE, VK_TAB, VK_UP,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use crate::error::InputError;
use crate::platform::InputInjector;

/// Maps a key name to its virtual-key code.
fn virtual_key(name: &str) -> Option<VIRTUAL_KEY> {
    let name = name.to_ascii_lowercase();
    let vk = match name.as_str() {
        "space" => VK_SPACE,
        "enter" => VK_RETURN,
        "escape" | "esc" => VK_ESCAPE,
        "tab" => VK_TAB,
        "backspace" => VK_BACK,
        "shift" => VK_SHIFT,
        "ctrl" => VK_CONTROL,
        "alt" => VK_MENU,
        "up" => VK_UP,
        "down" => VK_DOWN,
        "left" => VK_LEFT,
        "right" => VK_RIGHT,
        "home" => VK_HOME,
        "end" => VK_END,
        "delete" => VK_DELETE,
        _ => {
            if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u16>().ok()) {
                if (1..=12).contains(&n) {
                    return Some(VIRTUAL_KEY(VK_F1.0 + n - 1));
                }
                return None;
            }
            let mut chars = name.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_lowercase() || c.is_ascii_digit() => {
                    Some(VIRTUAL_KEY(c.to_ascii_uppercase() as u16))
                }
                _ => None,
            };
        }
    };
    Some(vk)
}

fn is_extended(vk: VIRTUAL_KEY) -> bool {
    [VK_UP, VK_DOWN, VK_LEFT, VK_RIGHT, VK_HOME, VK_END, VK_DELETE].contains(&vk)
}

fn send(inputs: &[INPUT]) -> Result<(), InputError> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(InputError::Failed(format!(
            "SendInput delivered {} of {} events",
            sent,
            inputs.len()
        )));
    }
    Ok(())
}

fn mouse(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                dwFlags: flags,
                ..Default::default()
            },
        },
    }
}

fn keyboard(name: &str, up: bool) -> Result<INPUT, InputError> {
    let vk = virtual_key(name).ok_or_else(|| InputError::UnknownKey(name.to_string()))?;
    let scan = unsafe { MapVirtualKeyW(vk.0 as u32, MAPVK_VK_TO_VSC) } as u16;

    let mut flags = KEYEVENTF_SCANCODE;
    if up {
        flags |= KEYEVENTF_KEYUP;
    }
    if is_extended(vk) {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    Ok(INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: scan,
                dwFlags: flags,
                ..Default::default()
            },
        },
    })
}

pub struct SendInputInjector;

impl InputInjector for SendInputInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<(), InputError> {
        let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if screen_width <= 0 || screen_height <= 0 {
            return Err(InputError::Failed("screen size unavailable".to_string()));
        }

        // Normalize to 0-65535 range (required by MOUSEEVENTF_ABSOLUTE)
        let norm_x = ((x as i64 * 65535) / screen_width as i64) as i32;
        let norm_y = ((y as i64 * 65535) / screen_height as i64) as i32;
        debug!("move_to ({}, {}) -> normalized ({}, {})", x, y, norm_x, norm_y);
        send(&[mouse(norm_x, norm_y, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE)])
    }

    fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
        send(&[mouse(dx, dy, MOUSEEVENTF_MOVE)])
    }

    fn click(&self) -> Result<(), InputError> {
        send(&[
            mouse(0, 0, MOUSEEVENTF_LEFTDOWN),
            mouse(0, 0, MOUSEEVENTF_LEFTUP),
        ])
    }

    fn right_click(&self) -> Result<(), InputError> {
        send(&[
            mouse(0, 0, MOUSEEVENTF_RIGHTDOWN),
            mouse(0, 0, MOUSEEVENTF_RIGHTUP),
        ])
    }

    fn key_down(&self, key: &str) -> Result<(), InputError> {
        send(&[keyboard(key, false)?])
    }

    fn key_up(&self, key: &str) -> Result<(), InputError> {
        send(&[keyboard(key, true)?])
    }
}
