//! Shell-Suppression Injector (spec §4.2).
//!
//! Windows opens the Start menu (or the application system menu) when a bare
//! Win (or Alt) press-release round-trip reaches the shell with nothing else
//! having consumed it. Once a gesture has consumed that same hold, the
//! release must be poisoned so the shell never sees a clean tap — the fix
//! this module exists for.
//!
//! Grounded on the sibling pack's `send_keyup` helper: inject a single
//! harmless key via `SendInput` with `KEYEVENTF_KEYUP` and the unassigned
//! `VK__none_` code, the same virtual key that example's default `Config`
//! sends. `SendInput` must only ever be called from the worker thread — the
//! hook callback itself must return immediately, so this function is not
//! exposed as something the hook thread can call directly; it is invoked via
//! a control message posted to the worker's queue.

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
    MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEINPUT,
    VK__none_,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN,
};

use crate::geometry::Point;

/// The sentinel stamped into `dwExtraInfo` on every input this process
/// injects, so the low-level hook can recognize and ignore its own
/// synthetic events instead of looping back into the gesture machine.
pub const INJECTED_EVENT_SENTINEL: usize = 0x57_4B_47_52; // "WKGR"

/// Sends a single key-up for an unassigned virtual key. Windows treats this
/// as "some key was involved in this modifier hold" and skips opening the
/// shell menu on the real Win/Alt release that follows.
///
/// Must be called from the worker thread only (spec §5: `SendInput` from
/// inside a low-level hook callback is undefined behavior).
pub fn poison_solo_modifier() -> std::io::Result<()> {
    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VK__none_,
                dwFlags: KEYEVENTF_KEYUP,
                dwExtraInfo: INJECTED_EVENT_SENTINEL,
                ..Default::default()
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != 1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Synthesizes a left click at `point` (screen coordinates) to force focus
/// onto a window whose owning process refuses `SetForegroundWindow` — the
/// `lmb_focus_fallback` toggle's implementation (off by default: injecting a
/// click is more intrusive than a silent focus-request failure).
///
/// Uses absolute, normalized coordinates across the full virtual desktop so
/// it lands correctly on multi-monitor layouts with negative origins.
pub fn synthetic_click(point: Point) -> std::io::Result<()> {
    let vx = unsafe { GetSystemMetrics(SM_XVIRTUALSCREEN) };
    let vy = unsafe { GetSystemMetrics(SM_YVIRTUALSCREEN) };
    let vw = unsafe { GetSystemMetrics(SM_CXVIRTUALSCREEN) }.max(1);
    let vh = unsafe { GetSystemMetrics(SM_CYVIRTUALSCREEN) }.max(1);

    let norm_x = (((point.x - vx) as i64 * 65535) / vw as i64) as i32;
    let norm_y = (((point.y - vy) as i64 * 65535) / vh as i64) as i32;

    let mouse_input = |flags, dx, dy| INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: INJECTED_EVENT_SENTINEL,
            },
        },
    };

    let inputs = [
        mouse_input(MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE, norm_x, norm_y),
        mouse_input(MOUSEEVENTF_LEFTDOWN | MOUSEEVENTF_ABSOLUTE, norm_x, norm_y),
        mouse_input(MOUSEEVENTF_LEFTUP | MOUSEEVENTF_ABSOLUTE, norm_x, norm_y),
    ];
    let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}
