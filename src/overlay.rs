//! Resize-metrics overlay — a small layered popup drawn next to the cursor
//! during an active resize, showing the current and starting dimensions.
//!
//! Architecture carried over from the teacher's snap-preview overlay: the
//! HWND is created on the thread that owns the real message loop (the
//! worker thread here, rather than the teacher's hook thread — this build
//! splits hook ownership from window ownership per the two-thread design),
//! and `show`/`hide`/`update_metrics` are safe to call from any thread since
//! `SetWindowPos`/`InvalidateRect` post to the owning thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Dwm::{DwmSetWindowAttribute, DWMWINDOWATTRIBUTE};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateSolidBrush, EndPaint, InvalidateRect, SetBkMode, SetTextColor, TextOutW,
    PAINTSTRUCT, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, SetLayeredWindowAttributes,
    SetWindowPos, ShowWindow, LWA_ALPHA, SET_WINDOW_POS_FLAGS, SWP_NOACTIVATE, SW_HIDE,
    WINDOW_EX_STYLE, WINDOW_STYLE, WM_PAINT, WNDCLASSW,
};

use crate::executor::OverlayMetrics;

#[derive(Clone, Copy)]
struct SendHwnd(HWND);
unsafe impl Send for SendHwnd {}
unsafe impl Sync for SendHwnd {}

static OVERLAY_HWND: OnceLock<SendHwnd> = OnceLock::new();
static OVERLAY_VISIBLE: AtomicBool = AtomicBool::new(false);
static CURRENT_METRICS: Mutex<Option<OverlayMetrics>> = Mutex::new(None);

const OVERLAY_BG: COLORREF = COLORREF(0x0030_3030);
const OVERLAY_ALPHA: u8 = 220;
const OVERLAY_WIDTH: i32 = 170;
const OVERLAY_HEIGHT: i32 = 26;
/// Offset from the dragged window's top-left so the label doesn't sit
/// directly under the cursor.
const OFFSET_X: i32 = 16;
const OFFSET_Y: i32 = -34;

const WS_POPUP: WINDOW_STYLE = WINDOW_STYLE(0x8000_0000);
const WS_EX_LAYERED: WINDOW_EX_STYLE = WINDOW_EX_STYLE(0x0008_0000);
const WS_EX_TRANSPARENT: WINDOW_EX_STYLE = WINDOW_EX_STYLE(0x0000_0020);
const WS_EX_TOPMOST: WINDOW_EX_STYLE = WINDOW_EX_STYLE(0x0000_0008);
const WS_EX_TOOLWINDOW: WINDOW_EX_STYLE = WINDOW_EX_STYLE(0x0000_0080);
const WS_EX_NOACTIVATE: WINDOW_EX_STYLE = WINDOW_EX_STYLE(0x0800_0000);
const SWP_SHOWWINDOW: SET_WINDOW_POS_FLAGS = SET_WINDOW_POS_FLAGS(0x0040);

const DWMWA_WINDOW_CORNER_PREFERENCE: DWMWINDOWATTRIBUTE = DWMWINDOWATTRIBUTE(33);
const DWMWCP_ROUND: i32 = 2;

fn wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn format_metrics(m: OverlayMetrics) -> String {
    if m.w == m.start_w && m.h == m.start_h {
        format!("{} x {}", m.w, m.h)
    } else {
        format!("{} x {}  (from {} x {})", m.w, m.h, m.start_w, m.start_h)
    }
}

unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_PAINT {
        paint(hwnd);
        return LRESULT(0);
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn paint(hwnd: HWND) {
    let mut ps = PAINTSTRUCT::default();
    let hdc = unsafe { BeginPaint(hwnd, &mut ps) };
    let text = CURRENT_METRICS
        .lock()
        .expect("overlay metrics mutex poisoned")
        .map(format_metrics)
        .unwrap_or_default();
    let wide = wide_string(&text);
    unsafe {
        SetBkMode(hdc, TRANSPARENT);
        SetTextColor(hdc, COLORREF(0x00FF_FFFF));
        let _ = TextOutW(hdc, 10, 5, &wide[..wide.len().saturating_sub(1)]);
        let _ = EndPaint(hwnd, &ps);
    }
}

/// Create the overlay window. Must be called from a thread with a message
/// loop (the worker thread).
pub fn create() {
    let class_name = wide_string("wingrip_resize_overlay");

    let instance = unsafe { GetModuleHandleW(None) }.unwrap_or_default();
    let brush = unsafe { CreateSolidBrush(OVERLAY_BG) };

    let wc = WNDCLASSW {
        lpfnWndProc: Some(overlay_wndproc),
        hInstance: instance.into(),
        lpszClassName: PCWSTR(class_name.as_ptr()),
        hbrBackground: brush,
        ..Default::default()
    };

    let atom = unsafe { RegisterClassW(&wc) };
    if atom == 0 {
        log::error!("overlay: RegisterClassW failed");
        return;
    }

    let ex_style = WINDOW_EX_STYLE(
        WS_EX_LAYERED.0
            | WS_EX_TRANSPARENT.0
            | WS_EX_TOPMOST.0
            | WS_EX_TOOLWINDOW.0
            | WS_EX_NOACTIVATE.0,
    );

    let hwnd = match unsafe {
        CreateWindowExW(
            ex_style,
            PCWSTR(class_name.as_ptr()),
            None,
            WS_POPUP,
            0,
            0,
            OVERLAY_WIDTH,
            OVERLAY_HEIGHT,
            None,
            None,
            Some(instance.into()),
            None,
        )
    } {
        Ok(h) => h,
        Err(e) => {
            log::error!("overlay: CreateWindowExW failed: {}", e);
            return;
        }
    };

    if hwnd.is_invalid() {
        log::error!("overlay: CreateWindowExW returned invalid HWND");
        return;
    }

    let _ = unsafe { SetLayeredWindowAttributes(hwnd, COLORREF(0), OVERLAY_ALPHA, LWA_ALPHA) };

    let _ = unsafe {
        DwmSetWindowAttribute(
            hwnd,
            DWMWA_WINDOW_CORNER_PREFERENCE,
            &DWMWCP_ROUND as *const i32 as *const _,
            std::mem::size_of::<i32>() as u32,
        )
    };

    let _ = OVERLAY_HWND.set(SendHwnd(hwnd));
    log::info!("overlay: created hwnd={:?}", hwnd);
}

/// Show the overlay near `(anchor_x, anchor_y)` with the given metrics.
/// Safe to call from any thread.
pub fn show(anchor_x: i32, anchor_y: i32, metrics: OverlayMetrics) {
    let Some(&SendHwnd(hwnd)) = OVERLAY_HWND.get() else {
        return;
    };

    *CURRENT_METRICS
        .lock()
        .expect("overlay metrics mutex poisoned") = Some(metrics);

    let topmost = HWND(-1isize as *mut std::ffi::c_void);
    unsafe {
        let _ = SetWindowPos(
            hwnd,
            Some(topmost),
            anchor_x + OFFSET_X,
            anchor_y + OFFSET_Y,
            OVERLAY_WIDTH,
            OVERLAY_HEIGHT,
            SET_WINDOW_POS_FLAGS(SWP_NOACTIVATE.0 | SWP_SHOWWINDOW.0),
        );
        let _ = InvalidateRect(Some(hwnd), None, true);
    }

    OVERLAY_VISIBLE.store(true, Ordering::Relaxed);
}

/// Hide the overlay. No-op if already hidden.
pub fn hide() {
    if !OVERLAY_VISIBLE.load(Ordering::Relaxed) {
        return;
    }
    if let Some(&SendHwnd(hwnd)) = OVERLAY_HWND.get() {
        unsafe {
            let _ = ShowWindow(hwnd, SW_HIDE);
        }
    }
    OVERLAY_VISIBLE.store(false, Ordering::Relaxed);
}

/// Destroy the overlay window. Call during shutdown.
pub fn destroy() {
    if let Some(&SendHwnd(hwnd)) = OVERLAY_HWND.get() {
        unsafe {
            let _ = DestroyWindow(hwnd);
        }
        log::info!("overlay: destroyed");
    }
}
