//! Window-manager collaborator (spec §6 "To the OS (output side)").
//!
//! `WindowId` and the [`WindowOps`]/[`WindowOpsExec`] traits are the seam the
//! gesture state machine and the executor are built against; [`Win32Ops`] is
//! the only implementation that talks to real `HWND`s. Kept and generalized
//! from the teacher's free functions of the same names.

use std::cell::Cell;
use std::collections::HashSet;
use std::path::Path;

use windows::core::PWSTR;
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ACCESS_DENIED, HWND, LPARAM, POINT, RECT,
};
use windows::Win32::System::Threading::{
    AttachThreadInput, GetCurrentThreadId, OpenProcess, QueryFullProcessImageNameW,
    PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetAncestor, GetClassNameW, GetDesktopWindow,
    GetForegroundWindow, GetWindowLongW, GetWindowRect, GetWindowThreadProcessId, IsWindow,
    IsWindowVisible, IsZoomed, SetForegroundWindow, SetWindowPos, ShowWindow, WindowFromPoint,
    GA_ROOT, GWL_STYLE, HWND_BOTTOM, HWND_TOP, SET_WINDOW_POS_FLAGS, SWP_NOACTIVATE, SWP_NOMOVE,
    SWP_NOSIZE, SWP_NOZORDER, SW_RESTORE, WS_CHILD,
};

use crate::geometry::{Point as CorePoint, Rect as CoreRect};

/// Raw-pointer-free handle, `Copy`/`Send`/`Sync`, usable from gesture-engine
/// code and tests without pulling in `windows::Win32::Foundation::HWND`
/// (which does not implement `Send`/`Sync` in `windows` 0.61).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

impl WindowId {
    fn to_hwnd(self) -> HWND {
        HWND(self.0 as *mut std::ffi::c_void)
    }

    fn from_hwnd(hwnd: HWND) -> Self {
        WindowId(hwnd.0 as isize)
    }
}

const SWP_NOOWNERZORDER: SET_WINDOW_POS_FLAGS = SET_WINDOW_POS_FLAGS(0x0200);

/// Synchronous move, no size change — most Win10/11 windows have thick
/// invisible DWM borders, so a synchronous call is responsive enough and
/// avoids the extra round trip `SWP_ASYNCWINDOWPOS` would need.
const MOVE_FLAGS: SET_WINDOW_POS_FLAGS =
    SET_WINDOW_POS_FLAGS(SWP_NOZORDER.0 | SWP_NOOWNERZORDER.0 | SWP_NOACTIVATE.0 | SWP_NOSIZE.0);

const RESIZE_FLAGS: SET_WINDOW_POS_FLAGS =
    SET_WINDOW_POS_FLAGS(SWP_NOZORDER.0 | SWP_NOOWNERZORDER.0 | SWP_NOACTIVATE.0);

thread_local! {
    /// Whether the most recent `move_window`/`resize_window` call failed with
    /// `ERROR_ACCESS_DENIED`. Set immediately after the `SetWindowPos` call
    /// that produced it — `GetLastError` is only reliable right after the
    /// call that set it, so this must not wait until some later point (e.g.
    /// after bookkeeping that itself makes syscalls) to be read.
    static LAST_ACCESS_DENIED: Cell<bool> = Cell::new(false);
}

fn record_set_window_pos_result(result: windows::core::Result<()>) {
    let denied = result.is_err() && unsafe { GetLastError() } == ERROR_ACCESS_DENIED;
    LAST_ACCESS_DENIED.with(|c| c.set(denied));
}

fn to_core_rect(r: RECT) -> CoreRect {
    CoreRect::new(r.left, r.top, r.right, r.bottom)
}

fn is_system_class_name(class_name: &str) -> bool {
    let lower = class_name.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "shell_traywnd" | "progman" | "workerw" | "shell_secondarytraywnd"
    )
}

fn get_window_class_name(hwnd: HWND) -> Option<String> {
    let mut buffer = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buffer) };
    if len <= 0 {
        return None;
    }
    Some(String::from_utf16_lossy(&buffer[..len as usize]))
}

fn is_system_window(hwnd: HWND) -> bool {
    get_window_class_name(hwnd)
        .map(|name| is_system_class_name(&name))
        .unwrap_or(false)
}

/// Queries against top-level windows that the gesture state machine needs
/// (spec §4.3/§4.5). Abstracted so gesture/executor logic can be driven by a
/// fake in unit tests.
pub trait WindowOps {
    fn window_from_point(&self, p: CorePoint) -> Option<WindowId>;
    fn is_valid_target(&self, w: WindowId) -> bool;
    fn get_window_rect(&self, w: WindowId) -> Option<CoreRect>;
    fn get_foreground_window(&self) -> Option<WindowId>;
    fn get_process_name(&self, w: WindowId) -> Option<String>;
    fn is_maximized(&self, w: WindowId) -> bool;
    fn restore_window(&self, w: WindowId);
}

/// The output-side calls the executor needs (spec §4.5/§6).
pub trait WindowOpsExec: WindowOps {
    fn move_window(&self, w: WindowId, x: i32, y: i32);
    fn resize_window(&self, w: WindowId, x: i32, y: i32, width: i32, height: i32);
    /// Attempts a thread-attached foreground change. Returns false on
    /// refusal (focus-stealing prevention).
    fn set_foreground(&self, w: WindowId) -> bool;
    fn bring_to_top(&self, w: WindowId);
    fn send_to_bottom(&self, w: WindowId);
    /// True if the most recent failed call above failed with the OS's
    /// access-denied code (elevated target).
    fn last_call_was_access_denied(&self) -> bool;
}

/// The real implementation, talking to live `HWND`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Ops;

impl WindowOps for Win32Ops {
    fn window_from_point(&self, p: CorePoint) -> Option<WindowId> {
        let hwnd = unsafe { WindowFromPoint(POINT { x: p.x, y: p.y }) };
        if hwnd.is_invalid() {
            return None;
        }
        let root = unsafe { GetAncestor(hwnd, GA_ROOT) };
        if root.is_invalid() {
            return None;
        }
        if root == unsafe { GetDesktopWindow() } || is_system_window(root) {
            return None;
        }
        Some(WindowId::from_hwnd(root))
    }

    fn is_valid_target(&self, w: WindowId) -> bool {
        let hwnd = w.to_hwnd();
        if hwnd.is_invalid() {
            return false;
        }
        if !unsafe { IsWindow(Some(hwnd)).as_bool() } {
            return false;
        }
        if !unsafe { IsWindowVisible(hwnd).as_bool() } {
            return false;
        }
        if hwnd == unsafe { GetDesktopWindow() } || is_system_window(hwnd) {
            return false;
        }
        let root = unsafe { GetAncestor(hwnd, GA_ROOT) };
        if root != hwnd {
            return false;
        }
        let style = unsafe { GetWindowLongW(hwnd, GWL_STYLE) } as u32;
        if style & WS_CHILD.0 != 0 {
            return false;
        }
        true
    }

    fn get_window_rect(&self, w: WindowId) -> Option<CoreRect> {
        let mut rect = RECT::default();
        if unsafe { GetWindowRect(w.to_hwnd(), &mut rect) }.is_ok() {
            Some(to_core_rect(rect))
        } else {
            None
        }
    }

    fn get_foreground_window(&self) -> Option<WindowId> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            None
        } else {
            Some(WindowId::from_hwnd(hwnd))
        }
    }

    fn get_process_name(&self, w: WindowId) -> Option<String> {
        let hwnd = w.to_hwnd();
        let mut process_id = 0u32;
        unsafe {
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        }
        if process_id == 0 {
            return None;
        }
        let process =
            unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()? };
        let mut buffer = vec![0u16; 1024];
        let mut size = buffer.len() as u32;
        let query_result = unsafe {
            QueryFullProcessImageNameW(
                process,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &mut size,
            )
        };
        let _ = unsafe { CloseHandle(process) };
        if query_result.is_err() || size == 0 {
            return None;
        }
        let full_path = String::from_utf16_lossy(&buffer[..size as usize]);
        let file_name = Path::new(&full_path).file_name()?.to_str()?;
        Some(file_name.to_string())
    }

    fn is_maximized(&self, w: WindowId) -> bool {
        unsafe { IsZoomed(w.to_hwnd()).as_bool() }
    }

    fn restore_window(&self, w: WindowId) {
        unsafe {
            let _ = ShowWindow(w.to_hwnd(), SW_RESTORE);
        }
    }
}

impl WindowOpsExec for Win32Ops {
    fn move_window(&self, w: WindowId, x: i32, y: i32) {
        let result = unsafe { SetWindowPos(w.to_hwnd(), None, x, y, 0, 0, MOVE_FLAGS) };
        record_set_window_pos_result(result);
    }

    fn resize_window(&self, w: WindowId, x: i32, y: i32, width: i32, height: i32) {
        if width <= 0 || height <= 0 {
            return;
        }
        let result = unsafe { SetWindowPos(w.to_hwnd(), None, x, y, width, height, RESIZE_FLAGS) };
        record_set_window_pos_result(result);
    }

    fn set_foreground(&self, w: WindowId) -> bool {
        let hwnd = w.to_hwnd();
        unsafe {
            let foreground = GetForegroundWindow();
            let fg_tid = GetWindowThreadProcessId(foreground, None);
            let this_tid = GetCurrentThreadId();
            if fg_tid != this_tid {
                let _ = AttachThreadInput(this_tid, fg_tid, true);
                let ok = SetForegroundWindow(hwnd).as_bool();
                let _ = AttachThreadInput(this_tid, fg_tid, false);
                ok
            } else {
                SetForegroundWindow(hwnd).as_bool()
            }
        }
    }

    fn bring_to_top(&self, w: WindowId) {
        unsafe {
            let _ = BringWindowToTop(w.to_hwnd());
            let _ = SetWindowPos(
                w.to_hwnd(),
                Some(HWND_TOP),
                0,
                0,
                0,
                0,
                SET_WINDOW_POS_FLAGS(SWP_NOMOVE.0 | SWP_NOSIZE.0 | SWP_NOACTIVATE.0),
            );
        }
    }

    fn send_to_bottom(&self, w: WindowId) {
        unsafe {
            let _ = SetWindowPos(
                w.to_hwnd(),
                Some(HWND_BOTTOM),
                0,
                0,
                0,
                0,
                SET_WINDOW_POS_FLAGS(SWP_NOMOVE.0 | SWP_NOSIZE.0 | SWP_NOACTIVATE.0),
            );
        }
    }

    fn last_call_was_access_denied(&self) -> bool {
        LAST_ACCESS_DENIED.with(|c| c.get())
    }
}

unsafe extern "system" fn enum_windows_proc(hwnd: HWND, lparam: LPARAM) -> windows::core::BOOL {
    let id = WindowId::from_hwnd(hwnd);
    if !Win32Ops.is_valid_target(id) {
        return windows::core::BOOL(1);
    }
    if let Some(name) = Win32Ops.get_process_name(id) {
        let names = &mut *(lparam.0 as *mut HashSet<String>);
        names.insert(name);
    }
    windows::core::BOOL(1)
}

pub fn get_running_process_names() -> Vec<String> {
    let mut names = HashSet::<String>::new();
    let ptr = &mut names as *mut HashSet<String>;
    unsafe {
        let _ = EnumWindows(Some(enum_windows_proc), LPARAM(ptr as isize));
    }
    let mut result: Vec<String> = names.into_iter().collect();
    result.sort_unstable_by_key(|s| s.to_ascii_lowercase());
    result
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory `WindowOps`/`WindowOpsExec` double for gesture/executor
    /// unit tests. Every mutating call is recorded so tests can assert on
    /// what would have been sent to the OS.
    #[derive(Default)]
    pub struct FakeOps {
        pub rects: RefCell<HashMap<WindowId, CoreRect>>,
        pub valid: RefCell<HashMap<WindowId, bool>>,
        pub foreground: RefCell<Option<WindowId>>,
        pub maximized: RefCell<HashMap<WindowId, bool>>,
        pub process_names: RefCell<HashMap<WindowId, String>>,
        pub moves: RefCell<Vec<(WindowId, i32, i32)>>,
        pub resizes: RefCell<Vec<(WindowId, i32, i32, i32, i32)>>,
        pub z_changes: RefCell<Vec<(WindowId, &'static str)>>,
        pub deny_access: RefCell<bool>,
        pub focus_calls: RefCell<Vec<WindowId>>,
        /// When set, `resize_window` reports this size instead of the
        /// requested one on its *next* call — simulates the OS clamping to a
        /// window's true minimum.
        pub clamp_to: RefCell<Option<(i32, i32)>>,
    }

    impl FakeOps {
        pub fn with_window(self, id: WindowId, rect: CoreRect) -> Self {
            self.rects.borrow_mut().insert(id, rect);
            self.valid.borrow_mut().insert(id, true);
            self
        }
    }

    impl WindowOps for FakeOps {
        fn window_from_point(&self, p: CorePoint) -> Option<WindowId> {
            self.rects
                .borrow()
                .iter()
                .find(|(_, r)| p.x >= r.left && p.x < r.right && p.y >= r.top && p.y < r.bottom)
                .map(|(id, _)| *id)
        }

        fn is_valid_target(&self, w: WindowId) -> bool {
            *self.valid.borrow().get(&w).unwrap_or(&false)
        }

        fn get_window_rect(&self, w: WindowId) -> Option<CoreRect> {
            self.rects.borrow().get(&w).copied()
        }

        fn get_foreground_window(&self) -> Option<WindowId> {
            *self.foreground.borrow()
        }

        fn get_process_name(&self, w: WindowId) -> Option<String> {
            self.process_names.borrow().get(&w).cloned()
        }

        fn is_maximized(&self, w: WindowId) -> bool {
            *self.maximized.borrow().get(&w).unwrap_or(&false)
        }

        fn restore_window(&self, w: WindowId) {
            self.maximized.borrow_mut().insert(w, false);
        }
    }

    impl WindowOpsExec for FakeOps {
        fn move_window(&self, w: WindowId, x: i32, y: i32) {
            if *self.deny_access.borrow() {
                return;
            }
            self.moves.borrow_mut().push((w, x, y));
            if let Some(r) = self.rects.borrow_mut().get_mut(&w) {
                let (dx, dy) = (x - r.left, y - r.top);
                *r = r.translated(dx, dy);
            }
        }

        fn resize_window(&self, w: WindowId, x: i32, y: i32, width: i32, height: i32) {
            if *self.deny_access.borrow() {
                return;
            }
            let (actual_w, actual_h) = self.clamp_to.borrow_mut().take().unwrap_or((width, height));
            self.resizes.borrow_mut().push((w, x, y, actual_w, actual_h));
            self.rects
                .borrow_mut()
                .insert(w, CoreRect::new(x, y, x + actual_w, y + actual_h));
        }

        fn set_foreground(&self, w: WindowId) -> bool {
            self.focus_calls.borrow_mut().push(w);
            *self.foreground.borrow_mut() = Some(w);
            true
        }

        fn bring_to_top(&self, w: WindowId) {
            self.z_changes.borrow_mut().push((w, "top"));
        }

        fn send_to_bottom(&self, w: WindowId) {
            self.z_changes.borrow_mut().push((w, "bottom"));
        }

        fn last_call_was_access_denied(&self) -> bool {
            *self.deny_access.borrow()
        }
    }
}
