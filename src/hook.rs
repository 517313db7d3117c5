//! Hook thread (spec §5): owns the two low-level Win32 hooks and nothing
//! else. It never touches a window, never calls `SendInput`, and never
//! blocks — every side effect it decides on is handed off to the worker
//! thread as a custom thread message or a queued [`WindowCommand`].
//!
//! The [`crate::gesture::GestureMachine`] and [`ModifierTracker`] live in
//! `thread_local!` storage (the `kanata` oskbd hook's pattern) since both
//! hook callbacks run serially on this one thread — no locking needed.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VK_CONTROL, VK_LCONTROL, VK_LMENU, VK_LSHIFT, VK_LWIN, VK_MENU, VK_RCONTROL,
    VK_RMENU, VK_RSHIFT, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL,
    WH_MOUSE_LL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_RBUTTONDOWN,
    WM_RBUTTONUP, WM_SYSKEYDOWN,
};

use crate::config::{AppConfig, FilterMode};
use crate::coords::pack_point;
use crate::executor::LearnedMinimum;
use crate::geometry::Point;
use crate::gesture::{Button, Effect, GestureMachine};
use crate::modifier::{ModifierSnapshot, ModifierTracker, MOD_WIN};
use crate::suppression::INJECTED_EVENT_SENTINEL;
use crate::transport::CommandProducer;
use crate::window_manager::{Win32Ops, WindowOps};

/// Not re-exported by the `windows` crate features this build enables — the
/// teacher defines these the same way rather than pulling in a broader
/// feature set for one constant.
const WM_MBUTTONDOWN: u32 = 0x0207;

/// Custom thread messages posted between the hook and worker threads.
/// wParam/lParam carry payloads as documented at each use site.
pub mod ctrl {
    pub const WORK_AVAILABLE: u32 = 0x8000 + 1;
    pub const REQUEST_FOCUS: u32 = 0x8000 + 2;
    pub const POISON_SOLO_MODIFIER: u32 = 0x8000 + 3;
    pub const END_DRAG: u32 = 0x8000 + 4;
    pub const HARD_RESET: u32 = 0x8000 + 5;
}

thread_local! {
    static GESTURE: RefCell<GestureMachine> = RefCell::new(GestureMachine::new());
    static MOD_TRACKER: RefCell<ModifierTracker> = RefCell::new(ModifierTracker::new());
}

static MODIFIER_STATE: AtomicU32 = AtomicU32::new(0);
static HOOK_ENABLED: AtomicBool = AtomicBool::new(true);
static HOOK_PANICKED: AtomicBool = AtomicBool::new(false);
static WORKER_TID: AtomicU32 = AtomicU32::new(0);
static COMMAND_TX: OnceLock<CommandProducer> = OnceLock::new();
static FEEDBACK_RX: OnceLock<Receiver<LearnedMinimum>> = OnceLock::new();
static SHARED_CONFIG: OnceLock<Arc<Mutex<AppConfig>>> = OnceLock::new();

pub fn set_worker_tid(tid: u32) {
    WORKER_TID.store(tid, Ordering::Release);
}

/// Shares the live config with the hook thread so mouse-down can decide
/// whether a grab is allowed without a round trip to the worker.
pub fn set_config(config: Arc<Mutex<AppConfig>>) {
    let _ = SHARED_CONFIG.set(config);
}

fn process_allowed(config: &AppConfig, process_name: &str) -> bool {
    let process_name = process_name.to_ascii_lowercase();
    let listed = config
        .filter_list
        .iter()
        .map(|entry| entry.trim().to_ascii_lowercase())
        .any(|entry| entry == process_name);

    match config.filter_mode {
        FilterMode::Whitelist => listed,
        FilterMode::Blacklist => !listed,
    }
}

/// Gate for starting a fresh move/resize grab (spec §4.3 "process
/// filtering"/"foreground-only mode"). The z-order chord bypasses this, the
/// same way the teacher's middle-click toggle never consulted the filter.
fn move_resize_grab_allowed(cursor: Point) -> bool {
    let Some(config_lock) = SHARED_CONFIG.get() else {
        return true;
    };
    let config = config_lock.lock();
    if !config.enabled {
        return false;
    }

    let Some(target) = Win32Ops.window_from_point(cursor) else {
        return true;
    };
    if !Win32Ops.is_valid_target(target) {
        return true;
    }

    if !config.allow_nonforeground && Win32Ops.get_foreground_window() != Some(target) {
        return false;
    }

    match Win32Ops.get_process_name(target) {
        Some(name) => process_allowed(&config, &name),
        None => true,
    }
}

fn worker_tid() -> u32 {
    WORKER_TID.load(Ordering::Acquire)
}

fn post_to_worker(msg: u32, wparam: usize, lparam: isize) {
    let tid = worker_tid();
    if tid == 0 {
        return;
    }
    let _ = unsafe { PostThreadMessageW(tid, msg, WPARAM(wparam), LPARAM(lparam)) };
}

fn key_to_mask(vk_code: u32) -> Option<u32> {
    if vk_code == VK_LMENU.0 as u32 || vk_code == VK_RMENU.0 as u32 || vk_code == VK_MENU.0 as u32 {
        return Some(crate::modifier::MOD_ALT);
    }
    if vk_code == VK_LCONTROL.0 as u32
        || vk_code == VK_RCONTROL.0 as u32
        || vk_code == VK_CONTROL.0 as u32
    {
        return Some(crate::modifier::MOD_CTRL);
    }
    if vk_code == VK_LSHIFT.0 as u32 || vk_code == VK_RSHIFT.0 as u32 || vk_code == VK_SHIFT.0 as u32
    {
        return Some(crate::modifier::MOD_SHIFT);
    }
    if vk_code == VK_LWIN.0 as u32 || vk_code == VK_RWIN.0 as u32 {
        return Some(MOD_WIN);
    }
    None
}

fn is_virtual_key_down(vk: i32) -> bool {
    (unsafe { GetAsyncKeyState(vk) } as u16 & 0x8000) != 0
}

/// Polls the physical keyboard. Used only for the initial sync on startup
/// and to re-anchor after a session unlock (spec §4.1 "desync recovery").
fn refresh_modifier_state_from_keyboard() -> u32 {
    let mut mods = 0u32;
    if is_virtual_key_down(VK_LMENU.0 as i32)
        || is_virtual_key_down(VK_RMENU.0 as i32)
        || is_virtual_key_down(VK_MENU.0 as i32)
    {
        mods |= crate::modifier::MOD_ALT;
    }
    if is_virtual_key_down(VK_LCONTROL.0 as i32)
        || is_virtual_key_down(VK_RCONTROL.0 as i32)
        || is_virtual_key_down(VK_CONTROL.0 as i32)
    {
        mods |= crate::modifier::MOD_CTRL;
    }
    if is_virtual_key_down(VK_LSHIFT.0 as i32)
        || is_virtual_key_down(VK_RSHIFT.0 as i32)
        || is_virtual_key_down(VK_SHIFT.0 as i32)
    {
        mods |= crate::modifier::MOD_SHIFT;
    }
    if is_virtual_key_down(VK_LWIN.0 as i32) || is_virtual_key_down(VK_RWIN.0 as i32) {
        mods |= MOD_WIN;
    }
    MODIFIER_STATE.store(mods, Ordering::Release);
    mods
}

fn apply_effects(effects: Vec<Effect>, cursor: Point) {
    for effect in effects {
        match effect {
            Effect::EnqueueCommand(cmd) => {
                if let Some(tx) = COMMAND_TX.get() {
                    if tx.try_push(cmd) {
                        post_to_worker(ctrl::WORK_AVAILABLE, 0, 0);
                    }
                }
            }
            Effect::RequestFocus(w) => {
                let packed = pack_point(cursor.x, cursor.y);
                post_to_worker(ctrl::REQUEST_FOCUS, w.0 as usize, packed.0);
            }
            Effect::PoisonSoloModifier => post_to_worker(ctrl::POISON_SOLO_MODIFIER, 0, 0),
            Effect::Swallow | Effect::PassThrough => {}
        }
    }
}

fn drain_feedback() {
    let Some(rx) = FEEDBACK_RX.get() else {
        return;
    };
    while let Ok(learned) = rx.try_recv() {
        GESTURE.with(|g| {
            let mut gm = g.borrow_mut();
            if gm.drag_state().map(|d| d.target) == Some(learned.target) {
                gm.apply_learned_minimum(learned.min_w, learned.min_h);
            }
        });
    }
}

unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let kb = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };
        if kb.dwExtraInfo != INJECTED_EVENT_SENTINEL {
            if let Some(mask) = key_to_mask(kb.vkCode) {
                let msg = w_param.0 as u32;
                let new_state = if msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN {
                    MODIFIER_STATE.fetch_or(mask, Ordering::AcqRel) | mask
                } else {
                    MODIFIER_STATE.fetch_and(!mask, Ordering::AcqRel) & !mask
                };
                if mask == MOD_WIN {
                    let snapshot = ModifierSnapshot::from_mask(new_state);
                    let released =
                        MOD_TRACKER.with(|t| t.borrow_mut().note_transition(snapshot));
                    if released {
                        let effects = GESTURE.with(|g| g.borrow_mut().on_win_released());
                        apply_effects(effects, Point::default());
                    }
                }
            }
        }
    }
    unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
}

unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code < 0 || !HOOK_ENABLED.load(Ordering::Relaxed) {
        return unsafe { CallNextHookEx(None, n_code, w_param, l_param) };
    }

    let mouse = unsafe { &*(l_param.0 as *const MSLLHOOKSTRUCT) };
    if mouse.dwExtraInfo == INJECTED_EVENT_SENTINEL {
        return unsafe { CallNextHookEx(None, n_code, w_param, l_param) };
    }

    let msg = w_param.0 as u32;
    let cursor = Point::new(mouse.pt.x, mouse.pt.y);
    let mods = ModifierSnapshot::from_mask(MODIFIER_STATE.load(Ordering::Acquire));

    match msg {
        WM_MOUSEMOVE => {
            drain_feedback();
            let effects = GESTURE.with(|g| g.borrow_mut().on_mouse_move(cursor));
            apply_effects(effects, cursor);
            // AltSnap/teacher pattern: never swallow mouse-move — DWM and OS
            // cursor tracking lose context and jitter if we do.
            unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
        }

        WM_LBUTTONDOWN | WM_RBUTTONDOWN if mods.win_solo() => {
            let button = if msg == WM_LBUTTONDOWN {
                Button::Left
            } else {
                Button::Right
            };

            if !move_resize_grab_allowed(cursor) {
                return unsafe { CallNextHookEx(None, n_code, w_param, l_param) };
            }

            let effects =
                GESTURE.with(|g| g.borrow_mut().on_mouse_down(button, cursor, mods, &Win32Ops));
            let swallow = effects.contains(&Effect::Swallow);
            apply_effects(effects, cursor);
            if swallow {
                LRESULT(1)
            } else {
                unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
            }
        }

        WM_MBUTTONDOWN if mods.win_solo() || mods.win_shift_only() => {
            let effects = GESTURE.with(|g| {
                g.borrow_mut()
                    .on_mouse_down(Button::Middle, cursor, mods, &Win32Ops)
            });
            let swallow = effects.contains(&Effect::Swallow);
            apply_effects(effects, cursor);
            if swallow {
                LRESULT(1)
            } else {
                unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
            }
        }

        WM_LBUTTONUP | WM_RBUTTONUP => {
            let button = if msg == WM_LBUTTONUP {
                Button::Left
            } else {
                Button::Right
            };
            let ending_target = GESTURE.with(|g| g.borrow().drag_state().map(|d| d.target));
            let effects = GESTURE.with(|g| g.borrow_mut().on_mouse_up(button));
            let swallow = effects.contains(&Effect::Swallow);
            apply_effects(effects, cursor);
            if let Some(target) = ending_target {
                post_to_worker(ctrl::END_DRAG, target.0 as usize, 0);
            }
            if swallow {
                LRESULT(1)
            } else {
                unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
            }
        }

        _ => unsafe { CallNextHookEx(None, n_code, w_param, l_param) },
    }
}

fn hook_thread_main() {
    let initial = refresh_modifier_state_from_keyboard();
    log::debug!("initial modifier state: {:#x}", initial);

    let keyboard_hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) };
    let mouse_hook = unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) };

    let (keyboard_hook, mouse_hook) = match (keyboard_hook, mouse_hook) {
        (Ok(kh), Ok(mh)) => {
            log::info!("hooks installed: keyboard + mouse");
            (kh, mh)
        }
        (kh, mh) => {
            let detail = format!(
                "keyboard={} mouse={}",
                if kh.is_ok() { "ok" } else { "FAILED" },
                if mh.is_ok() { "ok" } else { "FAILED" }
            );
            log::error!("{}", crate::error::CoreError::HookInstall(detail));
            if let Ok(hook) = kh {
                let _ = unsafe { UnhookWindowsHookEx(hook) };
            }
            if let Ok(hook) = mh {
                let _ = unsafe { UnhookWindowsHookEx(hook) };
            }
            std::process::exit(crate::error::ExitSignal::InitFailure.exit_code());
        }
    };

    let mut msg = MSG::default();
    loop {
        let status = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if status.0 <= 0 {
            break;
        }

        if msg.message == ctrl::HARD_RESET {
            log::info!("hook: hard reset requested");
            GESTURE.with(|g| g.borrow_mut().panic_reset());
            MOD_TRACKER.with(|t| *t.borrow_mut() = ModifierTracker::new());
            let polled = ModifierSnapshot::from_mask(refresh_modifier_state_from_keyboard());
            MOD_TRACKER.with(|t| t.borrow_mut().resync(polled));
            continue;
        }

        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    log::info!("hook thread shutting down");
    let _ = unsafe { UnhookWindowsHookEx(keyboard_hook) };
    let _ = unsafe { UnhookWindowsHookEx(mouse_hook) };
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub fn start_hook_thread(
    producer: CommandProducer,
    feedback_rx: Receiver<LearnedMinimum>,
) -> u32 {
    let _ = COMMAND_TX.set(producer);
    let _ = FEEDBACK_RX.set(feedback_rx);

    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let thread_id = unsafe { GetCurrentThreadId() };
        let _ = tx.send(thread_id);
        if let Err(payload) = std::panic::catch_unwind(hook_thread_main) {
            log::error!("hook thread panicked: {}", panic_message(payload.as_ref()));
            HOOK_PANICKED.store(true, Ordering::Release);
        }
    });

    let thread_id = rx.recv().unwrap_or(0);
    log::info!("hook thread spawned: tid={}", thread_id);
    thread_id
}

pub fn panicked() -> bool {
    HOOK_PANICKED.load(Ordering::Acquire)
}

pub fn set_enabled(enabled: bool) {
    log::info!("hook enabled={}", enabled);
    HOOK_ENABLED.store(enabled, Ordering::Release);
}
