//! Worker thread (spec §5): owns the hidden message-only window, the resize
//! overlay, and the real `GetMessageW` loop. Drains the command transport
//! through the executor and is the only place `SendInput`-based effects
//! (shell-suppression, focus fallback) are actually carried out.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::RemoteDesktop::{
    WTSRegisterSessionNotification, NOTIFY_FOR_THIS_SESSION, WTS_SESSION_LOCK, WTS_SESSION_UNLOCK,
};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW, PostThreadMessageW,
    RegisterClassW, TranslateMessage, HWND_MESSAGE, MSG, WINDOW_EX_STYLE, WINDOW_STYLE,
    WM_ENDSESSION, WM_WTSSESSION_CHANGE, WNDCLASSW,
};

use crate::config::AppConfig;
use crate::coords::unpack_point;
use crate::error::ExitSignal;
use crate::executor::{ExecOptions, Executor, LearnedMinimum};
use crate::geometry::Point;
use crate::hook::{self, ctrl};
use crate::overlay;
use crate::suppression;
use crate::transport::CommandConsumer;
use crate::window_manager::{Win32Ops, WindowId, WindowOps, WindowOpsExec};

static HOOK_TID: AtomicU32 = AtomicU32::new(0);
static CONSUMER: OnceLock<CommandConsumer> = OnceLock::new();
static FEEDBACK_TX: OnceLock<Sender<LearnedMinimum>> = OnceLock::new();
static EXECUTOR: OnceLock<Mutex<Executor<Win32Ops>>> = OnceLock::new();
static SHARED_CONFIG: OnceLock<Arc<Mutex<AppConfig>>> = OnceLock::new();

pub fn set_hook_tid(tid: u32) {
    HOOK_TID.store(tid, Ordering::Release);
}

fn current_config() -> Option<AppConfig> {
    SHARED_CONFIG.get().map(|c| c.lock().clone())
}

fn wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe extern "system" fn hidden_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_WTSSESSION_CHANGE {
        let code = wparam.0 as u32;
        if code == WTS_SESSION_LOCK || code == WTS_SESSION_UNLOCK {
            log::info!("worker: session lock/unlock detected (code={:#x})", code);
            handle_session_change();
        }
        return LRESULT(0);
    }
    if msg == WM_ENDSESSION && wparam.0 != 0 {
        log::info!("worker: WM_ENDSESSION — OS session is ending, exiting");
        std::process::exit(ExitSignal::SessionEnding.exit_code());
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn handle_session_change() {
    overlay::hide();
    let tid = HOOK_TID.load(Ordering::Acquire);
    if tid != 0 {
        let _ = unsafe { PostThreadMessageW(tid, ctrl::HARD_RESET, WPARAM(0), LPARAM(0)) };
    }
}

fn create_hidden_window() -> Option<HWND> {
    let class_name = wide_string("wingrip_worker_message_window");
    let instance = unsafe { GetModuleHandleW(None) }.unwrap_or_default();

    let wc = WNDCLASSW {
        lpfnWndProc: Some(hidden_wndproc),
        hInstance: instance.into(),
        lpszClassName: PCWSTR(class_name.as_ptr()),
        ..Default::default()
    };
    if unsafe { RegisterClassW(&wc) } == 0 {
        log::error!(
            "{}",
            crate::error::CoreError::WindowClassRegistration(
                "RegisterClassW returned 0".to_string()
            )
        );
        return None;
    }

    let hwnd = match unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            PCWSTR(class_name.as_ptr()),
            None,
            WINDOW_STYLE(0),
            0,
            0,
            0,
            0,
            Some(HWND_MESSAGE),
            None,
            Some(instance.into()),
            None,
        )
    } {
        Ok(hwnd) => hwnd,
        Err(e) => {
            log::error!(
                "{}",
                crate::error::CoreError::HiddenWindowCreation(e.to_string())
            );
            return None;
        }
    };

    if unsafe { WTSRegisterSessionNotification(hwnd, NOTIFY_FOR_THIS_SESSION) }.is_err() {
        log::warn!("worker: WTSRegisterSessionNotification failed — session lock detection disabled");
    }

    Some(hwnd)
}

fn handle_work_available() {
    let (Some(consumer), Some(executor_lock)) = (CONSUMER.get(), EXECUTOR.get()) else {
        return;
    };
    let mut commands = Vec::new();
    consumer.drain(|cmd| commands.push(cmd));

    let config = current_config();
    let opts = ExecOptions {
        rate_limit_moves: config.as_ref().map(|c| c.rate_limit_window_moves).unwrap_or(true),
        log_rate: config.map(|c| c.log_move_rate).unwrap_or(false),
    };

    let mut exec = executor_lock.lock();
    for cmd in commands {
        let (x, y, resizing) = (cmd.x, cmd.y, cmd.resizing);
        let outcome = exec.apply(cmd, opts);

        if let Some(learned) = outcome.learned_minimum {
            if let Some(tx) = FEEDBACK_TX.get() {
                let _ = tx.try_send(learned);
            }
        }

        match outcome.overlay_metrics {
            Some(metrics) => overlay::show(x, y, metrics),
            None if !resizing => overlay::hide(),
            None => {}
        }
    }

    let dropped = consumer.stats().dropped.load(Ordering::Relaxed);
    if dropped > 0 {
        log::trace!("command transport drops so far: {}", dropped);
    }
}

fn handle_request_focus(wparam: WPARAM, lparam: LPARAM) {
    let target = WindowId(wparam.0 as isize);
    let (px, py) = unpack_point(lparam);

    let config = current_config();
    if !config.as_ref().map(|c| c.focus_on_drag).unwrap_or(true) {
        return;
    }

    if Win32Ops.set_foreground(target) {
        return;
    }

    if config.map(|c| c.lmb_focus_fallback).unwrap_or(false) {
        if let Err(e) = suppression::synthetic_click(Point::new(px, py)) {
            log::warn!("focus fallback click failed: {}", e);
        }
    }
}

fn handle_poison_solo_modifier() {
    if let Err(e) = suppression::poison_solo_modifier() {
        log::warn!("failed to poison solo modifier tap: {}", e);
    }
}

fn handle_end_drag(wparam: WPARAM) {
    let target = WindowId(wparam.0 as isize);
    if let Some(executor_lock) = EXECUTOR.get() {
        executor_lock.lock().end_drag(target);
    }
    overlay::hide();
}

fn worker_thread_main(config: Arc<Mutex<AppConfig>>) {
    let _ = SHARED_CONFIG.set(config);
    overlay::create();

    let Some(_hwnd) = create_hidden_window() else {
        log::error!("worker: hidden window creation failed — exiting process");
        std::process::exit(ExitSignal::InitFailure.exit_code());
    };

    let mut msg = MSG::default();
    loop {
        let status = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if status.0 <= 0 {
            break;
        }

        match msg.message {
            ctrl::WORK_AVAILABLE => handle_work_available(),
            ctrl::REQUEST_FOCUS => handle_request_focus(msg.wParam, msg.lParam),
            ctrl::POISON_SOLO_MODIFIER => handle_poison_solo_modifier(),
            ctrl::END_DRAG => handle_end_drag(msg.wParam),
            _ => unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            },
        }
    }

    overlay::destroy();
    log::info!("worker thread shutting down");
}

/// Spawns the worker thread and its watchdog. Returns the worker's thread id
/// so the hook thread can address control messages to it.
pub fn start_worker_thread(
    config: Arc<Mutex<AppConfig>>,
    consumer: CommandConsumer,
    feedback_tx: Sender<LearnedMinimum>,
) -> u32 {
    let _ = CONSUMER.set(consumer);
    let _ = FEEDBACK_TX.set(feedback_tx);
    let _ = EXECUTOR.set(Mutex::new(Executor::new(Win32Ops)));

    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let thread_id = unsafe { GetCurrentThreadId() };
        let _ = tx.send(thread_id);
        worker_thread_main(config);
    });

    let thread_id = rx.recv().unwrap_or(0);
    spawn_watchdog();
    log::info!("worker thread spawned: tid={}", thread_id);
    thread_id
}

/// Polls for a hook-thread panic and ends the process if one occurred,
/// rather than leaving a half-dead gesture engine running silently (spec §7:
/// a hook-thread panic is unrecoverable — the hooks it installed are gone).
fn spawn_watchdog() {
    thread::spawn(|| loop {
        thread::sleep(Duration::from_millis(250));
        if hook::panicked() {
            log::error!("watchdog: hook thread panicked — terminating process");
            std::process::exit(ExitSignal::HookThreadPanicked.exit_code());
        }
    });
}
