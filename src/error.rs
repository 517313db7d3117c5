//! Error taxonomy (spec §7).
//!
//! Only the fatal rows (`Resource-init`, `Protocol-violation` in debug,
//! `Shutdown`) get a typed error — transient-input, OS-denied and
//! queue-overflow stay as the teacher's `Option`/bool-returning,
//! log-and-continue style, since the spec requires those to never surface
//! as exceptions across the hook boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to install low-level hook: {0}")]
    HookInstall(String),

    #[error("failed to register window class: {0}")]
    WindowClassRegistration(String),

    #[error("failed to create hidden message window: {0}")]
    HiddenWindowCreation(String),

    #[error("impossible gesture state reached: {0}")]
    ProtocolViolation(String),
}

/// Typed replacement for "just exit the process" — the worker thread is the
/// only place that is allowed to act on this (spec §7: "the worker owns the
/// exit path").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    /// A `Resource-init` failure during startup.
    InitFailure,
    /// User chose Exit from the tray menu.
    UserRequested,
    /// OS session-end notification.
    SessionEnding,
    /// Worker watchdog detected a hook-thread panic payload.
    HookThreadPanicked,
    /// Reserved for a future console Ctrl+C handler; this build does not
    /// install one (console/TTY detection is an explicit non-goal) but the
    /// exit path already knows how to honor the signal if one is wired up.
    ConsoleCtrlC,
}

impl ExitSignal {
    pub fn exit_code(self) -> i32 {
        match self {
            ExitSignal::InitFailure => 1,
            ExitSignal::UserRequested => 0,
            ExitSignal::SessionEnding => 0,
            ExitSignal::HookThreadPanicked => 2,
            ExitSignal::ConsoleCtrlC => 0,
        }
    }
}
