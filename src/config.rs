//! Persisted user settings (spec §2 "Configuration"), loaded/saved through
//! `tauri-plugin-store` the same way the teacher does.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Whitelist,
    Blacklist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub enabled: bool,
    pub filter_mode: FilterMode,
    pub filter_list: Vec<String>,
    pub autostart: bool,
    /// Allow grabbing a window that isn't the current foreground window.
    pub allow_nonforeground: bool,
    /// Bring the grabbed window to the foreground when a move/resize starts.
    pub focus_on_drag: bool,
    /// If a foreground request is refused, fall back to a synthetic left
    /// click on the target (more intrusive, off by default).
    pub lmb_focus_fallback: bool,
    /// Apply the same rate-limit floor to move-only commands as resize
    /// commands already get (spec §4.5 "rate limiting" extension).
    pub rate_limit_window_moves: bool,
    /// Log every command the executor paces out under the rate limit —
    /// noisy, useful only when diagnosing a sluggish drag.
    pub log_move_rate: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_mode: FilterMode::Blacklist,
            filter_list: Vec::new(),
            autostart: false,
            allow_nonforeground: true,
            focus_on_drag: true,
            lmb_focus_fallback: false,
            rate_limit_window_moves: true,
            log_move_rate: false,
        }
    }
}
