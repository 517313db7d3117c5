mod commands;
mod config;
mod coords;
mod error;
mod executor;
mod geometry;
mod gesture;
mod hook;
mod modifier;
mod overlay;
mod suppression;
mod transport;
mod window_manager;
mod worker;

use std::sync::Arc;

use commands::AppState;
use config::AppConfig;
use parking_lot::Mutex;
use tauri::{
    menu::{MenuBuilder, MenuItemBuilder},
    tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
    Manager,
};
use tauri_plugin_autostart::MacosLauncher;
use tauri_plugin_store::StoreExt;

/// Bounded queue depth between the hook thread and the worker thread — a
/// handful of in-flight resize/move frames is enough headroom for the
/// worker's `SendInput`/`SetWindowPos` calls to never block the hook
/// callback (spec §4.4 "bounded, never blocks").
const COMMAND_QUEUE_CAPACITY: usize = 64;
const FEEDBACK_QUEUE_CAPACITY: usize = 8;

pub fn run() {
    env_logger::init();
    log::info!("wingrip starting");
    tauri::Builder::default()
        .plugin(tauri_plugin_store::Builder::default().build())
        .plugin(tauri_plugin_autostart::init(
            MacosLauncher::LaunchAgent,
            Some(vec![]),
        ))
        .plugin(tauri_plugin_updater::Builder::new().build())
        .plugin(tauri_plugin_process::init())
        .setup(|app| {
            let config = load_config(app);
            let config = Arc::new(Mutex::new(config));

            app.manage(AppState {
                config: config.clone(),
            });

            build_tray(app)?;
            apply_window_effect(app);

            let (producer, consumer) = transport::channel(COMMAND_QUEUE_CAPACITY);
            let (feedback_tx, feedback_rx) = crossbeam_channel::bounded(FEEDBACK_QUEUE_CAPACITY);

            hook::set_config(config.clone());
            let enabled = config.lock().enabled;
            hook::set_enabled(enabled);

            let hook_tid = hook::start_hook_thread(producer, feedback_rx);
            let worker_tid = worker::start_worker_thread(config.clone(), consumer, feedback_tx);

            hook::set_worker_tid(worker_tid);
            worker::set_hook_tid(hook_tid);

            log::info!(
                "setup complete — hook_tid={} worker_tid={}",
                hook_tid,
                worker_tid
            );

            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                api.prevent_close();
                let _ = window.hide();
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_config,
            commands::set_config,
            commands::get_running_processes,
            commands::set_hook_enabled,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

fn load_config(app: &tauri::App) -> AppConfig {
    match app.store("config.json") {
        Ok(store) => match store.get("config") {
            Some(val) => serde_json::from_value(val.clone()).unwrap_or_default(),
            None => {
                let default = AppConfig::default();
                if let Ok(val) = serde_json::to_value(&default) {
                    store.set("config", val);
                    let _ = store.save();
                }
                default
            }
        },
        Err(_) => AppConfig::default(),
    }
}

fn build_tray(app: &tauri::App) -> Result<(), Box<dyn std::error::Error>> {
    let settings_i = MenuItemBuilder::with_id("settings", "Settings").build(app)?;
    let quit_i = MenuItemBuilder::with_id("quit", "Quit").build(app)?;
    let menu = MenuBuilder::new(app)
        .items(&[&settings_i, &quit_i])
        .build()?;

    TrayIconBuilder::new()
        .icon(app.default_window_icon().unwrap().clone())
        .menu(&menu)
        .tooltip("wingrip")
        .show_menu_on_left_click(false)
        .on_menu_event(|app, event| match event.id().as_ref() {
            "settings" => {
                show_main_window(app);
            }
            "quit" => {
                app.exit(error::ExitSignal::UserRequested.exit_code());
            }
            _ => {}
        })
        .on_tray_icon_event(|tray, event| match event {
            TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Down,
                ..
            }
            | TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            }
            | TrayIconEvent::DoubleClick {
                button: MouseButton::Left,
                ..
            } => {
                let app = tray.app_handle();
                show_main_window(&app);
            }
            _ => {}
        })
        .build(app)?;

    Ok(())
}

/// Mica on Win11, falling back to acrylic — cosmetic only, the settings
/// window still works if both calls fail (e.g. on an older Windows build).
fn apply_window_effect(app: &tauri::App) {
    let Some(window) = app.get_webview_window("main") else {
        return;
    };
    if window_vibrancy::apply_mica(&window, None).is_err() {
        if let Err(e) = window_vibrancy::apply_acrylic(&window, None) {
            log::warn!("window effect unavailable: {}", e);
        }
    }
}

fn show_main_window(app: &tauri::AppHandle) {
    if let Some(w) = app.get_webview_window("main") {
        let _ = w.show();
        let _ = w.unminimize();
        let _ = w.set_focus();
    }
}
