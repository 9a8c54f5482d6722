use serde::Serialize;
use tauri::{AppHandle, Manager};
use tauri_plugin_store::StoreExt;
use tracing::{info, warn};

use crate::config::{
    AppConfig, KEY_ANON_KEY, KEY_EDGE_BASE, KEY_SUPABASE_URL, PREFERENCES_STORE,
};
use crate::error::AppError;
use crate::session::KeyringSessionStore;
use crate::state::{AppState, Backoffice};

/// Read a string preference, `None` when missing or the store is unavailable.
pub fn read_preference(app: &AppHandle, key: &str) -> Option<String> {
    let store = app
        .store(PREFERENCES_STORE)
        .map_err(|e| warn!("Failed to open store: {}", e))
        .ok()?;
    store
        .get(key)
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .filter(|s| !s.is_empty())
}

/// Resolve connection settings and (re)build the backend state.
/// Returns false when settings are still incomplete.
pub fn reconfigure(app: &AppHandle) -> Result<bool, AppError> {
    let config = match AppConfig::resolve(
        |k| read_preference(app, k),
        |k| std::env::var(k).ok(),
    ) {
        Ok(config) => config,
        Err(AppError::Config(msg)) => {
            info!("Backend not configured yet: {}", msg);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let backoffice = Backoffice::new(config, Box::new(KeyringSessionStore))?;
    let backoffice = app.state::<AppState>().install(backoffice);
    tauri::async_runtime::spawn(async move {
        if let Some(session) = backoffice.auth.restore().await {
            info!("Session restored for {:?}", session.email);
        }
    });
    Ok(true)
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigStatus {
    pub configured: bool,
    pub supabase_url: Option<String>,
    pub edge_base: Option<String>,
}

#[tauri::command]
pub fn get_config_status(app: AppHandle) -> Result<ConfigStatus, String> {
    let status = match app.state::<AppState>().get() {
        Ok(bo) => ConfigStatus {
            configured: true,
            supabase_url: Some(bo.api.config().supabase_url.clone()),
            edge_base: Some(bo.api.config().edge_base.clone()),
        },
        Err(_) => ConfigStatus {
            configured: false,
            supabase_url: read_preference(&app, KEY_SUPABASE_URL),
            edge_base: read_preference(&app, KEY_EDGE_BASE),
        },
    };
    Ok(status)
}

#[tauri::command]
pub fn get_preference(app: AppHandle, key: &str) -> Result<Option<String>, String> {
    info!("Getting preference: {}", key);
    let store = app.store(PREFERENCES_STORE).map_err(|e| {
        warn!("Failed to open store: {}", e);
        e.to_string()
    })?;
    let value = store.get(key).and_then(|v| v.as_str().map(|s| s.to_string()));
    Ok(value)
}

/// Saving a connection setting rebuilds the backend right away.
#[tauri::command]
pub fn set_preference(app: AppHandle, key: &str, value: &str) -> Result<(), String> {
    if key == KEY_ANON_KEY {
        info!("Setting preference: {}", key);
    } else {
        info!("Setting preference: {} = {}", key, value);
    }
    let store = app.store(PREFERENCES_STORE).map_err(|e| {
        warn!("Failed to open store: {}", e);
        e.to_string()
    })?;
    let unchanged = store.get(key).and_then(|v| v.as_str().map(|s| s == value)) == Some(true);
    store.set(key, serde_json::json!(value));
    store.save().map_err(|e| {
        warn!("Failed to save store: {}", e);
        e.to_string()
    })?;

    if !unchanged && [KEY_SUPABASE_URL, KEY_ANON_KEY, KEY_EDGE_BASE].contains(&key) {
        reconfigure(&app)?;
    }
    Ok(())
}
