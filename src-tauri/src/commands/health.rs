use serde::Serialize;
use tauri::{AppHandle, Manager};
use tracing::info;

use crate::commands::config::read_preference;
use crate::config::{AppConfig, KEY_REPORT_DIR};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub config_complete: bool,
    pub config_error: Option<String>,
    pub edge_base: Option<String>,
    pub backend_ready: bool,
    pub signed_in: bool,
    pub session_email: Option<String>,
    pub report_dir: Option<String>,
    pub report_dir_writable: bool,
}

#[tauri::command]
pub async fn run_health_check(app: AppHandle) -> Result<HealthReport, String> {
    info!("Running health check");

    let resolved = AppConfig::resolve(|k| read_preference(&app, k), |k| std::env::var(k).ok());
    let (config_complete, config_error, edge_base) = match &resolved {
        Ok(cfg) => (true, None, Some(cfg.edge_base.clone())),
        Err(e) => (false, Some(e.to_string()), None),
    };
    info!("Config complete: {}", config_complete);

    let state = app.state::<AppState>();
    let backend_ready = state.is_configured();
    let session = match state.get() {
        Ok(bo) => bo.auth.session_info().await,
        Err(_) => None,
    };
    info!("Signed in: {}", session.is_some());

    let report_dir = read_preference(&app, KEY_REPORT_DIR)
        .map(std::path::PathBuf::from)
        .or_else(dirs::download_dir);
    let report_dir_writable = report_dir
        .as_ref()
        .map(|d| d.is_dir() && tempfile::tempfile_in(d).is_ok())
        .unwrap_or(false);
    info!("Report directory {:?} writable: {}", report_dir, report_dir_writable);

    Ok(HealthReport {
        config_complete,
        config_error,
        edge_base,
        backend_ready,
        signed_in: session.is_some(),
        session_email: session.and_then(|s| s.email),
        report_dir: report_dir.map(|d| d.to_string_lossy().to_string()),
        report_dir_writable,
    })
}
