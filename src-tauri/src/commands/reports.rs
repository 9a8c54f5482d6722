use std::path::PathBuf;

use tauri::{AppHandle, Manager, State};
use tracing::info;

use crate::api::types::ReportKind;
use crate::commands::config::read_preference;
use crate::config::KEY_REPORT_DIR;
use crate::error::AppError;
use crate::reports::DownloadOutcome;
use crate::state::AppState;

/// Preference first, then the OS download folder, then the app data dir.
fn report_dir(app: &AppHandle) -> Result<PathBuf, AppError> {
    if let Some(dir) = read_preference(app, KEY_REPORT_DIR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = dirs::download_dir() {
        return Ok(dir);
    }
    app.path()
        .app_data_dir()
        .map(|d| d.join("reports"))
        .map_err(|e| AppError::Io(format!("Failed to resolve app data directory: {}", e)))
}

#[tauri::command]
pub async fn download_report(
    app: AppHandle,
    state: State<'_, AppState>,
    kind: ReportKind,
) -> Result<DownloadOutcome, AppError> {
    info!("download_report called for: {}", kind);
    let bo = state.get()?;
    let dir = report_dir(&app)?;
    bo.reports.download(kind, &dir).await
}
