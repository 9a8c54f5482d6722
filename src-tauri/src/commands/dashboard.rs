use tauri::State;
use tracing::info;

use crate::api::types::Dashboard;
use crate::error::AppError;
use crate::state::AppState;

#[tauri::command]
pub async fn fetch_metrics(state: State<'_, AppState>) -> Result<Dashboard, AppError> {
    let bo = state.get()?;
    let snapshot = bo.api.fetch_metrics().await?;
    info!("Fetched metrics snapshot taken at {}", snapshot.now);
    Ok(Dashboard::from(snapshot))
}
