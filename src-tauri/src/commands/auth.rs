use tauri::State;
use tracing::info;

use crate::error::AppError;
use crate::session::SessionInfo;
use crate::state::AppState;

#[tauri::command]
pub async fn sign_in(
    state: State<'_, AppState>,
    email: String,
    password: String,
) -> Result<SessionInfo, AppError> {
    let bo = state.get()?;
    bo.auth.sign_in_with_password(email.trim(), &password).await
}

#[tauri::command]
pub async fn sign_out(state: State<'_, AppState>) -> Result<(), AppError> {
    info!("sign_out called");
    let bo = state.get()?;
    bo.auth.sign_out().await;
    Ok(())
}

/// `None` when signed out or when the backend is not configured yet.
#[tauri::command]
pub async fn get_session(state: State<'_, AppState>) -> Result<Option<SessionInfo>, AppError> {
    match state.get() {
        Ok(bo) => Ok(bo.auth.session_info().await),
        Err(_) => Ok(None),
    }
}
