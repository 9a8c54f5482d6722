use tauri::State;

use crate::api::types::UserRow;
use crate::error::AppError;
use crate::list::ListView;
use crate::state::AppState;

#[tauri::command]
pub fn users_view(state: State<'_, AppState>) -> Result<ListView<UserRow>, AppError> {
    Ok(state.get()?.users.view())
}

#[tauri::command]
pub fn users_set_query(state: State<'_, AppState>, q: String) -> Result<ListView<UserRow>, AppError> {
    Ok(state.get()?.users.set_query(&q))
}

#[tauri::command]
pub async fn users_search(state: State<'_, AppState>) -> Result<ListView<UserRow>, AppError> {
    let bo = state.get()?;
    Ok(bo.users.search().await)
}

#[tauri::command]
pub async fn users_go_to_page(
    state: State<'_, AppState>,
    page: i64,
) -> Result<ListView<UserRow>, AppError> {
    let bo = state.get()?;
    Ok(bo.users.go_to_page(page).await)
}

#[tauri::command]
pub async fn users_reload(state: State<'_, AppState>) -> Result<ListView<UserRow>, AppError> {
    let bo = state.get()?;
    Ok(bo.users.reload().await)
}

/// One PATCH, then one reload of the page the admin is looking at.
#[tauri::command]
pub async fn users_toggle_enabled(
    state: State<'_, AppState>,
    id_user: i64,
    enabled: bool,
) -> Result<ListView<UserRow>, AppError> {
    let bo = state.get()?;
    bo.users
        .mutate(bo.api.set_user_enabled(id_user, enabled))
        .await?;
    Ok(bo.users.view())
}
