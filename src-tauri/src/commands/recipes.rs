use tauri::State;

use crate::api::types::RecipeRow;
use crate::editor::{EditorView, RecipeDraft};
use crate::error::AppError;
use crate::list::ListView;
use crate::state::AppState;

#[tauri::command]
pub fn recipes_view(state: State<'_, AppState>) -> Result<ListView<RecipeRow>, AppError> {
    Ok(state.get()?.recipes.view())
}

#[tauri::command]
pub fn recipes_set_query(
    state: State<'_, AppState>,
    q: String,
) -> Result<ListView<RecipeRow>, AppError> {
    Ok(state.get()?.recipes.set_query(&q))
}

#[tauri::command]
pub async fn recipes_search(state: State<'_, AppState>) -> Result<ListView<RecipeRow>, AppError> {
    let bo = state.get()?;
    Ok(bo.recipes.search().await)
}

#[tauri::command]
pub async fn recipes_go_to_page(
    state: State<'_, AppState>,
    page: i64,
) -> Result<ListView<RecipeRow>, AppError> {
    let bo = state.get()?;
    Ok(bo.recipes.go_to_page(page).await)
}

#[tauri::command]
pub async fn recipes_reload(state: State<'_, AppState>) -> Result<ListView<RecipeRow>, AppError> {
    let bo = state.get()?;
    Ok(bo.recipes.reload().await)
}

/// Open the editor on a row of the page currently shown.
#[tauri::command]
pub fn recipe_edit_open(
    state: State<'_, AppState>,
    id_recipe: i64,
) -> Result<EditorView<RecipeDraft>, AppError> {
    let bo = state.get()?;
    let view = bo.recipes.view();
    let row = view
        .rows
        .iter()
        .find(|r| r.id_recipe == id_recipe)
        .ok_or_else(|| {
            AppError::NotFound(format!("Recipe #{} is not on the current page", id_recipe))
        })?;
    Ok(bo.recipe_editor.open(row))
}

#[tauri::command]
pub fn recipe_edit_set_field(
    state: State<'_, AppState>,
    field: String,
    value: String,
) -> Result<EditorView<RecipeDraft>, AppError> {
    Ok(state.get()?.recipe_editor.set_field(&field, &value))
}

/// Save with the form's current values, so keystrokes still in flight as
/// `recipe_edit_set_field` calls are not lost.
#[tauri::command]
pub async fn recipe_edit_save(
    state: State<'_, AppState>,
    fields: Vec<(String, String)>,
) -> Result<EditorView<RecipeDraft>, AppError> {
    let bo = state.get()?;
    Ok(bo
        .recipe_editor
        .save_with_fields(&fields, &bo.api, &bo.recipes)
        .await)
}

#[tauri::command]
pub fn recipe_edit_cancel(state: State<'_, AppState>) -> Result<EditorView<RecipeDraft>, AppError> {
    Ok(state.get()?.recipe_editor.cancel())
}

#[tauri::command]
pub fn recipe_edit_view(state: State<'_, AppState>) -> Result<EditorView<RecipeDraft>, AppError> {
    Ok(state.get()?.recipe_editor.view())
}
