//! Inline edit of one selected row: open a draft, change fields, save or
//! cancel. A saved draft reloads the owning list exactly once; a failed save
//! keeps the draft so no input is lost.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::types::{RecipeRow, RecipeUpdate};
use crate::error::AppError;
use crate::list::{ListPage, ListSource};

/// Sends the minimal update payload for a record.
#[async_trait]
pub trait RecordUpdater<U: Sync>: Send + Sync {
    type Output: Send;

    async fn update(&self, payload: &U) -> Result<Self::Output, AppError>;
}

/// A mutable working copy of one row.
pub trait Draft: Clone + Send + Serialize {
    type Row;
    type Update: Send + Sync;

    fn open(row: &Self::Row) -> Self;
    fn id(&self) -> i64;
    /// Shallow merge of one field. Only coercion, no validation.
    fn set_field(&mut self, name: &str, value: &str) -> Result<(), String>;
    fn to_update(&self) -> Self::Update;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorView<D> {
    pub draft: Option<D>,
    pub saving: bool,
    pub error: Option<String>,
    pub auth_lost: bool,
}

#[derive(Debug)]
struct EditorState<D> {
    draft: Option<D>,
    saving: bool,
    error: Option<String>,
    auth_lost: bool,
}

impl<D: Clone> EditorState<D> {
    fn view(&self) -> EditorView<D> {
        EditorView {
            draft: self.draft.clone(),
            saving: self.saving,
            error: self.error.clone(),
            auth_lost: self.auth_lost,
        }
    }
}

fn lock<D>(state: &Mutex<EditorState<D>>) -> MutexGuard<'_, EditorState<D>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears `saving` however the save ends.
struct SavingGuard<'a, D> {
    state: &'a Mutex<EditorState<D>>,
}

impl<D> Drop for SavingGuard<'_, D> {
    fn drop(&mut self) {
        lock(self.state).saving = false;
    }
}

pub struct RecordEditor<D> {
    name: &'static str,
    state: Mutex<EditorState<D>>,
}

impl<D: Draft> RecordEditor<D> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(EditorState {
                draft: None,
                saving: false,
                error: None,
                auth_lost: false,
            }),
        }
    }

    pub fn view(&self) -> EditorView<D> {
        lock(&self.state).view()
    }

    pub fn open(&self, row: &D::Row) -> EditorView<D> {
        let mut state = lock(&self.state);
        let draft = D::open(row);
        info!("Editing {} #{}", self.name, draft.id());
        state.draft = Some(draft);
        state.error = None;
        state.auth_lost = false;
        state.view()
    }

    /// Bad input leaves the draft untouched and reports on `error`.
    pub fn set_field(&self, name: &str, value: &str) -> EditorView<D> {
        let mut state = lock(&self.state);
        let result = match state.draft.as_mut() {
            Some(draft) => draft.set_field(name, value),
            None => Err(format!("No {} is being edited", self.name)),
        };
        state.error = result.err();
        state.view()
    }

    pub fn cancel(&self) -> EditorView<D> {
        let mut state = lock(&self.state);
        state.draft = None;
        state.error = None;
        state.auth_lost = false;
        state.view()
    }

    /// Push the draft. No-op without a draft or while a save is running.
    pub async fn save<U, R, S>(&self, updater: &U, list: &ListPage<R, S>) -> EditorView<D>
    where
        U: RecordUpdater<D::Update>,
        R: Clone + Send + 'static,
        S: ListSource<R>,
    {
        self.save_with_fields(&[], updater, list).await
    }

    /// Merge `fields` into the draft and push it, in one step. The payload
    /// is taken under the same lock as the merge, so the values the form
    /// showed when save was pressed are the values sent. A field that fails
    /// coercion aborts the save with the draft left as it was.
    pub async fn save_with_fields<U, R, S>(
        &self,
        fields: &[(String, String)],
        updater: &U,
        list: &ListPage<R, S>,
    ) -> EditorView<D>
    where
        U: RecordUpdater<D::Update>,
        R: Clone + Send + 'static,
        S: ListSource<R>,
    {
        let payload = {
            let mut state = lock(&self.state);
            if state.saving {
                return state.view();
            }
            let Some(draft) = state.draft.as_ref() else {
                return state.view();
            };
            let mut merged = draft.clone();
            for (name, value) in fields {
                if let Err(e) = merged.set_field(name, value) {
                    state.error = Some(e);
                    return state.view();
                }
            }
            let payload = merged.to_update();
            state.draft = Some(merged);
            state.saving = true;
            state.error = None;
            state.auth_lost = false;
            payload
        };

        let result = {
            let _saving = SavingGuard { state: &self.state };
            updater.update(&payload).await
        };

        match result {
            Ok(_) => {
                info!("Saved {}", self.name);
                lock(&self.state).draft = None;
                list.reload().await;
            }
            Err(e) => {
                warn!("Saving {} failed: {}", self.name, e);
                let mut state = lock(&self.state);
                state.error = Some(e.to_string());
                state.auth_lost = e.is_auth();
            }
        }
        self.view()
    }
}

/// Editable subset of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeDraft {
    pub id_recipe: i64,
    pub title: String,
    pub difficulty: Option<String>,
    pub calories_per_serving_kcal: Option<f64>,
}

fn parse_optional_number(field: &str, value: &str) -> Result<Option<f64>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(format!("{} must be a number", field)),
    }
}

impl Draft for RecipeDraft {
    type Row = RecipeRow;
    type Update = RecipeUpdate;

    fn open(row: &RecipeRow) -> Self {
        Self {
            id_recipe: row.id_recipe,
            title: row.title.clone(),
            difficulty: row.difficulty.clone(),
            calories_per_serving_kcal: row.calories(),
        }
    }

    fn id(&self) -> i64 {
        self.id_recipe
    }

    fn set_field(&mut self, name: &str, value: &str) -> Result<(), String> {
        match name {
            "title" => self.title = value.to_string(),
            "difficulty" => {
                let v = value.trim();
                self.difficulty = (!v.is_empty()).then(|| v.to_string());
            }
            "calories_per_serving_kcal" | "calories" => {
                self.calories_per_serving_kcal = parse_optional_number("Calories", value)?;
            }
            "id_recipe" | "id" => return Err("The recipe id cannot be edited".to_string()),
            other => return Err(format!("Unknown recipe field '{}'", other)),
        }
        Ok(())
    }

    fn to_update(&self) -> RecipeUpdate {
        RecipeUpdate {
            id_recipe: self.id_recipe,
            title: self.title.clone(),
            difficulty: self.difficulty.clone(),
            calories_per_serving_kcal: self.calories_per_serving_kcal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> RecipeRow {
        RecipeRow {
            id_recipe: 7,
            title: "Guiso".into(),
            difficulty: Some("media".into()),
            calories_per_serving_kcal: None,
            legacy_calories: Some(410.0),
            created_at: "2024-05-01T10:00:00Z".into(),
            source_platform: Some("tiktok".into()),
            source_username: Some("@chef".into()),
        }
    }

    #[test]
    fn test_open_falls_back_to_legacy_calories() {
        let draft = RecipeDraft::open(&row());
        assert_eq!(draft.calories_per_serving_kcal, Some(410.0));
        assert_eq!(draft.id(), 7);
    }

    #[test]
    fn test_empty_number_becomes_absent() {
        let mut draft = RecipeDraft::open(&row());
        draft.set_field("calories_per_serving_kcal", "  ").unwrap();
        assert_eq!(draft.calories_per_serving_kcal, None);
        draft.set_field("calories", "250.5").unwrap();
        assert_eq!(draft.calories_per_serving_kcal, Some(250.5));
    }

    #[test]
    fn test_bad_number_rejected_without_change() {
        let mut draft = RecipeDraft::open(&row());
        let err = draft.set_field("calories_per_serving_kcal", "lots").unwrap_err();
        assert_eq!(err, "Calories must be a number");
        assert_eq!(draft.calories_per_serving_kcal, Some(410.0));
        assert!(draft.set_field("calories", "NaN").is_err());
    }

    #[test]
    fn test_id_is_immutable() {
        let mut draft = RecipeDraft::open(&row());
        assert!(draft.set_field("id_recipe", "8").is_err());
        assert!(draft.set_field("source_platform", "x").is_err());
        assert_eq!(draft.id_recipe, 7);
    }

    #[test]
    fn test_update_payload_is_minimal() {
        let mut draft = RecipeDraft::open(&row());
        draft.set_field("title", "Guiso criollo").unwrap();
        draft.set_field("difficulty", "").unwrap();
        let json = serde_json::to_value(draft.to_update()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id_recipe": 7,
                "title": "Guiso criollo",
                "difficulty": null,
                "calories_per_serving_kcal": 410.0
            })
        );
    }

    #[test]
    fn test_editor_open_set_cancel() {
        let editor: RecordEditor<RecipeDraft> = RecordEditor::new("recipe");
        assert!(editor.view().draft.is_none());

        let view = editor.set_field("title", "x");
        assert_eq!(view.error.as_deref(), Some("No recipe is being edited"));

        editor.open(&row());
        let view = editor.set_field("title", "Nuevo");
        assert_eq!(view.draft.unwrap().title, "Nuevo");
        assert!(view.error.is_none());

        let view = editor.set_field("calories", "abc");
        assert!(view.error.is_some());

        let view = editor.cancel();
        assert!(view.draft.is_none());
        assert!(view.error.is_none());
    }
}
