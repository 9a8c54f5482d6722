use std::sync::{Arc, RwLock};

use tracing::info;

use crate::api::types::{RecipeRow, UserRow, DEFAULT_PAGE_SIZE};
use crate::api::AdminApi;
use crate::config::AppConfig;
use crate::editor::{RecipeDraft, RecordEditor};
use crate::error::AppError;
use crate::list::ListPage;
use crate::reports::ReportDownloader;
use crate::session::{SessionStore, SupabaseAuth, TokenProvider};

pub type UsersPage = ListPage<UserRow, Arc<AdminApi>>;
pub type RecipesPage = ListPage<RecipeRow, Arc<AdminApi>>;

/// Everything that exists once the app knows where its backend lives.
pub struct Backoffice {
    pub auth: Arc<SupabaseAuth>,
    pub api: Arc<AdminApi>,
    pub users: UsersPage,
    pub recipes: RecipesPage,
    pub recipe_editor: RecordEditor<RecipeDraft>,
    pub reports: ReportDownloader<Arc<AdminApi>>,
}

impl Backoffice {
    pub fn new(config: AppConfig, store: Box<dyn SessionStore>) -> Result<Self, AppError> {
        let auth = Arc::new(SupabaseAuth::new(config.clone(), store)?);
        let tokens: Arc<dyn TokenProvider> = auth.clone();
        let api = Arc::new(AdminApi::new(config, tokens)?);
        Ok(Self {
            auth,
            users: ListPage::new("users", api.clone(), DEFAULT_PAGE_SIZE),
            recipes: ListPage::new("recipes", api.clone(), DEFAULT_PAGE_SIZE),
            recipe_editor: RecordEditor::new("recipe"),
            reports: ReportDownloader::new(api.clone()),
            api,
        })
    }
}

/// Tauri-managed state. Empty until the connection settings are known.
#[derive(Default)]
pub struct AppState {
    inner: RwLock<Option<Arc<Backoffice>>>,
}

impl AppState {
    pub fn get(&self) -> Result<Arc<Backoffice>, AppError> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| {
                AppError::Config("Backend is not configured. Set the Supabase URL and anon key in Settings.".to_string())
            })
    }

    pub fn install(&self, backoffice: Backoffice) -> Arc<Backoffice> {
        let backoffice = Arc::new(backoffice);
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(backoffice.clone());
        info!("Backoffice backend installed");
        backoffice
    }

    pub fn is_configured(&self) -> bool {
        self.get().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn test_unconfigured_state_is_config_error() {
        let state = AppState::default();
        assert!(!state.is_configured());
        assert!(matches!(state.get().err(), Some(AppError::Config(_))));
    }

    #[test]
    fn test_install_makes_state_available() {
        let state = AppState::default();
        let config = AppConfig {
            supabase_url: "https://abc.supabase.co".into(),
            anon_key: "anon".into(),
            edge_base: "https://abc.supabase.co/functions/v1".into(),
        };
        state.install(Backoffice::new(config, Box::new(MemorySessionStore::default())).unwrap());
        let bo = state.get().unwrap();
        assert_eq!(bo.api.config().edge_base, "https://abc.supabase.co/functions/v1");
        assert_eq!(bo.users.view().page_size, DEFAULT_PAGE_SIZE);
    }
}
